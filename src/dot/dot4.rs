//! dot4: `C += A'*B` in place, for a full C
//!
//! Every entry of C is updated by one inner product. Tasks own whole
//! columns of C; when C has fewer columns than threads the columns are cut
//! into row blocks so every thread still gets work. Writes are disjoint.

use rayon::prelude::*;

use crate::dot::{dot_vectors, DotAcc};
use crate::error::{AxbError, Result};
use crate::matrix::pattern::Layout;
use crate::matrix::Matrix;
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};

/// Rows per block so that about `2 * nthreads` blocks exist in total
pub(crate) fn row_block(m: usize, n: usize, nthreads: usize) -> usize {
    if n >= nthreads || m == 0 {
        return m.max(1);
    }
    let blocks_per_column = (2 * nthreads).div_ceil(n.max(1));
    m.div_ceil(blocks_per_column).max(1)
}

struct Dot4Kernel<'a, 'c, T> {
    at: &'a Matrix<T>,
    b: &'a Matrix<T>,
    blocks: Vec<(usize, usize, &'c mut [T])>,
}

impl<T: Catalog> KernelVisitor<T> for Dot4Kernel<'_, '_, T> {
    type Output = ();

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) {
        let Self { at, b, blocks } = self;
        blocks.into_par_iter().for_each(|(j, i0, cblock)| {
            let Some(kb) = b.s.find_vector(j) else {
                return;
            };
            for (r, cij) in cblock.iter_mut().enumerate() {
                let i = i0 + r;
                let Some(ka) = at.s.find_vector(i) else {
                    continue;
                };
                let mut acc = DotAcc::new(&add, &mult, Some(*cij), false);
                dot_vectors(&mut acc, at, ka, b, kb, i, j);
                if let Some(v) = acc.result() {
                    *cij = v;
                }
            }
        });
    }
}

/// Accumulate `A'*B` into the full, non-iso matrix `c`.
///
/// # Arguments
/// * `c` - Full `m×n` matrix updated in place with the monoid
/// * `at` - `A'`, held by column: vector `i` is row `i` of A
/// * `b` - B, with the same vector length as `at`
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::Declined`] if C is not full or is iso.
pub fn dot4<T: Catalog>(
    c: &mut Matrix<T>,
    at: &Matrix<T>,
    b: &Matrix<T>,
    semiring: &Semiring<T>,
    cls: &Classification,
    nthreads: usize,
) -> Result<()> {
    if !matches!(c.s.layout, Layout::Full) || c.iso {
        return Err(AxbError::Declined);
    }
    let (m, n) = (c.s.vlen, c.s.vdim);
    if m == 0 || n == 0 {
        return Ok(());
    }
    let rb = row_block(m, n, nthreads);
    log::trace!("dot4: {}x{} in place, row blocks of {}", m, n, rb);

    let blocks: Vec<(usize, usize, &mut [T])> = c
        .x
        .chunks_mut(m)
        .enumerate()
        .flat_map(|(j, col)| {
            col.chunks_mut(rb)
                .enumerate()
                .map(move |(r, block)| (j, r * rb, block))
        })
        .collect();
    dispatch(semiring, cls, Dot4Kernel { at, b, blocks });
    Ok(())
}
