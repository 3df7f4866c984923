//! saxpy5: `C += A*B` in place, for a full C, A bitmap or full and B
//! sparse or hypersparse
//!
//! Every entry `B(k,j)` scales the dense column `A(:,k)` into `C(:,j)`.
//! Tasks own a block of rows of one column of C, so writes never overlap.

use rayon::prelude::*;

use crate::dot::dot4::row_block;
use crate::error::{AxbError, Result};
use crate::matrix::pattern::Layout;
use crate::matrix::Matrix;
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};

struct Saxpy5Kernel<'a, 'c, T> {
    a: &'a Matrix<T>,
    b: &'a Matrix<T>,
    blocks: Vec<(usize, usize, &'c mut [T])>,
    a_is_pattern: bool,
    b_is_pattern: bool,
}

impl<T: Catalog> KernelVisitor<T> for Saxpy5Kernel<'_, '_, T> {
    type Output = ();

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) {
        let Self {
            a,
            b,
            blocks,
            a_is_pattern,
            b_is_pattern,
        } = self;
        let m = a.s.vlen;
        blocks.into_par_iter().for_each(|(j, i0, cblock)| {
            for qb in b.s.range_of(j) {
                if !b.s.is_live(qb) {
                    continue;
                }
                let k = b.s.index(qb);
                let bkj = if b_is_pattern { T::default() } else { b.value(qb) };
                let base = k * m + i0;
                for (r, cij) in cblock.iter_mut().enumerate() {
                    let pa = base + r;
                    if a.s.is_live(pa) {
                        let aik = if a_is_pattern { T::default() } else { a.value(pa) };
                        *cij = add.add(*cij, mult.mult(aik, bkj, i0 + r, k, j));
                    }
                }
            }
        });
    }
}

/// Accumulate `A*B` into the full, non-iso matrix `c`.
///
/// # Arguments
/// * `c` - Full `m×n` matrix updated in place with the monoid
/// * `a` - Bitmap or full `m×k` operand
/// * `b` - Sparse or hypersparse `k×n` operand
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::Declined`] if the layouts do not fit.
pub fn saxpy5<T: Catalog>(
    c: &mut Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    semiring: &Semiring<T>,
    cls: &Classification,
    nthreads: usize,
) -> Result<()> {
    if !matches!(c.s.layout, Layout::Full)
        || c.iso
        || !a.s.is_bitmap_or_full()
        || !b.s.is_sparse_or_hyper()
    {
        return Err(AxbError::Declined);
    }
    let (m, n) = (c.s.vlen, c.s.vdim);
    if m == 0 || n == 0 {
        return Ok(());
    }
    let rb = row_block(m, n, nthreads);
    log::trace!("saxpy5: {}x{} in place, row blocks of {}", m, n, rb);

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
    let kernel = Saxpy5Kernel {
        a,
        b,
        blocks,
        a_is_pattern: cls.a_is_pattern,
        b_is_pattern: cls.b_is_pattern,
    };
    dispatch(semiring, cls, kernel);
    Ok(())
}
