//! Bitmap saxpy: `C = A*B` into a bitmap when A is bitmap or full
//!
//! With A dense, `C(:,j)` is a dense combination of A's columns, so it is
//! accumulated straight into C's bitmap without a scratch table. Tasks own
//! a column of C, or a block of rows of one column when C has fewer
//! columns than threads. Any mask is honored by lookup.

use rayon::prelude::*;

use crate::dot::dot4::row_block;
use crate::error::{AxbError, Result};
use crate::matrix::pattern::{Layout, Structure};
use crate::matrix::{Mask, Matrix};
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};
use crate::utils::try_alloc;

struct Block<'c, T> {
    j: usize,
    i0: usize,
    b: &'c mut [bool],
    x: Option<&'c mut [T]>,
}

struct BitmapKernel<'a, 'c, T> {
    a: &'a Matrix<T>,
    b: &'a Matrix<T>,
    mask: Option<&'a Mask<'a>>,
    blocks: Vec<Block<'c, T>>,
    a_is_pattern: bool,
    b_is_pattern: bool,
}

impl<T: Catalog> KernelVisitor<T> for BitmapKernel<'_, '_, T> {
    type Output = usize;

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) -> usize {
        let Self {
            a,
            b,
            mask,
            blocks,
            a_is_pattern,
            b_is_pattern,
        } = self;
        let m = a.s.vlen;
        blocks
            .into_par_iter()
            .map(|mut block| {
                let j = block.j;
                let allowed: Option<Vec<bool>> = mask.map(|mk| {
                    (0..block.b.len())
                        .map(|r| mk.allows(block.i0 + r, j))
                        .collect()
                });
                let mut count = 0;
                for qb in b.s.range_of(j) {
                    if !b.s.is_live(qb) {
                        continue;
                    }
                    let k = b.s.index(qb);
                    let bkj = if b_is_pattern { T::default() } else { b.value(qb) };
                    let base = k * m + block.i0;
                    for r in 0..block.b.len() {
                        if allowed.as_ref().is_some_and(|al| !al[r]) {
                            continue;
                        }
                        let pa = base + r;
                        if !a.s.is_live(pa) {
                            continue;
                        }
                        let i = block.i0 + r;
                        match block.x.as_deref_mut() {
                            None => {
                                if !block.b[r] {
                                    block.b[r] = true;
                                    count += 1;
                                }
                            }
                            Some(x) => {
                                if block.b[r] {
                                    if A::IS_ANY || add.is_terminal(x[r]) {
                                        continue;
                                    }
                                    let aik = if a_is_pattern { T::default() } else { a.value(pa) };
                                    x[r] = add.add(x[r], mult.mult(aik, bkj, i, k, j));
                                } else {
                                    let aik = if a_is_pattern { T::default() } else { a.value(pa) };
                                    x[r] = mult.mult(aik, bkj, i, k, j);
                                    block.b[r] = true;
                                    count += 1;
                                }
                            }
                        }
                    }
                }
                count
            })
            .sum()
    }
}

/// Compute `C = A*B` as a bitmap, for A bitmap or full and B sparse,
/// bitmap or full.
///
/// # Arguments
/// * `mask` - Mask of any layout, complemented or not
/// * `iso` - The iso value of C, if C is known to be iso
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::Declined`] if A is sparse or B is hypersparse.
#[allow(clippy::too_many_arguments)]
pub fn saxpy_bitmap<T: Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    nthreads: usize,
) -> Result<Matrix<T>> {
    if !a.s.is_bitmap_or_full() || b.s.is_hyper() {
        return Err(AxbError::Declined);
    }
    let (m, n) = (a.s.vlen, b.s.vdim);
    let cnz = m.checked_mul(n).ok_or(AxbError::Declined)?;
    let mut cb = try_alloc(cnz, false)?;
    let mut cx = if iso.is_some() {
        Vec::new()
    } else {
        try_alloc(cnz, T::default())?
    };

    let rb = row_block(m, n, nthreads);
    log::trace!("saxpy bitmap: {}x{}, row blocks of {}", m, n, rb);

    let nvals = if cnz == 0 {
        0
    } else {
        let mut xcols = cx.chunks_mut(m);
        let mut blocks = Vec::new();
        for (j, bcol) in cb.chunks_mut(m).enumerate() {
            let mut xblocks = xcols.next().map(|col| col.chunks_mut(rb));
            for (r, bblock) in bcol.chunks_mut(rb).enumerate() {
                blocks.push(Block {
                    j,
                    i0: r * rb,
                    b: bblock,
                    x: xblocks.as_mut().and_then(|it| it.next()),
                });
            }
        }
        let kernel = BitmapKernel {
            a,
            b,
            mask,
            blocks,
            a_is_pattern: cls.a_is_pattern,
            b_is_pattern: cls.b_is_pattern,
        };
        dispatch(semiring, cls, kernel)
    };

    let s = Structure::from_parts_unchecked(m, n, Layout::Bitmap { b: cb, nvals }, false, 0);
    Ok(match iso {
        Some(v) => Matrix::from_parts_unchecked(s, vec![v], true),
        None => Matrix::from_parts_unchecked(s, cx, false),
    })
}
