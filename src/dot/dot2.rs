//! dot2: `C = A'*B`, `C<!M> = A'*B` or `C<M> = A'*B` computed as a bitmap
//!
//! C is computed over the held vectors of both operands: a compact
//! `nvec(A') × nvec(B)` bitmap. If either operand is hypersparse the
//! compact result is expanded to the true dimensions afterwards.
//!
//! Tasks are a grid of A'-slices by B-slices, each slice balanced by entry
//! count. The more vectors B has, the more B-slices and the fewer
//! A'-slices there are, for about `dot_tasks_per_thread` tasks per thread.

use rayon::prelude::*;

use crate::dot::{dot_vectors, DotAcc};
use crate::error::{AxbError, Result};
use crate::matrix::config::Heuristics;
use crate::matrix::pattern::{Layout, Structure};
use crate::matrix::{Mask, Matrix};
use crate::reconcile::expand_compact_bitmap;
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};
use crate::slice::{pslice, vector_offsets};
use crate::utils::{split_by_offsets_mut, try_alloc};

/// Part of one compact column of C owned by a task
struct Piece<'c, T> {
    kb: usize,
    ka0: usize,
    b: &'c mut [bool],
    x: Option<&'c mut [T]>,
}

struct Dot2Kernel<'a, 'c, T> {
    at: &'a Matrix<T>,
    b: &'a Matrix<T>,
    mask: Option<&'a Mask<'a>>,
    tasks: Vec<Vec<Piece<'c, T>>>,
    pattern_only: bool,
}

impl<T: Catalog> KernelVisitor<T> for Dot2Kernel<'_, '_, T> {
    type Output = usize;

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) -> usize {
        let Self {
            at,
            b,
            mask,
            tasks,
            pattern_only,
        } = self;
        tasks
            .into_par_iter()
            .map(|pieces| {
                let mut count = 0;
                for mut piece in pieces {
                    let j = b.s.vector_index(piece.kb);
                    for r in 0..piece.b.len() {
                        let ka = piece.ka0 + r;
                        let i = at.s.vector_index(ka);
                        if mask.is_some_and(|m| !m.allows(i, j)) {
                            continue;
                        }
                        let mut acc = DotAcc::new(&add, &mult, None, pattern_only);
                        dot_vectors(&mut acc, at, ka, b, piece.kb, i, j);
                        if let Some(cij) = acc.result() {
                            piece.b[r] = true;
                            count += 1;
                            if let Some(x) = piece.x.as_deref_mut() {
                                x[r] = cij;
                            }
                        }
                    }
                }
                count
            })
            .sum()
    }
}

/// Compute `A'*B` into a bitmap, optionally masked.
///
/// # Arguments
/// * `at` - `A'`, held by column: vector `i` is row `i` of A
/// * `b` - B, with the same vector length as `at`
/// * `mask` - Mask of any layout, complemented or not
/// * `iso` - The iso value of C, if C is known to be iso
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::Declined`] if the compact bitmap cannot be addressed.
#[allow(clippy::too_many_arguments)]
pub fn dot2<T: Catalog>(
    at: &Matrix<T>,
    b: &Matrix<T>,
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    nthreads: usize,
    heuristics: &Heuristics,
) -> Result<Matrix<T>> {
    let (m, n) = (at.s.vdim, b.s.vdim);
    let (cm, cn) = (at.s.nvec(), b.s.nvec());
    let cnz = cm.checked_mul(cn).ok_or(AxbError::Declined)?;
    if cnz > isize::MAX as usize / std::mem::size_of::<T>().max(1) {
        return Err(AxbError::Declined);
    }

    let mut cb = try_alloc(cnz, false)?;
    let mut cx = if iso.is_some() {
        Vec::new()
    } else {
        try_alloc(cnz, T::default())?
    };

    let ntasks = if nthreads <= 1 {
        1
    } else {
        heuristics.dot_tasks_per_thread * nthreads
    };
    let nbslice = ntasks.clamp(1, cn.max(1));
    let naslice = (ntasks / nbslice).clamp(1, cm.max(1));
    let a_bounds = pslice(&vector_offsets(&at.s), naslice);
    let b_bounds = pslice(&vector_offsets(&b.s), nbslice);
    log::trace!(
        "dot2: compact {}x{}, {} x {} slices",
        cm,
        cn,
        naslice,
        nbslice
    );

    let nvals = if cnz == 0 {
        0
    } else {
        let mut tasks: Vec<Vec<Piece<'_, T>>> = (0..naslice * nbslice).map(|_| Vec::new()).collect();
        let mut bcols = cb.chunks_mut(cm);
        let mut xcols = cx.chunks_mut(cm.max(1));
        for s in 0..nbslice {
            for kb in b_bounds[s]..b_bounds[s + 1] {
                let Some(bcol) = bcols.next() else { break };
                let bparts = split_by_offsets_mut(bcol, &a_bounds);
                let xparts: Vec<Option<&mut [T]>> = match (iso.is_none(), xcols.next()) {
                    (true, Some(xcol)) => split_by_offsets_mut(xcol, &a_bounds)
                        .into_iter()
                        .map(Some)
                        .collect(),
                    _ => Vec::new(),
                };
                let mut xparts = xparts.into_iter();
                for (a, bp) in bparts.into_iter().enumerate() {
                    tasks[s * naslice + a].push(Piece {
                        kb,
                        ka0: a_bounds[a],
                        b: bp,
                        x: xparts.next().flatten(),
                    });
                }
            }
        }
        let kernel = Dot2Kernel {
            at,
            b,
            mask,
            tasks,
            pattern_only: iso.is_some(),
        };
        dispatch(semiring, cls, kernel)
    };

    let s = Structure::from_parts_unchecked(cm, cn, Layout::Bitmap { b: cb, nvals }, false, 0);
    let compact = match iso {
        Some(v) => Matrix::from_parts_unchecked(s, vec![v], true),
        None => Matrix::from_parts_unchecked(s, cx, false),
    };

    let row_map = at.s.h();
    let col_map = b.s.h();
    if row_map.is_none() && col_map.is_none() {
        Ok(compact)
    } else {
        expand_compact_bitmap(compact, row_map, col_map, m, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{reference_mxm, Sparsity};
    use crate::semiring::classify;

    fn run(a: &Matrix<i64>, b: &Matrix<i64>, nthreads: usize) -> Matrix<i64> {
        let s = Semiring::plus_times();
        let cls = classify(&s, false);
        dot2(&a.transpose(), b, None, &s, &cls, None, nthreads, &Heuristics::default()).unwrap()
    }

    #[test]
    fn test_matches_reference() {
        let a = Matrix::from_triplets(3, 4, &[(0, 0, 1), (0, 3, 2), (1, 1, 3), (2, 2, 4), (2, 0, 5)])
            .unwrap();
        let b = Matrix::from_triplets(4, 2, &[(0, 0, 1), (3, 0, 1), (1, 1, 2), (2, 1, 7)]).unwrap();
        let expected = reference_mxm(&a, &b, &Semiring::plus_times(), false, |_, _| true);
        for nthreads in [1, 3] {
            let c = run(&a, &b, nthreads);
            assert_eq!(c.sparsity(), Sparsity::Bitmap);
            assert_eq!(c.sorted_entries(), expected.sorted_entries());
        }
    }

    #[test]
    fn test_hypersparse_b_is_expanded() {
        let a = Matrix::iso_full(4, 4, 1i64).to_full().unwrap();
        let b = Matrix::hypersparse(4, 10, vec![0, 1, 2], vec![0, 3], vec![1, 2], vec![5, 6])
            .unwrap();
        let c = run(&a, &b, 2);
        assert_eq!(c.shape(), (4, 10));
        assert_eq!(c.sparsity(), Sparsity::Hypersparse);
        assert_eq!(c.structure().nvec(), 2);
        assert_eq!(c.get(2, 3), Some(6));
        assert_eq!(c.nvals(), 8);
    }

    #[test]
    fn test_complemented_mask() {
        let a = Matrix::iso_full(2, 2, 1i64);
        let m = Matrix::from_triplets(2, 2, &[(0, 0, true)]).unwrap();
        let mask = Mask::new(&m).complement();
        let s = Semiring::plus_times();
        let c = dot2(&a.transpose(), &a, Some(&mask), &s, &classify(&s, false), None, 1, &Heuristics::default())
            .unwrap();
        assert_eq!(c.get(0, 0), None);
        assert_eq!(c.get(1, 1), Some(2));
        assert_eq!(c.nvals(), 3);
    }
}
