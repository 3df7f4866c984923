//! saxpy4: `C += A*B` in place, for a full C, A sparse or hypersparse
//! and B bitmap or full
//!
//! With at least as many columns as threads every task owns columns of C
//! and writes them directly. Otherwise each column is computed by a team
//! that splits A's vectors among its members; members update the shared
//! column through atomic read-modify-write cells.

use rayon::prelude::*;

use crate::error::{AxbError, Result};
use crate::matrix::pattern::Layout;
use crate::matrix::Matrix;
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};
use crate::slice::{pslice, vector_offsets};

struct Saxpy4Kernel<'a, 'c, T> {
    a: &'a Matrix<T>,
    b: &'a Matrix<T>,
    cx: &'c mut [T],
    nthreads: usize,
    a_is_pattern: bool,
    b_is_pattern: bool,
}

impl<T: Catalog> KernelVisitor<T> for Saxpy4Kernel<'_, '_, T> {
    type Output = ();

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) {
        let (a, b) = (self.a, self.b);
        let m = a.s.vlen;
        let n = b.s.vdim;
        let kvec = b.s.vlen;

        let Self {
            cx,
            nthreads,
            a_is_pattern,
            b_is_pattern,
            ..
        } = self;
        let aik = |pa: usize| if a_is_pattern { T::default() } else { a.value(pa) };
        let bkj = |qb: usize| if b_is_pattern { T::default() } else { b.value(qb) };

        if n >= nthreads {
            cx.par_chunks_mut(m).enumerate().for_each(|(j, col)| {
                for k in 0..kvec {
                    let qb = j * kvec + k;
                    if !b.s.is_live(qb) {
                        continue;
                    }
                    let bv = bkj(qb);
                    for pa in a.s.range_of(k) {
                        if a.s.is_live(pa) {
                            let i = a.s.index(pa);
                            col[i] = add.add(col[i], mult.mult(aik(pa), bv, i, k, j));
                        }
                    }
                }
            });
            return;
        }

        // one team per column, members splitting A's vectors
        let members = (nthreads / n.max(1)).max(1);
        let bounds = pslice(&vector_offsets(&a.s), members);
        for (j, col) in cx.chunks_mut(m).enumerate() {
            let cells: Vec<T::Atomic> = col.iter().map(|&v| v.new_atomic()).collect();
            bounds.par_windows(2).for_each(|w| {
                for ka in w[0]..w[1] {
                    let k = a.s.vector_index(ka);
                    let qb = j * kvec + k;
                    if !b.s.is_live(qb) {
                        continue;
                    }
                    let bv = bkj(qb);
                    for pa in a.s.vector_range(ka) {
                        if a.s.is_live(pa) {
                            let i = a.s.index(pa);
                            let t = mult.mult(aik(pa), bv, i, k, j);
                            T::atomic_update(&cells[i], |v| add.add(v, t));
                        }
                    }
                }
            });
            for (dst, cell) in col.iter_mut().zip(cells) {
                *dst = T::into_value(cell);
            }
        }
    }
}

/// Accumulate `A*B` into the full, non-iso matrix `c`.
///
/// # Arguments
/// * `c` - Full `m×n` matrix updated in place with the monoid
/// * `a` - Sparse or hypersparse `m×k` operand
/// * `b` - Bitmap or full `k×n` operand
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::Declined`] if the layouts do not fit.
pub fn saxpy4<T: Catalog>(
    c: &mut Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    semiring: &Semiring<T>,
    cls: &Classification,
    nthreads: usize,
) -> Result<()> {
    if !matches!(c.s.layout, Layout::Full)
        || c.iso
        || !a.s.is_sparse_or_hyper()
        || !b.s.is_bitmap_or_full()
    {
        return Err(AxbError::Declined);
    }
    let (m, n) = (c.s.vlen, c.s.vdim);
    if m == 0 || n == 0 {
        return Ok(());
    }
    log::trace!(
        "saxpy4: {}x{} in place, {}",
        m,
        n,
        if n >= nthreads { "column tasks" } else { "atomic teams" }
    );
    let kernel = Saxpy4Kernel {
        a,
        b,
        cx: &mut c.x,
        nthreads,
        a_is_pattern: cls.a_is_pattern,
        b_is_pattern: cls.b_is_pattern,
    };
    dispatch(semiring, cls, kernel);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::reference_mxm;
    use crate::semiring::classify;

    fn check(nthreads: usize) {
        let a = Matrix::from_triplets(3, 3, &[(0, 0, 1i64), (2, 0, 2), (1, 1, 3), (0, 2, 4)]).unwrap();
        let b = Matrix::from_triplets(3, 2, &[(0, 0, 1i64), (2, 0, 1), (1, 1, 2), (0, 1, 5)])
            .unwrap()
            .to_bitmap();
        let s = Semiring::plus_times();
        let mut c = Matrix::iso_full(3, 2, 10i64);
        c.expand_iso();
        saxpy4(&mut c, &a, &b, &s, &classify(&s, false), nthreads).unwrap();
        let ab = reference_mxm(&a, &b, &s, false, |_, _| true);
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(c.get(i, j), Some(10 + ab.get(i, j).unwrap_or(0)));
            }
        }
    }

    #[test]
    fn test_column_tasks() {
        check(1);
    }

    #[test]
    fn test_atomic_teams() {
        check(8);
    }

    #[test]
    fn test_declines_sparse_b() {
        let a = Matrix::from_triplets(2, 2, &[(0, 0, 1i32)]).unwrap();
        let mut c = Matrix::full(2, 2, vec![0; 4]).unwrap();
        let s = Semiring::plus_times();
        let err = saxpy4(&mut c, &a, &a, &s, &classify(&s, false), 1).unwrap_err();
        assert_eq!(err, AxbError::Declined);
    }
}
