//! Row and column scaling by a diagonal matrix
//!
//! `C = A*D` scales column `j` of A by `D(j,j)`; `C = D*B` scales row `i`
//! of B by `D(i,i)`. C takes the pattern of the non-diagonal operand and
//! the monoid is never applied.

use rayon::prelude::*;

use crate::error::Result;
use crate::iso::iso_result;
use crate::matrix::Matrix;
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};
use crate::slice::vector_offsets;
use crate::utils::{split_by_offsets_mut, try_alloc};

struct ScaleKernel<'a, T> {
    other: &'a Matrix<T>,
    diag: Vec<T>,
    diag_on_left: bool,
}

impl<T: Catalog> KernelVisitor<T> for ScaleKernel<'_, T> {
    type Output = Result<Vec<T>>;

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, _add: A, mult: M) -> Self::Output {
        let s = self.other.structure();
        let offsets = vector_offsets(s);
        let mut x = try_alloc(s.nnz_held(), T::default())?;
        let diag = &self.diag;
        let other = self.other;
        split_by_offsets_mut(&mut x, &offsets)
            .into_par_iter()
            .enumerate()
            .for_each(|(k, out)| {
                let j = s.vector_index(k);
                let base = offsets[k];
                for (off, cij) in out.iter_mut().enumerate() {
                    let q = base + off;
                    if !s.is_live(q) {
                        continue;
                    }
                    let i = s.index(q);
                    *cij = if self.diag_on_left {
                        mult.mult(diag[i], other.value(q), i, i, j)
                    } else {
                        mult.mult(other.value(q), diag[j], i, j, j)
                    };
                }
            });
        Ok(x)
    }
}

fn diagonal_values<T: Catalog>(d: &Matrix<T>) -> Vec<T> {
    (0..d.ncols())
        .map(|j| d.get(j, j).unwrap_or_default())
        .collect()
}

fn scale<T: Catalog>(
    other: &Matrix<T>,
    d: &Matrix<T>,
    diag_on_left: bool,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
) -> Result<Matrix<T>> {
    let s = other.structure().clone();
    let (a, b) = if diag_on_left { (d, other) } else { (other, d) };
    let iso = iso.or_else(|| iso_result(a, b, a.ncols(), semiring, cls, true).map(|v| v.value));
    if let Some(v) = iso {
        return Ok(Matrix::from_parts_unchecked(s, vec![v], true));
    }
    let kernel = ScaleKernel {
        other,
        diag: diagonal_values(d),
        diag_on_left,
    };
    let x = dispatch(semiring, cls, kernel)?;
    Ok(Matrix::from_parts_unchecked(s, x, false))
}

/// `C = A*D` for a diagonal `D`
pub fn colscale<T: Catalog>(
    a: &Matrix<T>,
    d: &Matrix<T>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
) -> Result<Matrix<T>> {
    log::trace!("colscale: {}x{} by diagonal", a.nrows(), a.ncols());
    scale(a, d, false, semiring, cls, iso)
}

/// `C = D*B` for a diagonal `D`
pub fn rowscale<T: Catalog>(
    d: &Matrix<T>,
    b: &Matrix<T>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
) -> Result<Matrix<T>> {
    log::trace!("rowscale: {}x{} by diagonal", b.nrows(), b.ncols());
    scale(b, d, true, semiring, cls, iso)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{classify, BinaryOpcode};

    #[test]
    fn test_rowscale_full() {
        let d = Matrix::diagonal(&[2.0, 3.0, 4.0]);
        let b = Matrix::iso_full(3, 2, 1.0).to_full().unwrap();
        let s = Semiring::plus_times();
        let c = rowscale(&d, &b, &s, &classify(&s, false), None).unwrap();
        assert_eq!(c.get(0, 1), Some(2.0));
        assert_eq!(c.get(1, 0), Some(3.0));
        assert_eq!(c.get(2, 1), Some(4.0));
    }

    #[test]
    fn test_colscale_keeps_sparse_pattern() {
        let a = Matrix::from_triplets(3, 2, &[(0, 0, 1i32), (2, 1, 5)]).unwrap();
        let d = Matrix::diagonal(&[10, 100]);
        let s = Semiring::plus_times();
        let c = colscale(&a, &d, &s, &classify(&s, false), None).unwrap();
        assert_eq!(c.entries(), vec![(0, 0, 10), (2, 1, 500)]);
    }

    #[test]
    fn test_positional_scale() {
        let a = Matrix::from_triplets(3, 2, &[(1, 0, 7i64), (2, 1, 7)]).unwrap();
        let d = Matrix::diagonal(&[1, 1]);
        let s = Semiring::builtin(BinaryOpcode::Plus, BinaryOpcode::Secondj).unwrap();
        let c = colscale(&a, &d, &s, &classify(&s, false), None).unwrap();
        assert_eq!(c.entries(), vec![(1, 0, 0), (2, 1, 1)]);
    }

    #[test]
    fn test_iso_diagonal_gives_iso_result() {
        let a = Matrix::from_triplets(3, 2, &[(0, 0, 1i64), (2, 1, 4)]).unwrap();
        let d = Matrix::iso_sparse(2, 2, vec![0, 1, 2], vec![0, 1], 5i64).unwrap();
        // PLUS is not idempotent, but scaling never applies it
        let s = Semiring::plus_second();
        let c = colscale(&a, &d, &s, &classify(&s, false), None).unwrap();
        assert!(c.is_iso());
        assert_eq!(c.entries(), vec![(0, 0, 5), (2, 1, 5)]);

        let first = Semiring::plus_first();
        let c = rowscale(&d, &a.transpose(), &first, &classify(&first, false), None).unwrap();
        assert!(c.is_iso());
        assert_eq!(c.entries(), vec![(0, 0, 5), (1, 2, 5)]);

        // TIMES reads both operands, so the plain A keeps C non-iso
        let times = Semiring::plus_times();
        let c = colscale(&a, &d, &times, &classify(&times, false), None).unwrap();
        assert!(!c.is_iso());
        assert_eq!(c.entries(), vec![(0, 0, 5), (2, 1, 20)]);
    }
}
