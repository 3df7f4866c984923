//! Conversions between [`Matrix`] and external libraries

use ndarray::{Array2, ArrayView2};
use sprs::CsMat;

use crate::error::{AxbError, Result};
use crate::matrix::Matrix;
use crate::semiring::Scalar;

/// Convert to an sprs matrix in CSC storage.
///
/// Any layout is accepted; zombies are dropped, columns are sorted and an
/// iso value is expanded.
pub fn to_sprs_csc<T: Scalar>(matrix: &Matrix<T>) -> Result<CsMat<T>> {
    let sparse = matrix.to_sparse();
    let (nrows, ncols) = sparse.shape();
    let (p, i) = match &sparse.s.layout {
        crate::matrix::Layout::Sparse { p, i } => (p.clone(), i.clone()),
        _ => return Err(AxbError::InvalidObject("expected a sparse layout".to_string())),
    };
    let x: Vec<T> = (0..i.len()).map(|q| sparse.value(q)).collect();
    CsMat::try_new_csc((nrows, ncols), p, i, x)
        .map_err(|(_, _, _, e)| AxbError::InvalidObject(e.to_string()))
}

/// Convert an sprs matrix in either storage to a sparse [`Matrix`]
pub fn from_sprs<T: Scalar>(matrix: &CsMat<T>) -> Result<Matrix<T>> {
    let csc = if matrix.is_csc() {
        matrix.clone()
    } else {
        matrix.to_csc()
    };
    let (nrows, ncols) = csc.shape();
    let (p, i, x) = csc.into_raw_storage();
    Matrix::sparse(nrows, ncols, p, i, x)
}

/// Dense copy with `T::zero()` where no entry is present
pub fn to_dense<T: Scalar>(matrix: &Matrix<T>) -> Array2<T> {
    let mut out = Array2::from_elem(matrix.shape(), T::zero());
    for (i, j, v) in matrix.entries() {
        out[[i, j]] = v;
    }
    out
}

/// Full [`Matrix`] holding every element of `dense`
pub fn from_dense<T: Scalar>(dense: ArrayView2<'_, T>) -> Matrix<T> {
    let (nrows, ncols) = dense.dim();
    // column-major order
    let x: Vec<T> = dense.t().iter().copied().collect();
    Matrix::from_parts_unchecked(crate::matrix::Structure::full(nrows, ncols), x, false)
}
