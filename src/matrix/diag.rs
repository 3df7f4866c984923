//! Diagonal-matrix probe

use rayon::prelude::*;

use crate::matrix::pattern::{Layout, Structure};

/// True if `s` is square and holds exactly one live entry per column, on
/// the diagonal.
///
/// Full and bitmap matrices are diagonal only when they are 1×1 with the
/// entry present. A 0×0 matrix is diagonal.
pub fn is_diagonal(s: &Structure) -> bool {
    let n = s.vdim;
    if s.vlen != n {
        return false;
    }
    match &s.layout {
        Layout::Full => n <= 1,
        Layout::Bitmap { nvals, .. } => n == 0 || (n == 1 && *nvals == 1),
        Layout::Sparse { p, i } | Layout::Hypersparse { p, i, .. } => {
            if s.nzombies > 0 || s.nvec() != n || i.len() != n {
                return false;
            }
            (0..n).into_par_iter().all(|k| {
                p[k + 1] - p[k] == 1 && i[p[k]] == s.vector_index(k)
            })
        }
    }
}
