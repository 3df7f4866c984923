//! Reference implementation of semiring SpGEMM
//!
//! This provides a baseline for correctness testing. It walks the
//! entries of A and B with a hashmap accumulator per column of C and
//! applies the mask afterwards; it is not optimized for performance.

use std::collections::HashMap;

use crate::matrix::Matrix;
use crate::semiring::{Scalar, Semiring};

/// Computes `C = A*B` over `semiring`, optionally keeping only the
/// positions where `keep(i, j)` holds
///
/// Duplicate contributions are added with the monoid in increasing order
/// of the inner index `k`. Output entries come out sorted.
pub fn reference_mxm<T, F>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    semiring: &Semiring<T>,
    flipxy: bool,
    keep: F,
) -> Matrix<T>
where
    T: Scalar,
    F: Fn(usize, usize) -> bool,
{
    assert_eq!(
        a.ncols(),
        b.nrows(),
        "Matrix dimensions must be compatible for multiplication"
    );

    let (m, n) = (a.nrows(), b.ncols());

    // Entries of A grouped by column
    let mut a_cols: Vec<Vec<(usize, T)>> = vec![Vec::new(); a.ncols()];
    for (i, k, v) in a.sorted_entries() {
        a_cols[k].push((i, v));
    }

    let mut triplets = Vec::new();
    let mut b_entries = b.sorted_entries().into_iter().peekable();
    for j in 0..n {
        // Use a hashmap as an accumulator for this column
        let mut accum: HashMap<usize, T> = HashMap::new();
        loop {
            let (k, bkj) = match b_entries.peek() {
                Some(&(k, jj, v)) if jj == j => (k, v),
                _ => break,
            };
            b_entries.next();
            for &(i, aik) in &a_cols[k] {
                let t = if flipxy {
                    semiring.multiply().apply_at(bkj, aik, i, k, j)
                } else {
                    semiring.multiply().apply_at(aik, bkj, i, k, j)
                };
                accum
                    .entry(i)
                    .and_modify(|c| *c = semiring.add().apply(*c, t))
                    .or_insert(t);
            }
        }
        for (i, v) in accum {
            if keep(i, j) {
                triplets.push((i, j, v));
            }
        }
    }

    Matrix::from_triplets(m, n, &triplets).unwrap_or_else(|_| Matrix::empty(m, n))
}
