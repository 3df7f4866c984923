//! Dot-product engines
//!
//! Each entry `C(i,j)` is the inner product of vector `i` of `A'` and
//! vector `j` of B. The engines take `A'` explicitly: vector `i` of `at`
//! is row `i` of A.
//!
//! - [`dot2`]: every position of C, computed into a bitmap
//! - [`dot3`]: only the positions of a sparse mask
//! - [`dot4`]: `C += A'*B` in place into a full C

pub mod dot2;
pub mod dot3;
pub mod dot4;

pub use dot2::dot2;
pub use dot3::dot3;
pub use dot4::dot4;

use crate::constants::DOT_SKIP_RATIO;
use crate::matrix::pattern::Layout;
use crate::matrix::Matrix;
use crate::semiring::{AddOp, MultOp, Scalar};

/// Running value of one inner product
pub(crate) struct DotAcc<'o, T, A, M> {
    add: &'o A,
    mult: &'o M,
    cij: Option<T>,
    /// Stop at the first product: only the pattern is wanted
    pattern_only: bool,
}

impl<'o, T: Scalar, A: AddOp<T>, M: MultOp<T>> DotAcc<'o, T, A, M> {
    pub(crate) fn new(add: &'o A, mult: &'o M, init: Option<T>, pattern_only: bool) -> Self {
        Self {
            add,
            mult,
            cij: init,
            pattern_only,
        }
    }

    /// True once further products cannot change the result
    #[inline]
    pub(crate) fn done(&self) -> bool {
        match self.cij {
            Some(c) => self.pattern_only || self.add.is_terminal(c),
            None => false,
        }
    }

    /// Fold `aki * bkj` into the result; returns true when done
    #[inline]
    fn push(&mut self, aki: T, bkj: T, i: usize, k: usize, j: usize) -> bool {
        let t = self.mult.mult(aki, bkj, i, k, j);
        self.cij = Some(match self.cij {
            None => t,
            Some(c) => self.add.add(c, t),
        });
        self.done()
    }

    pub(crate) fn result(&self) -> Option<T> {
        self.cij
    }
}

fn is_dense(m: &Matrix<impl Scalar>) -> bool {
    matches!(m.s.layout, Layout::Full | Layout::Bitmap { .. })
}

/// Fold the inner product of `at(:,ka)` and `b(:,kb)` into `acc`.
///
/// `ka` and `kb` are held-vector positions; `i` and `j` are the row and
/// column of the C entry. Sorted vectors are merged, with binary-search
/// skipping when one is much longer than the other.
pub(crate) fn dot_vectors<T, A, M>(
    acc: &mut DotAcc<'_, T, A, M>,
    at: &Matrix<T>,
    ka: usize,
    b: &Matrix<T>,
    kb: usize,
    i: usize,
    j: usize,
) where
    T: Scalar,
    A: AddOp<T>,
    M: MultOp<T>,
{
    if acc.done() {
        return;
    }
    let (sa, sb) = (&at.s, &b.s);
    let ra = sa.vector_range(ka);
    let rb = sb.vector_range(kb);

    match (is_dense(at), is_dense(b)) {
        (true, true) => {
            for k in 0..sa.vlen {
                let (qa, qb) = (ra.start + k, rb.start + k);
                if sa.is_live(qa) && sb.is_live(qb) && acc.push(at.value(qa), b.value(qb), i, k, j)
                {
                    return;
                }
            }
        }
        (true, false) => {
            for qb in rb {
                if !sb.is_live(qb) {
                    continue;
                }
                let k = sb.index(qb);
                let qa = ra.start + k;
                if sa.is_live(qa) && acc.push(at.value(qa), b.value(qb), i, k, j) {
                    return;
                }
            }
        }
        (false, true) => {
            for qa in ra {
                if !sa.is_live(qa) {
                    continue;
                }
                let k = sa.index(qa);
                let qb = rb.start + k;
                if sb.is_live(qb) && acc.push(at.value(qa), b.value(qb), i, k, j) {
                    return;
                }
            }
        }
        (false, false) => {
            let (ia, ib) = match (sa.i(), sb.i()) {
                (Some(ia), Some(ib)) => (ia, ib),
                _ => return,
            };
            let (mut pa, mut pb) = (ra.start, rb.start);
            let (la, lb) = (ra.len(), rb.len());
            let skip_a = la > DOT_SKIP_RATIO * lb;
            let skip_b = lb > DOT_SKIP_RATIO * la;
            while pa < ra.end && pb < rb.end {
                let (ka_row, kb_row) = (ia[pa], ib[pb]);
                if ka_row < kb_row {
                    pa = if skip_a {
                        pa + ia[pa..ra.end].partition_point(|&r| r < kb_row)
                    } else {
                        pa + 1
                    };
                } else if kb_row < ka_row {
                    pb = if skip_b {
                        pb + ib[pb..rb.end].partition_point(|&r| r < ka_row)
                    } else {
                        pb + 1
                    };
                } else {
                    if acc.push(at.value(pa), b.value(pb), i, ka_row, j) {
                        return;
                    }
                    pa += 1;
                    pb += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::kernel::builtin::{Max, Plus, Times};

    fn dot(at: &Matrix<i64>, b: &Matrix<i64>) -> Option<i64> {
        let mut acc = DotAcc::new(&Plus, &Times, None, false);
        dot_vectors(&mut acc, at, 0, b, 0, 0, 0);
        acc.result()
    }

    #[test]
    fn test_all_layout_pairs_agree() {
        let x = Matrix::from_triplets(6, 1, &[(0, 0, 1), (2, 0, 2), (5, 0, 3)]).unwrap();
        let y = Matrix::from_triplets(6, 1, &[(2, 0, 10), (3, 0, 7), (5, 0, 100)]).unwrap();
        let expected = Some(2 * 10 + 3 * 100);
        for xs in [x.clone(), x.to_bitmap(), x.to_hypersparse()] {
            for ys in [y.clone(), y.to_bitmap(), y.to_hypersparse()] {
                assert_eq!(dot(&xs, &ys), expected);
            }
        }
        assert_eq!(dot(&Matrix::iso_full(6, 1, 2), &y), Some(234));
    }

    #[test]
    fn test_skipping_merge() {
        let long: Vec<(usize, usize, i64)> = (0..200).map(|k| (k, 0, 1)).collect();
        let long = Matrix::from_triplets(200, 1, &long).unwrap();
        let short = Matrix::from_triplets(200, 1, &[(150, 0, 4), (199, 0, 5)]).unwrap();
        assert_eq!(dot(&long, &short), Some(9));
        assert_eq!(dot(&short, &long), Some(9));
    }

    #[test]
    fn test_empty_intersection_and_terminal() {
        let x = Matrix::from_triplets(4, 1, &[(0, 0, 1i64)]).unwrap();
        let y = Matrix::from_triplets(4, 1, &[(1, 0, 1i64)]).unwrap();
        assert_eq!(dot(&x, &y), None);

        let big = Matrix::iso_full(4, 1, i64::MAX);
        let mut acc = DotAcc::new(&Max, &Times, None, false);
        dot_vectors(&mut acc, &big, 0, &Matrix::iso_full(4, 1, 1i64), 0, 0, 0);
        assert!(acc.done());
        assert_eq!(acc.result(), Some(i64::MAX));
    }
}
