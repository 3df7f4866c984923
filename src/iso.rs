//! Iso-result detection
//!
//! Decides from the operator algebra and the operands' iso and full status
//! whether every entry of `C = A*B` must hold the same value. When it does,
//! the engines only compute the pattern of C and store the value once.

use crate::matrix::Matrix;
use crate::semiring::{BinaryOpcode, Classification, Scalar, Semiring};

/// Which row of the decision table produced an iso result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoRule {
    /// PAIR with an order-insensitive monoid: every entry is one
    Pair,
    /// SECOND with an iso B
    SecondOfIso,
    /// FIRST with an iso A
    FirstOfIso,
    /// Both operands iso with an order-insensitive monoid
    BothIso,
    /// Both operands full and iso: `n` equal products reduced by the monoid
    FullReduction,
}

/// The single value of an iso result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoValue<T> {
    pub value: T,
    pub rule: IsoRule,
    /// Monoid applications spent computing `value`
    pub monoid_calls: usize,
}

/// Reduce `n` copies of `t` with `add` in O(log n) applications.
///
/// Returns the sum and the number of applications of `add`. `n` must be
/// positive.
pub fn reduce_copies<T: Copy>(t: T, n: usize, add: impl Fn(T, T) -> T) -> (T, usize) {
    debug_assert!(n > 0);
    let mut calls = 0;
    let mut acc: Option<T> = None;
    let mut power = t;
    let mut n = n;
    while n > 0 {
        if n & 1 == 1 {
            acc = Some(match acc {
                None => power,
                Some(a) => {
                    calls += 1;
                    add(a, power)
                }
            });
        }
        n >>= 1;
        if n > 0 {
            power = add(power, power);
            calls += 1;
        }
    }
    (acc.unwrap_or(t), calls)
}

/// Decide whether `C = A*B` is iso.
///
/// # Arguments
/// * `a`, `b` - The operands, `A` of size `m×n` and `B` of size `n×p`
/// * `n` - Inner dimension
/// * `semiring` - Semiring of the call
/// * `cls` - Its classification, flip already normalized
/// * `ignore_monoid` - True when the caller never applies the monoid
///
/// # Returns
/// The iso value of C, or None if C is not iso
pub fn iso_result<T: Scalar>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    n: usize,
    semiring: &Semiring<T>,
    cls: &Classification,
    ignore_monoid: bool,
) -> Option<IsoValue<T>> {
    if cls.mult.is_positional() {
        return None;
    }
    let order_free = ignore_monoid || cls.monoid_is_idempotent();
    let found = |value, rule| {
        Some(IsoValue {
            value,
            rule,
            monoid_calls: 0,
        })
    };
    let product = |x: T, y: T| {
        if cls.requested_flip {
            semiring.multiply().apply(y, x)
        } else {
            semiring.multiply().apply(x, y)
        }
    };

    if cls.mult == BinaryOpcode::Oneb && order_free {
        return found(T::one(), IsoRule::Pair);
    }
    if cls.mult == BinaryOpcode::Second && order_free {
        if let Some(v) = b.iso_value() {
            return found(v, IsoRule::SecondOfIso);
        }
    }
    if cls.mult == BinaryOpcode::First && order_free {
        if let Some(v) = a.iso_value() {
            return found(v, IsoRule::FirstOfIso);
        }
    }
    let (av, bv) = (a.iso_value()?, b.iso_value()?);
    if order_free {
        return found(product(av, bv), IsoRule::BothIso);
    }
    if n > 0 && a.structure().is_as_if_full() && b.structure().is_as_if_full() {
        let t = product(av, bv);
        let (value, monoid_calls) = reduce_copies(t, n, |x, y| semiring.add().apply(x, y));
        return Some(IsoValue {
            value,
            rule: IsoRule::FullReduction,
            monoid_calls,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::{classify, BinaryOp, Monoid};

    fn run<T: crate::semiring::Catalog>(
        a: &Matrix<T>,
        b: &Matrix<T>,
        s: &Semiring<T>,
        flip: bool,
    ) -> Option<IsoValue<T>> {
        let cls = classify(s, flip);
        iso_result(a, b, a.ncols(), s, &cls, false)
    }

    #[test]
    fn test_reduce_copies_is_logarithmic() {
        for n in 1..200usize {
            let (v, calls) = reduce_copies(3u64, n, |x, y| x + y);
            assert_eq!(v, 3 * n as u64);
            let log = usize::BITS - n.leading_zeros();
            assert!(calls <= 2 * log as usize, "n={n} calls={calls}");
        }
        assert_eq!(reduce_copies(6.0, 4, |x, y| x + y), (24.0, 2));
    }

    #[test]
    fn test_full_iso_plus_times() {
        let a = Matrix::iso_full(4, 4, 2.0f64);
        let b = Matrix::iso_full(4, 4, 3.0f64);
        let iso = run(&a, &b, &Semiring::plus_times(), false).unwrap();
        assert_eq!(iso.value, 24.0);
        assert_eq!(iso.rule, IsoRule::FullReduction);
        assert_eq!(iso.monoid_calls, 2);
    }

    #[test]
    fn test_pair_with_idempotent_monoid() {
        let a = Matrix::from_triplets(2, 2, &[(0, 0, 5i32), (1, 1, 7)]).unwrap();
        let s = Semiring::new(Monoid::max(), BinaryOp::pair());
        assert_eq!(run(&a, &a, &s, false).map(|v| v.value), Some(1));
        assert_eq!(run(&a, &a, &Semiring::plus_pair(), false), None);
    }

    #[test]
    fn test_first_and_second_of_iso() {
        let iso = Matrix::iso_sparse(2, 2, vec![0, 1, 2], vec![0, 1], 9i64).unwrap();
        let plain = Matrix::from_triplets(2, 2, &[(0, 0, 1i64), (1, 0, 2)]).unwrap();
        let min_first = Semiring::min_first();
        assert_eq!(
            run(&iso, &plain, &min_first, false).map(|v| v.rule),
            Some(IsoRule::FirstOfIso)
        );
        // flipped FIRST is SECOND, which reads the plain B
        assert_eq!(run(&plain, &iso, &min_first, false), None);
        assert_eq!(
            run(&plain, &iso, &min_first, true).map(|v| v.value),
            Some(9)
        );
    }

    #[test]
    fn test_positional_is_never_iso() {
        let a = Matrix::iso_full(3, 3, 1i32);
        let s = Semiring::builtin(BinaryOpcode::Any, BinaryOpcode::Firsti).unwrap();
        assert_eq!(run(&a, &a, &s, false), None);
    }
}
