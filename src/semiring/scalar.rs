//! Element types of the builtin kernel catalog
//!
//! [`Scalar`] gives every builtin element type its operator semantics,
//! monoid identities and terminals, and an atomic cell used by the
//! in-place engines. Integer arithmetic wraps; integer division follows
//! the usual sparse-library convention (`x/0` saturates, `0/0 == 0`).

use std::fmt::Debug;
use std::sync::atomic::{
    AtomicBool, AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicU16, AtomicU32, AtomicU64,
    AtomicU8, Ordering,
};

use num_traits::{Float, PrimInt, WrappingAdd, WrappingMul, WrappingSub};

use crate::constants::FLOAT_COMPARISON_EPSILON;
use crate::semiring::ops::BinaryOpcode;

/// Type code of a builtin element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Fp32,
    Fp64,
}

impl TypeCode {
    pub fn name(self) -> &'static str {
        match self {
            TypeCode::Bool => "bool",
            TypeCode::Int8 => "int8",
            TypeCode::Int16 => "int16",
            TypeCode::Int32 => "int32",
            TypeCode::Int64 => "int64",
            TypeCode::UInt8 => "uint8",
            TypeCode::UInt16 => "uint16",
            TypeCode::UInt32 => "uint32",
            TypeCode::UInt64 => "uint64",
            TypeCode::Fp32 => "fp32",
            TypeCode::Fp64 => "fp64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeCode::Fp32 | TypeCode::Fp64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeCode::UInt8 | TypeCode::UInt16 | TypeCode::UInt32 | TypeCode::UInt64
        )
    }
}

/// A builtin element type
pub trait Scalar: Copy + Clone + Send + Sync + PartialEq + Default + Debug + 'static {
    const CODE: TypeCode;

    /// Cell used for atomic read-modify-write of one value
    type Atomic: Send + Sync;

    fn zero() -> Self;
    fn one() -> Self;

    /// Value of a positional operator
    fn from_index(i: i64) -> Self;

    fn is_nonzero(self) -> bool;

    /// True if the builtin operator is defined for this type
    fn supports(op: BinaryOpcode) -> bool;

    /// Evaluate a builtin value operator
    fn apply(op: BinaryOpcode, x: Self, y: Self) -> Self;

    /// Identity if `op` is a builtin monoid over this type
    fn identity(op: BinaryOpcode) -> Option<Self>;

    /// Terminal (annihilating) value of the builtin monoid, if any
    fn terminal(op: BinaryOpcode) -> Option<Self>;

    /// True if the in-place engines may update values of this type with `op`
    fn atomic_safe(op: BinaryOpcode) -> bool {
        op != BinaryOpcode::Any && Self::identity(op).is_some()
    }

    fn new_atomic(self) -> Self::Atomic;
    fn load_atomic(cell: &Self::Atomic) -> Self;
    fn into_value(cell: Self::Atomic) -> Self;

    /// Atomically replace the cell's value `v` by `f(v)`
    fn atomic_update<F: Fn(Self) -> Self>(cell: &Self::Atomic, f: F);

    /// Equality up to rounding for floating-point types
    fn approx_eq(self, other: Self) -> bool;
}

#[inline]
fn flag<I: PrimInt>(c: bool) -> I {
    if c {
        I::one()
    } else {
        I::zero()
    }
}

#[inline]
fn int_div<I: PrimInt + WrappingSub>(x: I, y: I) -> I {
    let zero = I::zero();
    if y == zero {
        if x == zero {
            zero
        } else if x > zero {
            I::max_value()
        } else {
            I::min_value()
        }
    } else if I::min_value() < zero && y == zero.wrapping_sub(&I::one()) {
        zero.wrapping_sub(&x)
    } else {
        x / y
    }
}

#[inline]
fn int_apply<I>(op: BinaryOpcode, x: I, y: I) -> I
where
    I: PrimInt + WrappingAdd + WrappingSub + WrappingMul,
{
    use BinaryOpcode::*;
    match op {
        First => x,
        Second | Any => y,
        Oneb => I::one(),
        Min => x.min(y),
        Max => x.max(y),
        Plus => x.wrapping_add(&y),
        Minus => x.wrapping_sub(&y),
        Rminus => y.wrapping_sub(&x),
        Times => x.wrapping_mul(&y),
        Div => int_div(x, y),
        Rdiv => int_div(y, x),
        Iseq => flag(x == y),
        Isne => flag(x != y),
        Isgt => flag(x > y),
        Islt => flag(x < y),
        Isge => flag(x >= y),
        Isle => flag(x <= y),
        Lor => flag(!x.is_zero() || !y.is_zero()),
        Land => flag(!x.is_zero() && !y.is_zero()),
        Lxor => flag(x.is_zero() != y.is_zero()),
        Lxnor => flag(x.is_zero() == y.is_zero()),
        Bor => x | y,
        Band => x & y,
        Bxor => x ^ y,
        Bxnor => !(x ^ y),
        // positional and user operators are evaluated by the kernels
        _ => x,
    }
}

fn int_identity<I: PrimInt>(op: BinaryOpcode) -> Option<I> {
    use BinaryOpcode::*;
    let unsigned = I::min_value() == I::zero();
    match op {
        Plus | Any => Some(I::zero()),
        Times => Some(I::one()),
        Min => Some(I::max_value()),
        Max => Some(I::min_value()),
        Bor | Bxor if unsigned => Some(I::zero()),
        Band | Bxnor if unsigned => Some(!I::zero()),
        _ => None,
    }
}

fn int_terminal<I: PrimInt>(op: BinaryOpcode) -> Option<I> {
    use BinaryOpcode::*;
    let unsigned = I::min_value() == I::zero();
    match op {
        Times => Some(I::zero()),
        Min => Some(I::min_value()),
        Max => Some(I::max_value()),
        Bor if unsigned => Some(!I::zero()),
        Band if unsigned => Some(I::zero()),
        _ => None,
    }
}

#[inline]
fn float_apply<F: Float>(op: BinaryOpcode, x: F, y: F) -> F {
    use BinaryOpcode::*;
    let b = |c: bool| if c { F::one() } else { F::zero() };
    match op {
        First => x,
        Second | Any => y,
        Oneb => F::one(),
        Min => x.min(y),
        Max => x.max(y),
        Plus => x + y,
        Minus => x - y,
        Rminus => y - x,
        Times => x * y,
        Div => x / y,
        Rdiv => y / x,
        Iseq => b(x == y),
        Isne => b(x != y),
        Isgt => b(x > y),
        Islt => b(x < y),
        Isge => b(x >= y),
        Isle => b(x <= y),
        Lor => b(x != F::zero() || y != F::zero()),
        Land => b(x != F::zero() && y != F::zero()),
        Lxor => b((x != F::zero()) != (y != F::zero())),
        Lxnor => b((x != F::zero()) == (y != F::zero())),
        _ => x,
    }
}

fn float_identity<F: Float>(op: BinaryOpcode) -> Option<F> {
    use BinaryOpcode::*;
    match op {
        Plus | Any => Some(F::zero()),
        Times => Some(F::one()),
        Min => Some(F::infinity()),
        Max => Some(F::neg_infinity()),
        _ => None,
    }
}

fn float_terminal<F: Float>(op: BinaryOpcode) -> Option<F> {
    match op {
        BinaryOpcode::Min => Some(F::neg_infinity()),
        BinaryOpcode::Max => Some(F::infinity()),
        _ => None,
    }
}

fn float_approx_eq<F: Float>(a: F, b: F) -> bool {
    if a == b || (a.is_nan() && b.is_nan()) {
        return true;
    }
    let floor: F = num_traits::cast(FLOAT_COMPARISON_EPSILON).unwrap_or_else(F::epsilon);
    let ulps: F = num_traits::cast(1024.0).unwrap_or_else(F::one);
    let eps = floor.max(F::epsilon() * ulps);
    let scale = F::one().max(a.abs()).max(b.abs());
    (a - b).abs() <= eps * scale
}

macro_rules! impl_int_scalar {
    ($t:ty, $code:ident, $atomic:ty) => {
        impl Scalar for $t {
            const CODE: TypeCode = TypeCode::$code;
            type Atomic = $atomic;

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn from_index(i: i64) -> Self {
                i as $t
            }

            #[inline]
            fn is_nonzero(self) -> bool {
                self != 0
            }

            fn supports(op: BinaryOpcode) -> bool {
                op != BinaryOpcode::User
            }

            #[inline]
            fn apply(op: BinaryOpcode, x: Self, y: Self) -> Self {
                int_apply(op, x, y)
            }

            fn identity(op: BinaryOpcode) -> Option<Self> {
                int_identity(op)
            }

            fn terminal(op: BinaryOpcode) -> Option<Self> {
                int_terminal(op)
            }

            fn new_atomic(self) -> $atomic {
                <$atomic>::new(self)
            }

            #[inline]
            fn load_atomic(cell: &$atomic) -> Self {
                cell.load(Ordering::Relaxed)
            }

            fn into_value(cell: $atomic) -> Self {
                cell.into_inner()
            }

            #[inline]
            fn atomic_update<F: Fn(Self) -> Self>(cell: &$atomic, f: F) {
                let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(f(v)));
            }

            fn approx_eq(self, other: Self) -> bool {
                self == other
            }
        }
    };
}

macro_rules! impl_float_scalar {
    ($t:ty, $code:ident, $atomic:ty) => {
        impl Scalar for $t {
            const CODE: TypeCode = TypeCode::$code;
            // stored as raw bits
            type Atomic = $atomic;

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn from_index(i: i64) -> Self {
                i as $t
            }

            #[inline]
            fn is_nonzero(self) -> bool {
                self != 0.0
            }

            fn supports(op: BinaryOpcode) -> bool {
                use BinaryOpcode::*;
                !matches!(op, Bor | Band | Bxor | Bxnor | User)
            }

            #[inline]
            fn apply(op: BinaryOpcode, x: Self, y: Self) -> Self {
                float_apply(op, x, y)
            }

            fn identity(op: BinaryOpcode) -> Option<Self> {
                float_identity(op)
            }

            fn terminal(op: BinaryOpcode) -> Option<Self> {
                float_terminal(op)
            }

            fn new_atomic(self) -> $atomic {
                <$atomic>::new(self.to_bits())
            }

            #[inline]
            fn load_atomic(cell: &$atomic) -> Self {
                <$t>::from_bits(cell.load(Ordering::Relaxed))
            }

            fn into_value(cell: $atomic) -> Self {
                <$t>::from_bits(cell.into_inner())
            }

            #[inline]
            fn atomic_update<F: Fn(Self) -> Self>(cell: &$atomic, f: F) {
                let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                    Some(f(<$t>::from_bits(bits)).to_bits())
                });
            }

            fn approx_eq(self, other: Self) -> bool {
                float_approx_eq(self, other)
            }
        }
    };
}

impl_int_scalar!(i8, Int8, AtomicI8);
impl_int_scalar!(i16, Int16, AtomicI16);
impl_int_scalar!(i32, Int32, AtomicI32);
impl_int_scalar!(i64, Int64, AtomicI64);
impl_int_scalar!(u8, UInt8, AtomicU8);
impl_int_scalar!(u16, UInt16, AtomicU16);
impl_int_scalar!(u32, UInt32, AtomicU32);
impl_int_scalar!(u64, UInt64, AtomicU64);
impl_float_scalar!(f32, Fp32, AtomicU32);
impl_float_scalar!(f64, Fp64, AtomicU64);

impl Scalar for bool {
    const CODE: TypeCode = TypeCode::Bool;
    type Atomic = AtomicBool;

    #[inline]
    fn zero() -> Self {
        false
    }

    #[inline]
    fn one() -> Self {
        true
    }

    #[inline]
    fn from_index(i: i64) -> Self {
        i != 0
    }

    #[inline]
    fn is_nonzero(self) -> bool {
        self
    }

    fn supports(op: BinaryOpcode) -> bool {
        use BinaryOpcode::*;
        !(op.is_positional() || matches!(op, Bor | Band | Bxor | Bxnor | User))
    }

    #[inline]
    fn apply(op: BinaryOpcode, x: Self, y: Self) -> Self {
        use BinaryOpcode::*;
        match op {
            First | Div => x,
            Second | Any | Rdiv => y,
            Oneb => true,
            Min | Times | Land => x && y,
            Max | Plus | Lor => x || y,
            Minus | Rminus | Isne | Lxor => x != y,
            Iseq | Lxnor => x == y,
            Isgt => x && !y,
            Islt => !x && y,
            Isge => x || !y,
            Isle => !x || y,
            _ => x,
        }
    }

    fn identity(op: BinaryOpcode) -> Option<Self> {
        use BinaryOpcode::*;
        match op {
            Lor | Max | Plus | Lxor | Isne | Any => Some(false),
            Land | Min | Times | Lxnor | Iseq => Some(true),
            _ => None,
        }
    }

    fn terminal(op: BinaryOpcode) -> Option<Self> {
        use BinaryOpcode::*;
        match op {
            Lor | Max | Plus => Some(true),
            Land | Min | Times => Some(false),
            _ => None,
        }
    }

    fn new_atomic(self) -> AtomicBool {
        AtomicBool::new(self)
    }

    #[inline]
    fn load_atomic(cell: &AtomicBool) -> Self {
        cell.load(Ordering::Relaxed)
    }

    fn into_value(cell: AtomicBool) -> Self {
        cell.into_inner()
    }

    #[inline]
    fn atomic_update<F: Fn(Self) -> Self>(cell: &AtomicBool, f: F) {
        let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(f(v)));
    }

    fn approx_eq(self, other: Self) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BinaryOpcode::*;

    #[test]
    fn test_integer_division_rules() {
        assert_eq!(i32::apply(Div, 7, 2), 3);
        assert_eq!(i32::apply(Div, 7, 0), i32::MAX);
        assert_eq!(i32::apply(Div, -7, 0), i32::MIN);
        assert_eq!(i32::apply(Div, 0, 0), 0);
        assert_eq!(i32::apply(Div, i32::MIN, -1), i32::MIN);
        assert_eq!(u8::apply(Div, 5, 0), u8::MAX);
        assert_eq!(u8::apply(Rdiv, 2, 9), 4);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(u8::apply(Plus, 250, 10), 4);
        assert_eq!(i8::apply(Times, 64, 4), 0);
        assert_eq!(u16::apply(Rminus, 3, 1), u16::MAX - 1);
    }

    #[test]
    fn test_comparisons_and_logicals() {
        assert_eq!(i64::apply(Isgt, 3, 2), 1);
        assert_eq!(i64::apply(Isle, 3, 2), 0);
        assert_eq!(f64::apply(Iseq, 1.5, 1.5), 1.0);
        assert_eq!(i16::apply(Lxor, 4, 0), 1);
        assert_eq!(u32::apply(Bxnor, 0, 0), u32::MAX);
        assert!(bool::apply(Isge, true, false));
        assert!(!bool::apply(Islt, true, false));
    }

    #[test]
    fn test_bool_renamed_monoids() {
        assert_eq!(bool::identity(Plus), Some(false));
        assert_eq!(bool::identity(Times), Some(true));
        assert_eq!(bool::terminal(Max), Some(true));
        assert!(bool::apply(Plus, true, false));
        assert!(!bool::apply(Minus, true, true));
    }

    #[test]
    fn test_bitwise_monoids_unsigned_only() {
        assert_eq!(u8::identity(Band), Some(u8::MAX));
        assert_eq!(u8::terminal(Bor), Some(u8::MAX));
        assert_eq!(i8::identity(Band), None);
        assert!(!f32::supports(Bor));
    }

    #[test]
    fn test_float_min_max_ignore_nan() {
        assert_eq!(f64::apply(Min, f64::NAN, 2.0), 2.0);
        assert_eq!(f64::apply(Max, 1.0, f64::NAN), 1.0);
        assert_eq!(f64::terminal(Max), Some(f64::INFINITY));
        assert_eq!(f64::terminal(Plus), None);
    }

    #[test]
    fn test_atomic_update_float_bits() {
        let cell = 1.5f64.new_atomic();
        f64::atomic_update(&cell, |v| v + 2.0);
        f64::atomic_update(&cell, |v| v * 2.0);
        assert_eq!(f64::into_value(cell), 7.0);

        let cell = 3i32.new_atomic();
        i32::atomic_update(&cell, |v| v.max(9));
        assert_eq!(i32::load_atomic(&cell), 9);
    }

    #[test]
    fn test_atomic_safety() {
        assert!(f64::atomic_safe(Plus));
        assert!(!f64::atomic_safe(Any));
        assert!(!f64::atomic_safe(User));
        assert!(bool::atomic_safe(Lor));
    }

    #[test]
    fn test_approx_eq() {
        assert!(0.1f64.approx_eq(0.1 + 1e-14));
        assert!(!1.0f64.approx_eq(1.001));
        assert!(f32::NAN.approx_eq(f32::NAN));
        assert!(!3i32.approx_eq(4));
    }
}
