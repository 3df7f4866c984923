//! Operator classification
//!
//! Decides whether a semiring maps onto a specialized kernel, normalizes
//! flipped and boolean operators, and detects operands whose values the
//! result never reads.

use crate::semiring::factory::Catalog;
use crate::semiring::ops::{BinaryOpcode, Semiring};
use crate::semiring::scalar::TypeCode;

/// Key of a specialized kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub add: BinaryOpcode,
    pub mult: BinaryOpcode,
    pub ty: TypeCode,
}

/// Outcome of classifying a semiring for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Specialized kernel, or None for the generic path
    pub kernel: Option<KernelKey>,
    /// Normalized monoid opcode (`User` for user monoids)
    pub add: BinaryOpcode,
    /// Normalized multiply opcode, flip already applied for builtins
    pub mult: BinaryOpcode,
    /// Flip still to be honored by the generic kernel
    pub flipxy: bool,
    /// Flip requested by the caller
    pub requested_flip: bool,
    /// The result never reads values of A
    pub a_is_pattern: bool,
    /// The result never reads values of B
    pub b_is_pattern: bool,
}

impl Classification {
    pub fn is_builtin(&self) -> bool {
        self.kernel.is_some()
    }

    /// True if the monoid is ANY or combines equal values to themselves
    pub fn monoid_is_idempotent(&self) -> bool {
        self.add != BinaryOpcode::User && self.add.is_idempotent()
    }
}

/// Boolean renaming applied to both the monoid and the multiplier
fn rename_bool(op: BinaryOpcode) -> BinaryOpcode {
    use BinaryOpcode::*;
    match op {
        Min | Times => Land,
        Max | Plus => Lor,
        Minus | Rminus | Isne => Lxor,
        Iseq => Lxnor,
        Div => First,
        Rdiv => Second,
        op => op,
    }
}

/// Classify `semiring` over element type `T`.
///
/// # Arguments
/// * `semiring` - The semiring of the call
/// * `flipxy` - True if the multiplier is to be applied as `f(b, a)`
///
/// # Returns
/// The normalized classification; `kernel` is set only for catalog entries
pub fn classify<T: Catalog>(semiring: &Semiring<T>, flipxy: bool) -> Classification {
    let mut add = semiring.add().opcode();
    let mut mult = semiring.multiply().opcode();
    let mut flip = flipxy;

    if flip && mult != BinaryOpcode::User {
        if let Some(mirror) = mult.flipped() {
            mult = mirror;
            flip = false;
        }
    }

    if mult == BinaryOpcode::Any {
        mult = BinaryOpcode::Second;
    }

    if T::CODE == TypeCode::Bool {
        if add != BinaryOpcode::User {
            add = rename_bool(add);
        }
        mult = rename_bool(mult);
    }

    if mult == BinaryOpcode::Oneb && add != BinaryOpcode::User && add.is_idempotent() {
        add = BinaryOpcode::Any;
    }

    let (a_is_pattern, b_is_pattern) = if flip {
        (false, false)
    } else {
        (!mult.uses_x(), !mult.uses_y())
    };

    let kernel = if !flip
        && add != BinaryOpcode::User
        && mult != BinaryOpcode::User
        && T::in_catalog(add, mult)
    {
        Some(KernelKey {
            add,
            mult,
            ty: T::CODE,
        })
    } else {
        None
    };

    Classification {
        kernel,
        add,
        mult,
        flipxy: flip,
        requested_flip: flipxy,
        a_is_pattern,
        b_is_pattern,
    }
}
