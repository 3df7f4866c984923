//! Kernel factory
//!
//! Each engine describes its kernel as a [`KernelVisitor`]; [`dispatch`]
//! instantiates it with the zero-sized operators of a catalog entry, or
//! with the type-erased operators when the semiring is not cataloged.
//! The catalog is fixed per element type by the `catalog!` invocations
//! below.

use crate::semiring::classify::Classification;
use crate::semiring::kernel::{builtin, AddOp, DynAdd, DynMult, MultOp, Positional};
use crate::semiring::ops::{BinaryOpcode, Semiring};
use crate::semiring::scalar::Scalar;

/// A kernel body, generic over the operators it is instantiated with
pub trait KernelVisitor<T: Scalar>: Sized {
    type Output;

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) -> Self::Output;
}

/// Element types with a registry of specialized kernels
pub trait Catalog: Scalar {
    /// True if `(add, mult)` has a specialized kernel for this type
    fn in_catalog(add: BinaryOpcode, mult: BinaryOpcode) -> bool;

    /// Run `visitor` with the specialized operators, or hand it back
    fn dispatch_builtin<V: KernelVisitor<Self>>(
        add: BinaryOpcode,
        mult: BinaryOpcode,
        visitor: V,
    ) -> std::result::Result<V::Output, V>;
}

/// Instantiate `visitor` for the semiring described by `cls`
pub fn dispatch<T, V>(semiring: &Semiring<T>, cls: &Classification, visitor: V) -> V::Output
where
    T: Catalog,
    V: KernelVisitor<T>,
{
    let visitor = match cls.kernel {
        Some(key) => match T::dispatch_builtin(key.add, key.mult, visitor) {
            Ok(out) => return out,
            Err(visitor) => visitor,
        },
        None => visitor,
    };

    log::trace!("generic kernel for {}", semiring.name());
    let add = DynAdd::new(semiring.add());
    if cls.mult.is_positional() {
        visitor.visit(add, Positional::new(cls.mult))
    } else {
        visitor.visit(add, DynMult::new(semiring.multiply(), cls.requested_flip))
    }
}

macro_rules! catalog {
    ($t:ty; $(($add:ident, $mult:ident)),* $(,)?) => {
        impl Catalog for $t {
            fn in_catalog(add: BinaryOpcode, mult: BinaryOpcode) -> bool {
                matches!((add, mult), $((BinaryOpcode::$add, BinaryOpcode::$mult))|*)
            }

            fn dispatch_builtin<V: KernelVisitor<Self>>(
                add: BinaryOpcode,
                mult: BinaryOpcode,
                visitor: V,
            ) -> std::result::Result<V::Output, V> {
                match (add, mult) {
                    $(
                        (BinaryOpcode::$add, BinaryOpcode::$mult) => {
                            Ok(visitor.visit(builtin::$add, builtin::$mult))
                        }
                    )*
                    _ => Err(visitor),
                }
            }
        }
    };
}

// PAIR with an idempotent monoid is renamed to ANY_PAIR before lookup, so
// those combinations are not listed
macro_rules! numeric_catalog {
    ($t:ty $(, ($xa:ident, $xm:ident))*) => {
        catalog!($t;
            (Plus, First), (Plus, Second), (Plus, Oneb), (Plus, Plus), (Plus, Minus),
            (Plus, Times), (Plus, Div), (Plus, Min), (Plus, Max),
            (Times, First), (Times, Second), (Times, Plus), (Times, Times), (Times, Min),
            (Times, Max),
            (Min, First), (Min, Second), (Min, Plus), (Min, Minus), (Min, Times), (Min, Max),
            (Max, First), (Max, Second), (Max, Plus), (Max, Minus), (Max, Times), (Max, Min),
            (Any, First), (Any, Second), (Any, Oneb), (Any, Plus), (Any, Times)
            $(, ($xa, $xm))*
        );
    };
}

macro_rules! positional_catalog {
    ($t:ty) => {
        numeric_catalog!($t,
            (Plus, Firsti), (Plus, Firstj), (Plus, Secondi), (Plus, Secondj),
            (Min, Firsti), (Min, Firstj), (Min, Secondi), (Min, Secondj),
            (Max, Firsti), (Max, Firstj), (Max, Secondi), (Max, Secondj),
            (Any, Firsti), (Any, Firstj), (Any, Secondi), (Any, Secondj)
        );
    };
}

macro_rules! bitwise_catalog {
    ($t:ty) => {
        numeric_catalog!($t,
            (Bor, Band), (Bor, Bor), (Bor, Bxor),
            (Band, Band), (Band, Bor), (Band, Bxor),
            (Bxor, Band), (Bxor, Bor), (Bxor, Bxor)
        );
    };
}

numeric_catalog!(i8);
numeric_catalog!(i16);
positional_catalog!(i32);
positional_catalog!(i64);
bitwise_catalog!(u8);
bitwise_catalog!(u16);
bitwise_catalog!(u32);
bitwise_catalog!(u64);
numeric_catalog!(f32);
numeric_catalog!(f64);

catalog!(bool;
    (Lor, First), (Lor, Second), (Lor, Land), (Lor, Lor), (Lor, Lxor), (Lor, Lxnor),
    (Land, First), (Land, Second), (Land, Land), (Land, Lor), (Land, Lxor), (Land, Lxnor),
    (Lxor, First), (Lxor, Second), (Lxor, Oneb), (Lxor, Land), (Lxor, Lor), (Lxor, Lxor),
    (Lxnor, First), (Lxnor, Second), (Lxnor, Oneb), (Lxnor, Land), (Lxnor, Lor),
    (Lxnor, Lxnor),
    (Any, First), (Any, Second), (Any, Oneb), (Any, Land), (Any, Lor),
);
