//! Operator traits the engines are generic over
//!
//! Every engine is written once against [`AddOp`] and [`MultOp`]. The
//! builtin operators are zero-sized types so each catalog entry compiles
//! to its own specialized kernel; [`DynAdd`], [`DynMult`] and
//! [`Positional`] are the type-erased fallbacks.

use crate::semiring::ops::{positional_value, BinaryOp, BinaryOpcode, Monoid};
use crate::semiring::scalar::Scalar;

/// Additive monoid as seen by a kernel
pub trait AddOp<T: Scalar>: Copy + Send + Sync {
    /// True for the ANY monoid: the first value found is final
    const IS_ANY: bool = false;

    fn add(&self, x: T, y: T) -> T;
    fn identity(&self) -> T;
    fn terminal(&self) -> Option<T>;

    /// True once `x` can no longer change under further additions
    #[inline]
    fn is_terminal(&self, x: T) -> bool {
        Self::IS_ANY || matches!(self.terminal(), Some(t) if t == x)
    }
}

/// Multiplicative operator of `C(i,j) += A(i,k) * B(k,j)`
pub trait MultOp<T: Scalar>: Copy + Send + Sync {
    fn mult(&self, aik: T, bkj: T, i: usize, k: usize, j: usize) -> T;
}

/// Zero-sized builtin operators
pub mod builtin {
    use super::*;

    macro_rules! value_ops {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy, Default)]
                pub struct $name;

                impl<T: Scalar> MultOp<T> for $name {
                    #[inline(always)]
                    fn mult(&self, aik: T, bkj: T, _i: usize, _k: usize, _j: usize) -> T {
                        T::apply(BinaryOpcode::$name, aik, bkj)
                    }
                }
            )*
        };
    }

    macro_rules! monoids {
        ($($name:ident),* $(,)?) => {
            $(
                impl<T: Scalar> AddOp<T> for $name {
                    #[inline(always)]
                    fn add(&self, x: T, y: T) -> T {
                        T::apply(BinaryOpcode::$name, x, y)
                    }

                    #[inline]
                    fn identity(&self) -> T {
                        T::identity(BinaryOpcode::$name).unwrap_or_default()
                    }

                    #[inline]
                    fn terminal(&self) -> Option<T> {
                        T::terminal(BinaryOpcode::$name)
                    }
                }
            )*
        };
    }

    macro_rules! positional_ops {
        ($($name:ident),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy, Default)]
                pub struct $name;

                impl<T: Scalar> MultOp<T> for $name {
                    #[inline(always)]
                    fn mult(&self, _aik: T, _bkj: T, i: usize, k: usize, j: usize) -> T {
                        positional_value(BinaryOpcode::$name, i, k, j)
                    }
                }
            )*
        };
    }

    value_ops!(
        First, Second, Oneb, Min, Max, Plus, Minus, Rminus, Times, Div, Rdiv, Iseq, Isne, Isgt,
        Islt, Isge, Isle, Lor, Land, Lxor, Lxnor, Bor, Band, Bxor, Bxnor,
    );
    monoids!(Min, Max, Plus, Times, Lor, Land, Lxor, Lxnor, Bor, Band, Bxor, Bxnor);
    positional_ops!(Firsti, Firsti1, Firstj, Firstj1, Secondi, Secondi1, Secondj, Secondj1);

    #[derive(Debug, Clone, Copy, Default)]
    pub struct Any;

    impl<T: Scalar> AddOp<T> for Any {
        const IS_ANY: bool = true;

        #[inline(always)]
        fn add(&self, _x: T, y: T) -> T {
            y
        }

        #[inline]
        fn identity(&self) -> T {
            T::default()
        }

        #[inline]
        fn terminal(&self) -> Option<T> {
            None
        }
    }
}

/// Monoid evaluated through its handle
#[derive(Clone, Copy)]
pub struct DynAdd<'a, T> {
    monoid: &'a Monoid<T>,
    identity: T,
    terminal: Option<T>,
}

impl<'a, T: Scalar> DynAdd<'a, T> {
    pub fn new(monoid: &'a Monoid<T>) -> Self {
        Self {
            monoid,
            identity: monoid.identity(),
            terminal: monoid.terminal(),
        }
    }
}

impl<T: Scalar> AddOp<T> for DynAdd<'_, T> {
    #[inline]
    fn add(&self, x: T, y: T) -> T {
        self.monoid.apply(x, y)
    }

    fn identity(&self) -> T {
        self.identity
    }

    fn terminal(&self) -> Option<T> {
        self.terminal
    }
}

/// Multiplier evaluated through its handle, honoring a requested flip
#[derive(Clone, Copy)]
pub struct DynMult<'a, T> {
    op: &'a BinaryOp<T>,
    flipxy: bool,
}

impl<'a, T: Scalar> DynMult<'a, T> {
    pub fn new(op: &'a BinaryOp<T>, flipxy: bool) -> Self {
        Self { op, flipxy }
    }
}

impl<T: Scalar> MultOp<T> for DynMult<'_, T> {
    #[inline]
    fn mult(&self, aik: T, bkj: T, _i: usize, _k: usize, _j: usize) -> T {
        if self.flipxy {
            self.op.apply(bkj, aik)
        } else {
            self.op.apply(aik, bkj)
        }
    }
}

/// Positional multiplier selected at run time; never reads operand values
#[derive(Debug, Clone, Copy)]
pub struct Positional {
    opcode: BinaryOpcode,
}

impl Positional {
    pub fn new(opcode: BinaryOpcode) -> Self {
        Self { opcode }
    }
}

impl<T: Scalar> MultOp<T> for Positional {
    #[inline]
    fn mult(&self, _aik: T, _bkj: T, i: usize, k: usize, j: usize) -> T {
        positional_value(self.opcode, i, k, j)
    }
}
