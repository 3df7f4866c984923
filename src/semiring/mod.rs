//! Semirings, their element types, and the kernel factory

pub mod classify;
pub mod factory;
pub mod kernel;
pub mod ops;
pub mod scalar;

pub use classify::{classify, Classification, KernelKey};
pub use factory::{dispatch, Catalog, KernelVisitor};
pub use kernel::{AddOp, MultOp};
pub use ops::{BinaryOp, BinaryOpcode, Monoid, Semiring};
pub use scalar::{Scalar, TypeCode};
