//! # AxB: semiring sparse matrix-matrix multiplication
//!
//! Computes `C = A*B`, `C<M> = A*B`, `C<!M> = A*B` and `C += A*B` over an
//! arbitrary semiring, for matrices held by column in any of four layouts
//! (sparse, hypersparse, bitmap, full), optionally iso-valued.
//!
//! ## Overview
//!
//! A call is classified (semiring, operand layouts, mask, in-place
//! eligibility) and handed to one of several engines:
//!
//! - **Dot products** (`dot2`, `dot3`, `dot4`): `C(i,j) = A(:,i)'*B(:,j)`,
//!   best when C is small or restricted by a sparse mask
//! - **Saxpy** (`saxpy3`, bitmap saxpy, `saxpy4`, `saxpy5`):
//!   `C(:,j) = sum A(:,k)*B(k,j)`, with per-task Gustavson or hash tables
//! - **Scaling**: `C = A*D` and `C = D*B` for a diagonal operand
//!
//! Each engine may decline an input it cannot serve; the next candidate
//! then runs. The saxpy3 engine serves every input.
//!
//! ## Usage
//!
//! ```
//! use axb::{axb, AxbConfig, AxbDescriptor, Matrix, Semiring};
//!
//! let a = Matrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 0, 2.0), (1, 1, 3.0)]).unwrap();
//! let b = Matrix::from_triplets(2, 2, &[(0, 1, 4.0), (1, 1, 5.0)]).unwrap();
//!
//! let out = axb(
//!     None,
//!     None,
//!     None,
//!     &Semiring::plus_times(),
//!     &a,
//!     &b,
//!     &AxbDescriptor { sort: true, ..Default::default() },
//!     &AxbConfig::default(),
//! )
//! .unwrap();
//! let c = out.result.unwrap();
//! assert_eq!(c.get(1, 1), Some(23.0));
//! ```

pub mod accumulator;
pub mod constants;
pub mod dot;
pub mod error;
pub mod iso;
pub mod matrix;
pub mod method;
pub mod mxm;
pub mod reconcile;
pub mod saxpy;
pub mod scale;
pub mod semiring;
pub mod slice;
pub mod utils;

// Re-export primary components
pub use error::{AxbError, Result};
pub use matrix::config::{AxbConfig, AxbMethod, Heuristics, SystemParameters};
pub use matrix::{reference_mxm, Mask, Matrix, Sparsity};
pub use method::Method;
pub use mxm::{axb, AxbDescriptor, AxbOutcome};
pub use semiring::{BinaryOp, BinaryOpcode, Catalog, Monoid, Scalar, Semiring};
pub use utils::formats::{from_dense, from_sprs, to_dense, to_sprs_csc};

/// Version information for the AxB library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
