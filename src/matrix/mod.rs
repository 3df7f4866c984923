// Matrix data structures and operations

pub mod config;
pub mod conversion;
pub mod diag;
pub mod mask;
pub mod pattern;
pub mod reference;
pub mod sparse;

pub use config::{AxbConfig, AxbMethod, Heuristics, SystemParameters};
pub use diag::is_diagonal;
pub use mask::Mask;
pub use pattern::{Layout, Sparsity, Structure};
pub use reference::reference_mxm;
pub use sparse::Matrix;
