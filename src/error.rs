//! Error types for AxB

use thiserror::Error;

/// Result type alias using the crate's error
pub type Result<T> = std::result::Result<T, AxbError>;

/// Errors that can occur while computing `C = A*B`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AxbError {
    /// An allocation failed; all partial workspace has been released
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// The selected method cannot handle this input combination.
    ///
    /// Never returned by [`crate::axb`]; the method selector moves on to the
    /// next candidate instead.
    #[error("Method declined the input combination")]
    Declined,

    /// Operand, mask, or output dimensions do not agree
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An operator is not defined for the element type
    #[error("Domain mismatch: {0}")]
    DomainMismatch(String),

    /// A matrix violates its structural invariants
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// An argument has an invalid value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// An internal invariant of a shared scratch table was violated
    #[error("Internal invariant violated: {0}")]
    Panic(String),

    /// The per-call thread pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl AxbError {
    /// Returns true if this is the internal "try the next method" signal
    pub fn is_declined(&self) -> bool {
        matches!(self, AxbError::Declined)
    }
}

impl From<std::collections::TryReserveError> for AxbError {
    fn from(_: std::collections::TryReserveError) -> Self {
        AxbError::OutOfMemory { size: usize::MAX }
    }
}

impl From<rayon::ThreadPoolBuildError> for AxbError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        AxbError::ThreadPool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_is_distinct() {
        assert!(AxbError::Declined.is_declined());
        assert!(!AxbError::OutOfMemory { size: 8 }.is_declined());
    }

    #[test]
    fn test_messages() {
        let err = AxbError::DimensionMismatch("A is 2x3, B is 4x4".to_string());
        assert_eq!(err.to_string(), "Dimension mismatch: A is 2x3, B is 4x4");
    }
}
