//! Centralized constants for the AxB sparse matrix multiplication engine
//!
//! Every tuned threshold used by method selection and task construction lives
//! here. The values are empirically tuned performance heuristics: changing
//! them alters which engine runs and how work is split, never the result.
//! Most of them are copied into [`crate::matrix::config::Heuristics`] so a
//! caller can override them per call.

// ============================================================================
// THREADING
// ============================================================================

/// Minimum amount of work (flops or entries) given to one thread
pub const DEFAULT_CHUNK: f64 = 64.0 * 1024.0;

/// Common cache line size in bytes
pub const DEFAULT_CACHE_LINE_SIZE: usize = 64;

// ============================================================================
// DOT VS SAXPY COST MODEL
// ============================================================================

/// A dense result with at most this many entries always uses the dot engine
pub const DOT_CNZ_TINY: usize = 100;

/// Dot is used when `cnz * DOT_FLOP_RATIO < nnz(A) + nnz(B)`
pub const DOT_FLOP_RATIO: f64 = 10_000.0;

/// Upper bound on the average entries per row of A for the degree rule
pub const DOT_ROW_DEGREE: f64 = 0.125;

/// Lower bound on the average entries per column of A for the degree rule
pub const DOT_COL_DEGREE: f64 = 1200.0;

// ============================================================================
// TASK CONSTRUCTION
// ============================================================================

/// Initial number of saxpy3 tasks per thread
pub const SAXPY_TASKS_PER_THREAD: usize = 2;

/// Number of dot2 tasks per thread
pub const DOT_TASKS_PER_THREAD: usize = 32;

/// A vector is costly (and split into fine tasks) above this multiple of the
/// per-task target
pub const COSTLY: f64 = 1.2;

/// Fine tasks are this many times smaller than the coarse target
pub const FINE_WORK: f64 = 2.0;

// ============================================================================
// SCRATCH TABLES
// ============================================================================

/// A task switches from hash to Gustavson when its hash table would exceed
/// this fraction of the output vector length
pub const GUSTAVSON_FRACTION: f64 = 0.5;

/// Multiplier of the open-addressing hash function
pub const HASH_FACTOR: usize = 257;

/// A Gustavson vector with more than `vlen / GUSTAVSON_SCAN_DIVISOR` entries
/// is gathered by scanning the table instead of sorting
pub const GUSTAVSON_SCAN_DIVISOR: usize = 16;

// ============================================================================
// MASK HANDLING
// ============================================================================

/// The saxpy mask is discarded when `nnz(M) > ratio * flops + floor`
pub const MASK_DISCARD_RATIO: f64 = 10.0;

/// Additive floor of the mask-discard rule
pub const MASK_DISCARD_FLOOR: f64 = 64.0;

// ============================================================================
// DOT-PRODUCT INNER LOOPS
// ============================================================================

/// Sparse-sparse dot products switch to binary-search skipping when one
/// vector is this many times longer than the other
pub const DOT_SKIP_RATIO: usize = 32;

// ============================================================================
// SORTING
// ============================================================================

/// Below this length the merge sort runs sequentially
pub const PAR_SORT_CUTOFF: usize = 8 * 1024;

// ============================================================================
// SPARSITY CONTROL
// ============================================================================

/// A sparse result is made hypersparse when fewer than
/// `vdim * HYPER_SWITCH` of its vectors are non-empty
pub const HYPER_SWITCH: f64 = 0.0625;

// ============================================================================
// DISPLAY AND DEBUG CONSTANTS
// ============================================================================

/// Maximum vectors to print in debug display
pub const MAX_DISPLAY_VECTORS: usize = 5;

/// Maximum entries per vector in debug display
pub const MAX_DISPLAY_ELEMENTS_PER_VECTOR: usize = 5;

// ============================================================================
// FLOATING POINT TOLERANCES
// ============================================================================

/// Standard floating point comparison epsilon
pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-10;
