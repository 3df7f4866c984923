//! Configuration and system parameters for AxB

use crate::constants::*;

/// User override of the multiplication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxbMethod {
    /// Let the method selector decide
    #[default]
    Default,
    /// Dot-product family (dot2, dot3)
    Dot,
    /// Outer-product family (saxpy3, bitmap saxpy)
    Saxpy,
    /// Saxpy3 with hash tables in every task
    Hash,
    /// Saxpy3 with Gustavson tables in every task
    Gustavson,
}

/// System parameters for performance tuning
#[derive(Debug, Clone)]
pub struct SystemParameters {
    /// Size of cache line in bytes
    pub cache_line_size: usize,
    /// Maximum number of threads to use
    pub n_threads: usize,
    /// Minimum work given to one thread
    pub chunk: f64,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
            n_threads: num_cpus::get(), // Use all available cores
            chunk: DEFAULT_CHUNK,
        }
    }
}

/// Tuned thresholds consulted by the method selector and the task slicers.
///
/// These are performance heuristics: any value produces correct results.
#[derive(Debug, Clone)]
pub struct Heuristics {
    pub dot_cnz_tiny: usize,
    pub dot_flop_ratio: f64,
    pub dot_row_degree: f64,
    pub dot_col_degree: f64,
    pub saxpy_tasks_per_thread: usize,
    pub dot_tasks_per_thread: usize,
    pub costly: f64,
    pub fine_work: f64,
    pub gustavson_fraction: f64,
    pub mask_discard_ratio: f64,
    pub mask_discard_floor: f64,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            dot_cnz_tiny: DOT_CNZ_TINY,
            dot_flop_ratio: DOT_FLOP_RATIO,
            dot_row_degree: DOT_ROW_DEGREE,
            dot_col_degree: DOT_COL_DEGREE,
            saxpy_tasks_per_thread: SAXPY_TASKS_PER_THREAD,
            dot_tasks_per_thread: DOT_TASKS_PER_THREAD,
            costly: COSTLY,
            fine_work: FINE_WORK,
            gustavson_fraction: GUSTAVSON_FRACTION,
            mask_discard_ratio: MASK_DISCARD_RATIO,
            mask_discard_floor: MASK_DISCARD_FLOOR,
        }
    }
}

/// Configuration for one call of the AxB engine
#[derive(Debug, Clone, Default)]
pub struct AxbConfig {
    /// System parameters for performance tuning
    pub system_params: SystemParameters,

    /// Method-selection and slicing thresholds
    pub heuristics: Heuristics,

    /// Upper bound on the flops one saxpy3 pass may take on.
    ///
    /// If None, B is never split into batches.
    pub max_batch_flops: Option<usize>,
}

impl AxbConfig {
    /// Create a config that runs on exactly `n_threads` threads
    pub fn with_threads(n_threads: usize) -> Self {
        let mut config = Self::default();
        config.system_params.n_threads = n_threads.max(1);
        config
    }

    /// Create a config whose chunk size is small enough that tiny test
    /// problems are still split across all threads
    pub fn fine_grained(n_threads: usize) -> Self {
        let mut config = Self::with_threads(n_threads);
        config.system_params.chunk = 1.0;
        config
    }

    pub(crate) fn max_threads(&self) -> usize {
        self.system_params.n_threads.max(1)
    }

    pub(crate) fn chunk(&self) -> f64 {
        if self.system_params.chunk > 0.0 {
            self.system_params.chunk
        } else {
            DEFAULT_CHUNK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_mirror_constants() {
        let config = AxbConfig::default();
        assert_eq!(config.heuristics.dot_cnz_tiny, DOT_CNZ_TINY);
        assert_eq!(config.heuristics.costly, COSTLY);
        assert!(config.max_threads() >= 1);
        assert!(config.max_batch_flops.is_none());
    }

    #[test]
    fn test_with_threads_never_zero() {
        assert_eq!(AxbConfig::with_threads(0).max_threads(), 1);
        assert_eq!(AxbConfig::with_threads(3).max_threads(), 3);
    }

    #[test]
    fn test_fine_grained_chunk() {
        let config = AxbConfig::fine_grained(4);
        assert_eq!(config.chunk(), 1.0);
    }
}
