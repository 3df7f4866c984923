//! Task construction for the masked dot product
//!
//! The result takes the mask's pattern, so the work is sliced over the
//! mask's entries. Each entry costs about the length of the two vectors
//! whose inner product it needs. Slices that stay inside one vector are
//! fine tasks; the others cover whole vectors and are coarse.

use rayon::prelude::*;

use crate::matrix::pattern::{unflip_index, Structure};
use crate::slice::{ek_slice_at, pslice, vector_offsets};

/// Slots `pstart..pend` of the mask, touching vectors `kfirst..=klast`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskTask {
    pub kfirst: usize,
    pub klast: usize,
    pub pstart: usize,
    pub pend: usize,
    /// True if the task covers only part of one vector
    pub fine: bool,
}

/// Slice the mask's slots into about `ntasks` tasks of equal estimated work.
///
/// # Arguments
/// * `m` - Structure of the mask (sparse or hypersparse)
/// * `at` - Structure of `A'`: vector `i` is row `i` of A
/// * `b` - Structure of B
/// * `ntasks` - Desired number of tasks
pub fn plan_mask_tasks(m: &Structure, at: &Structure, b: &Structure, ntasks: usize) -> Vec<MaskTask> {
    let p = vector_offsets(m);
    let nnz = p.last().copied().unwrap_or(0);
    if nnz == 0 {
        return Vec::new();
    }

    let per_vector: Vec<Vec<usize>> = (0..m.nvec())
        .into_par_iter()
        .map(|k| {
            let blen = b.range_of(m.vector_index(k)).len();
            m.vector_range(k)
                .map(|q| 1 + blen + at.range_of(unflip_index(m.index(q))).len())
                .collect()
        })
        .collect();

    let mut cumulative = Vec::with_capacity(nnz + 1);
    cumulative.push(0);
    for w in per_vector.iter().flatten() {
        let last = cumulative.last().copied().unwrap_or(0);
        cumulative.push(last + w);
    }

    let bounds = pslice(&cumulative, ntasks.clamp(1, nnz));
    ek_slice_at(&p, &bounds)
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|s| MaskTask {
            kfirst: s.kfirst,
            klast: s.klast,
            pstart: s.pstart,
            pend: s.pend,
            fine: s.kfirst == s.klast && (s.pstart > p[s.kfirst] || s.pend < p[s.kfirst + 1]),
        })
        .collect()
}
