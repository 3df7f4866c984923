//! Task slicing and load balancing
//!
//! Every engine turns irregular sparse structure into a list of tasks of
//! roughly equal work. The building blocks live here: the thread-count
//! policy, partitioning of a cumulative work array, and slicing of a
//! matrix's entries. Engine-specific task construction is in the
//! submodules.

pub mod mask_tasks;
pub mod saxpy_tasks;

use std::ops::Range;

use crate::matrix::pattern::Structure;

pub use mask_tasks::{plan_mask_tasks, MaskTask};
pub use saxpy_tasks::{plan_saxpy3, saxpy_flops, SaxpyPlan, SaxpyTask, SaxpyWork};

/// Number of threads to use for `work` units of work.
///
/// Each thread gets at least `chunk` units; the result is between 1 and
/// `max_threads`.
pub fn nthreads_for_work(work: f64, chunk: f64, max_threads: usize) -> usize {
    let max_threads = max_threads.max(1);
    if !(work > 0.0) || !(chunk > 0.0) {
        return 1;
    }
    let n = (work / chunk).floor();
    if n >= max_threads as f64 {
        max_threads
    } else {
        (n as usize).max(1)
    }
}

/// Partition a cumulative work array into `ntasks` contiguous ranges.
///
/// `cumulative` has one more entry than there are items, starts at zero and
/// is non-decreasing. Returns `ntasks + 1` boundaries `b` such that task
/// `t` owns items `b[t]..b[t+1]` and the work of each task is close to
/// `total / ntasks`.
pub fn pslice(cumulative: &[usize], ntasks: usize) -> Vec<usize> {
    let ntasks = ntasks.max(1);
    if cumulative.len() < 2 {
        return vec![0; ntasks + 1];
    }
    let n = cumulative.len() - 1;
    let total = cumulative[n];
    let mut bounds = Vec::with_capacity(ntasks + 1);
    bounds.push(0);
    for t in 1..ntasks {
        let target = ((total as u128 * t as u128) / ntasks as u128) as usize;
        let mut k = cumulative.partition_point(|&w| w < target).min(n);
        // take the boundary whose prefix is nearest the target
        if k > 0 && target - cumulative[k - 1] < cumulative[k].saturating_sub(target) {
            k -= 1;
        }
        let prev = bounds.last().copied().unwrap_or(0);
        bounds.push(k.max(prev));
    }
    bounds.push(n);
    bounds
}

/// Cumulative entry counts of the vectors of `s`: `p` for sparse and
/// hypersparse, multiples of `vlen` for bitmap and full
pub fn vector_offsets(s: &Structure) -> Vec<usize> {
    match s.p() {
        Some(p) => p.to_vec(),
        None => (0..=s.vdim).map(|k| k * s.vlen).collect(),
    }
}

/// A contiguous range of a matrix's entries with the vectors it touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySlice {
    /// First vector holding an entry of the slice
    pub kfirst: usize,
    /// Last vector holding an entry of the slice (inclusive)
    pub klast: usize,
    /// Entries `pstart..pend`
    pub pstart: usize,
    pub pend: usize,
}

impl EntrySlice {
    /// Part of vector `k`'s entries covered by this slice
    pub fn clip(&self, k: usize, p: &[usize]) -> Range<usize> {
        p[k].max(self.pstart)..p[k + 1].min(self.pend)
    }

    pub fn is_empty(&self) -> bool {
        self.pstart >= self.pend
    }
}

/// Vector holding entry `q` of offsets `p`
fn vector_of(p: &[usize], q: usize) -> usize {
    // last k with p[k] <= q; empty vectors before a non-empty one are skipped
    p.partition_point(|&pk| pk <= q).saturating_sub(1)
}

/// Slice the entries of offsets `p` at the given entry boundaries.
///
/// Vectors may be split between neighbouring slices.
pub fn ek_slice_at(p: &[usize], entry_bounds: &[usize]) -> Vec<EntrySlice> {
    entry_bounds
        .windows(2)
        .map(|w| {
            let (pstart, pend) = (w[0], w[1]);
            if pstart >= pend {
                let k = vector_of(p, pstart).min(p.len().saturating_sub(2));
                return EntrySlice {
                    kfirst: k,
                    klast: k,
                    pstart,
                    pend: pstart,
                };
            }
            EntrySlice {
                kfirst: vector_of(p, pstart),
                klast: vector_of(p, pend - 1),
                pstart,
                pend,
            }
        })
        .collect()
}
