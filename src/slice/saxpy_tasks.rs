//! Task construction for saxpy3
//!
//! Work is split over the vectors of B. Runs of light vectors become coarse
//! tasks that each own a scratch table; a vector whose flop count alone is
//! well above the per-task target becomes a team of fine tasks that share
//! one table. Table kind and size are fixed here, before any numeric work.

use std::ops::Range;

use rayon::prelude::*;

use crate::accumulator::{TableKind, TableSpec};
use crate::matrix::config::Heuristics;
use crate::matrix::pattern::Structure;
use crate::matrix::Mask;
use crate::slice::pslice;
use crate::utils::next_pow2;

/// The vectors of B one saxpy3 pass works on: output column and the range
/// of B's slots that contribute to it
#[derive(Debug, Clone, Default)]
pub struct SaxpyWork {
    pub cols: Vec<usize>,
    pub ranges: Vec<Range<usize>>,
}

impl SaxpyWork {
    /// Every vector B holds
    pub fn whole(b: &Structure) -> Self {
        let nvec = b.nvec();
        Self {
            cols: (0..nvec).map(|k| b.vector_index(k)).collect(),
            ranges: (0..nvec).map(|k| b.vector_range(k)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// True if the work covers columns `0..ncols` in order
    pub fn is_all_columns(&self, ncols: usize) -> bool {
        self.cols.len() == ncols && self.cols.iter().enumerate().all(|(k, &j)| k == j)
    }
}

/// Flops of each work vector: the number of `A(i,k) * B(k,j)` products
pub fn saxpy_flops(a: &Structure, b: &Structure, work: &SaxpyWork) -> Vec<usize> {
    work.ranges
        .par_iter()
        .map(|range| {
            range
                .clone()
                .filter(|&q| b.is_live(q))
                .map(|q| a.range_of(b.index(q)).len())
                .sum()
        })
        .collect()
}

/// One saxpy3 task
#[derive(Debug, Clone, PartialEq)]
pub enum SaxpyTask {
    /// Work vectors `kfirst..klast`, done by one worker
    Coarse {
        kfirst: usize,
        klast: usize,
        flops: usize,
        table: TableSpec,
    },
    /// Work vector `kk`, its B slots split among team members
    Fine {
        kk: usize,
        members: Vec<Range<usize>>,
        flops: usize,
        table: TableSpec,
    },
}

impl SaxpyTask {
    pub fn table(&self) -> TableSpec {
        match self {
            SaxpyTask::Coarse { table, .. } | SaxpyTask::Fine { table, .. } => *table,
        }
    }

    /// Work vectors covered, as a range
    pub fn vectors(&self) -> Range<usize> {
        match self {
            SaxpyTask::Coarse { kfirst, klast, .. } => *kfirst..*klast,
            SaxpyTask::Fine { kk, .. } => *kk..*kk + 1,
        }
    }
}

/// Tasks of one saxpy3 pass
#[derive(Debug, Clone)]
pub struct SaxpyPlan {
    pub tasks: Vec<SaxpyTask>,
    pub total_flops: usize,
}

impl SaxpyPlan {
    pub fn table_specs(&self) -> Vec<TableSpec> {
        self.tasks.iter().map(SaxpyTask::table).collect()
    }

    /// Number of workers, counting each fine team member
    pub fn ntasks(&self) -> usize {
        self.tasks
            .iter()
            .map(|t| match t {
                SaxpyTask::Coarse { .. } => 1,
                SaxpyTask::Fine { members, .. } => members.len(),
            })
            .sum()
    }

    pub fn nfine(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t, SaxpyTask::Fine { .. }))
            .count()
    }
}

/// Table for a task with `f` estimated entries (products plus mask entries)
pub fn table_spec(f: usize, cvlen: usize, forced: Option<TableKind>, fraction: f64) -> TableSpec {
    let hash = TableSpec {
        kind: TableKind::Hash,
        size: next_pow2(2 * f.min(cvlen)),
    };
    let gustavson = TableSpec {
        kind: TableKind::Gustavson,
        size: cvlen,
    };
    match forced {
        Some(TableKind::Hash) => hash,
        Some(TableKind::Gustavson) => gustavson,
        None if hash.size as f64 > fraction * cvlen as f64 => gustavson,
        None => hash,
    }
}

/// Build the saxpy3 tasks.
///
/// # Arguments
/// * `a`, `b` - Operand structures of `C = A*B`
/// * `work` - The vectors of B this pass covers
/// * `flops` - Flops per work vector, from [`saxpy_flops`]
/// * `mask` - Mask whose vectors are scattered into the tables, if any
/// * `forced` - Table kind to use in every task, if forced by the caller
/// * `nthreads` - Threads available
/// * `heuristics` - Task-size and table thresholds
#[allow(clippy::too_many_arguments)]
pub fn plan_saxpy3(
    a: &Structure,
    b: &Structure,
    work: &SaxpyWork,
    flops: &[usize],
    mask: Option<&Mask>,
    forced: Option<TableKind>,
    nthreads: usize,
    heuristics: &Heuristics,
) -> SaxpyPlan {
    let cvlen = a.vlen;
    let nv = work.len();
    let weight: Vec<usize> = (0..nv)
        .map(|v| flops[v] + mask.map_or(0, |m| m.vector_work(work.cols[v])))
        .collect();
    let total_flops: usize = flops.iter().sum();
    let total: usize = weight.iter().sum();
    let spec = |f: usize| table_spec(f, cvlen, forced, heuristics.gustavson_fraction);

    if nthreads <= 1 || nv == 0 {
        let tasks = if nv == 0 {
            Vec::new()
        } else {
            vec![SaxpyTask::Coarse {
                kfirst: 0,
                klast: nv,
                flops: total,
                table: spec(total),
            }]
        };
        return SaxpyPlan { tasks, total_flops };
    }

    let ntasks_target = (heuristics.saxpy_tasks_per_thread * nthreads).max(1);
    let target = (total as f64 / ntasks_target as f64).max(1.0);
    let costly = heuristics.costly * target;
    let fine_target = (target / heuristics.fine_work).max(1.0);

    let mut tasks = Vec::new();
    let mut v = 0;
    while v < nv {
        if weight[v] as f64 > costly {
            if let Some(members) = split_vector(a, b, work.ranges[v].clone(), weight[v], fine_target)
            {
                tasks.push(SaxpyTask::Fine {
                    kk: v,
                    members,
                    flops: weight[v],
                    table: spec(weight[v]),
                });
                v += 1;
                continue;
            }
        }

        // a run of vectors up to the next costly one
        let start = v;
        v += 1;
        while v < nv && weight[v] as f64 <= costly {
            v += 1;
        }
        let mut cumulative = Vec::with_capacity(v - start + 1);
        cumulative.push(0);
        for &w in &weight[start..v] {
            let last = cumulative.last().copied().unwrap_or(0);
            cumulative.push(last + w);
        }
        let run_work = cumulative.last().copied().unwrap_or(0);
        let pieces = ((run_work as f64 / target).ceil() as usize).clamp(1, v - start);
        let bounds = pslice(&cumulative, pieces);
        for w in bounds.windows(2) {
            if w[0] < w[1] {
                let f = cumulative[w[1]] - cumulative[w[0]];
                tasks.push(SaxpyTask::Coarse {
                    kfirst: start + w[0],
                    klast: start + w[1],
                    flops: f,
                    table: spec(f),
                });
            }
        }
    }

    SaxpyPlan { tasks, total_flops }
}

/// Split one costly vector of B into fine slot ranges of about
/// `fine_target` flops each; None if it cannot be split
fn split_vector(
    a: &Structure,
    b: &Structure,
    range: Range<usize>,
    weight: usize,
    fine_target: f64,
) -> Option<Vec<Range<usize>>> {
    if range.len() < 2 {
        return None;
    }
    let mut cumulative = Vec::with_capacity(range.len() + 1);
    cumulative.push(0);
    for q in range.clone() {
        let f = if b.is_live(q) {
            a.range_of(b.index(q)).len()
        } else {
            0
        };
        let last = cumulative.last().copied().unwrap_or(0);
        cumulative.push(last + f);
    }
    let nfine = ((weight as f64 / fine_target).ceil() as usize).clamp(2, range.len());
    let bounds = pslice(&cumulative, nfine);
    let members: Vec<Range<usize>> = bounds
        .windows(2)
        .filter(|w| w[0] < w[1])
        .map(|w| range.start + w[0]..range.start + w[1])
        .collect();
    (members.len() >= 2).then_some(members)
}
