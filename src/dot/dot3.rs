//! dot3: `C<M> = A'*B` for a sparse or hypersparse mask
//!
//! C takes the pattern of M. Each entry of M needs one inner product;
//! entries where M is false, or where the inner product is empty, become
//! zombies. The work is bounded by the number of entries in M.

use rayon::prelude::*;

use crate::dot::{dot_vectors, DotAcc};
use crate::error::{AxbError, Result};
use crate::matrix::config::Heuristics;
use crate::matrix::pattern::{flip_index, unflip_index, Layout, Structure};
use crate::matrix::{Mask, Matrix};
use crate::semiring::{dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Semiring};
use crate::slice::{plan_mask_tasks, MaskTask};
use crate::utils::{split_by_offsets_mut, try_alloc};

struct Chunk<'c, T> {
    task: MaskTask,
    i: &'c mut [usize],
    x: Option<&'c mut [T]>,
}

struct Dot3Kernel<'a, 'c, T> {
    at: &'a Matrix<T>,
    b: &'a Matrix<T>,
    mask: &'a Mask<'a>,
    chunks: Vec<Chunk<'c, T>>,
    pattern_only: bool,
}

impl<T: Catalog> KernelVisitor<T> for Dot3Kernel<'_, '_, T> {
    type Output = usize;

    /// Fills each chunk and returns the number of zombies
    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) -> usize {
        let Self {
            at,
            b,
            mask,
            chunks,
            pattern_only,
        } = self;
        let ms = mask.structure();
        chunks
            .into_par_iter()
            .map(|mut chunk| {
                let task = chunk.task;
                let mut zombies = 0;
                for k in task.kfirst..=task.klast {
                    let j = ms.vector_index(k);
                    let kb = b.s.find_vector(j);
                    let range = ms.vector_range(k);
                    for q in range.start.max(task.pstart)..range.end.min(task.pend) {
                        let off = q - task.pstart;
                        let i = unflip_index(ms.index(q));
                        let cij = match (mask.test_slot(q), kb, at.s.find_vector(i)) {
                            (true, Some(kb), Some(ka)) => {
                                let mut acc = DotAcc::new(&add, &mult, None, pattern_only);
                                dot_vectors(&mut acc, at, ka, b, kb, i, j);
                                acc.result()
                            }
                            _ => None,
                        };
                        match cij {
                            Some(v) => {
                                chunk.i[off] = i;
                                if let Some(x) = chunk.x.as_deref_mut() {
                                    x[off] = v;
                                }
                            }
                            None => {
                                chunk.i[off] = flip_index(i);
                                zombies += 1;
                            }
                        }
                    }
                }
                zombies
            })
            .sum()
    }
}

/// Compute `C<M> = A'*B` over the pattern of M.
///
/// # Arguments
/// * `at` - `A'`, held by column: vector `i` is row `i` of A
/// * `b` - B, with the same vector length as `at`
/// * `mask` - A non-complemented sparse or hypersparse mask
/// * `iso` - The iso value of C, if C is known to be iso
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::Declined`] if the mask is complemented or not sparse.
#[allow(clippy::too_many_arguments)]
pub fn dot3<T: Catalog>(
    at: &Matrix<T>,
    b: &Matrix<T>,
    mask: &Mask,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    nthreads: usize,
    heuristics: &Heuristics,
) -> Result<Matrix<T>> {
    let ms = mask.structure();
    if mask.is_complemented() || !ms.is_sparse_or_hyper() {
        return Err(AxbError::Declined);
    }
    let nnz = ms.nnz_held();
    let ntasks = if nthreads <= 1 {
        1
    } else {
        heuristics.dot_tasks_per_thread * nthreads
    };
    let tasks = plan_mask_tasks(ms, &at.s, &b.s, ntasks);
    log::trace!("dot3: {} mask entries, {} tasks", nnz, tasks.len());

    let mut ci = try_alloc(nnz, 0usize)?;
    let mut cx = if iso.is_some() {
        Vec::new()
    } else {
        try_alloc(nnz, T::default())?
    };

    let nzombies = if tasks.is_empty() {
        0
    } else {
        let mut bounds: Vec<usize> = tasks.iter().map(|t| t.pstart).collect();
        bounds.push(nnz);
        let iparts = split_by_offsets_mut(&mut ci, &bounds);
        let xparts: Vec<Option<&mut [T]>> = if iso.is_none() {
            split_by_offsets_mut(&mut cx, &bounds)
                .into_iter()
                .map(Some)
                .collect()
        } else {
            Vec::new()
        };
        let mut xparts = xparts.into_iter();
        let chunks: Vec<Chunk<'_, T>> = tasks
            .iter()
            .zip(iparts)
            .map(|(&task, i)| Chunk {
                task,
                i,
                x: xparts.next().flatten(),
            })
            .collect();
        let kernel = Dot3Kernel {
            at,
            b,
            mask,
            chunks,
            pattern_only: iso.is_some(),
        };
        dispatch(semiring, cls, kernel)
    };

    let layout = match &ms.layout {
        Layout::Hypersparse { p, h, .. } => Layout::Hypersparse {
            p: p.clone(),
            h: h.clone(),
            i: ci,
        },
        Layout::Sparse { p, .. } => Layout::Sparse { p: p.clone(), i: ci },
        _ => return Err(AxbError::Declined),
    };
    let s = Structure::from_parts_unchecked(ms.vlen, ms.vdim, layout, ms.jumbled, nzombies);
    Ok(match iso {
        Some(v) => Matrix::from_parts_unchecked(s, vec![v], true),
        None => Matrix::from_parts_unchecked(s, cx, false),
    })
}
