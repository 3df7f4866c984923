//! Batched saxpy3: bound the scratch memory of one pass
//!
//! B's entries are cut into batches of about `max_batch_flops` flops each.
//! A batch may start or end in the middle of a vector of B, so the same
//! column of C can be produced by two neighbouring batches; the column
//! slices are concatenated and those shared columns summed with the monoid.

use crate::error::Result;
use crate::matrix::config::AxbConfig;
use crate::matrix::{Mask, Matrix};
use crate::reconcile::hcat_slices;
use crate::saxpy::saxpy3::saxpy3_pass;
use crate::semiring::kernel::DynAdd;
use crate::semiring::{Catalog, Classification, Semiring};
use crate::slice::{ek_slice_at, pslice, saxpy_flops, vector_offsets, SaxpyWork};

/// Work of each batch, cut from B's entries at about `limit` flops apiece
pub(crate) fn plan_batches<T: Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    limit: usize,
) -> Vec<SaxpyWork> {
    let nnz = b.s.nnz_held();
    let mut cumulative = Vec::with_capacity(nnz + 1);
    cumulative.push(0usize);
    let mut total = 0usize;
    for q in 0..nnz {
        if b.s.is_live(q) {
            total += a.s.range_of(b.s.index(q)).len();
        }
        cumulative.push(total);
    }
    let nbatches = total.div_ceil(limit.max(1)).max(1);
    let bounds = pslice(&cumulative, nbatches);
    let p = vector_offsets(&b.s);

    ek_slice_at(&p, &bounds)
        .into_iter()
        .filter(|slice| !slice.is_empty())
        .map(|slice| {
            let mut work = SaxpyWork::default();
            for k in slice.kfirst..=slice.klast {
                let range = slice.clip(k, &p);
                if !range.is_empty() {
                    work.cols.push(b.s.vector_index(k));
                    work.ranges.push(range);
                }
            }
            work
        })
        .collect()
}

/// Compute `C = A*B` (optionally masked) in batches of at most about
/// `limit` flops.
///
/// The result is hypersparse if B is, sparse otherwise.
#[allow(clippy::too_many_arguments)]
pub fn saxpy_batched<T: Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    nthreads: usize,
    config: &AxbConfig,
    limit: usize,
) -> Result<Matrix<T>> {
    let (m, n) = (a.s.vlen, b.s.vdim);
    let batches = plan_batches(a, b, limit);
    log::debug!("saxpy3: {} batches of at most ~{} flops", batches.len(), limit);

    let mut slices = Vec::with_capacity(batches.len());
    for work in &batches {
        let flops = saxpy_flops(&a.s, &b.s, work);
        let out = saxpy3_pass(
            a, b, work, &flops, mask, semiring, cls, iso, None, nthreads, config,
        )?;
        slices.push(out.into_matrix(m, n, iso));
    }

    let add = DynAdd::new(semiring.add());
    let c = hcat_slices(slices, m, n, &add, iso)?;
    Ok(if b.s.is_hyper() { c } else { c.to_sparse() })
}
