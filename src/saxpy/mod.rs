//! Outer-product (saxpy) engines
//!
//! `C(:,j) = sum over k of A(:,k) * B(k,j)`. The general engine is
//! [`saxpy3`], which accumulates each column in a per-task scratch table.
//! When A is dense the columns are accumulated straight into a bitmap
//! ([`saxpy_bitmap`]). [`saxpy4`] and [`saxpy5`] update an existing full C
//! in place. Large products can be run as batches of B
//! ([`saxpy_batched`]) to bound scratch memory.

pub mod batched;
pub mod bitmap;
pub mod saxpy3;
pub mod saxpy4;
pub mod saxpy5;

pub use batched::saxpy_batched;
pub use bitmap::saxpy_bitmap;
pub use saxpy3::saxpy3;
pub use saxpy4::saxpy4;
pub use saxpy5::saxpy5;

use crate::accumulator::TableKind;
use crate::error::Result;
use crate::matrix::config::{AxbConfig, Heuristics};
use crate::matrix::{Mask, Matrix};
use crate::method::Method;
use crate::saxpy::saxpy3::saxpy3_pass;
use crate::semiring::{Catalog, Classification, Scalar, Semiring};
use crate::slice::{saxpy_flops, SaxpyWork};

/// Result of the saxpy family
#[derive(Debug)]
pub struct SaxpyOutcome<T: Scalar> {
    pub c: Matrix<T>,
    /// False if the mask was dropped and must be applied by the caller
    pub mask_applied: bool,
    pub method: Method,
}

/// True if a mask with `mask_nvals` entries costs more to honor than the
/// `flops` of the product itself
pub(crate) fn should_discard_mask(mask_nvals: usize, flops: usize, heuristics: &Heuristics) -> bool {
    mask_nvals as f64 > heuristics.mask_discard_ratio * flops as f64 + heuristics.mask_discard_floor
}

/// Compute `C = A*B`, `C<M> = A*B` or `C<!M> = A*B` with the saxpy family.
///
/// Uses bitmap saxpy when A is dense and no table kind is forced;
/// otherwise saxpy3, batched when the flop count exceeds
/// `config.max_batch_flops`. A mask much denser than the flop count is
/// dropped and reported through `mask_applied`. Never declines.
///
/// # Arguments
/// * `a`, `b` - Operands, held by column
/// * `mask` - Mask of the call, if any
/// * `iso` - The iso value of C, if C is known to be iso
/// * `forced` - Table kind for every saxpy3 task, if forced
/// * `nthreads` - Threads available
#[allow(clippy::too_many_arguments)]
pub fn saxpy<T: Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    forced: Option<TableKind>,
    nthreads: usize,
    config: &AxbConfig,
) -> Result<SaxpyOutcome<T>> {
    if forced.is_none() && a.s.is_bitmap_or_full() && !b.s.is_hyper() {
        let c = saxpy_bitmap(a, b, mask, semiring, cls, iso, nthreads)?;
        return Ok(SaxpyOutcome {
            c,
            mask_applied: mask.is_some(),
            method: Method::SaxpyBitmap,
        });
    }

    let work = SaxpyWork::whole(&b.s);
    let flops = saxpy_flops(&a.s, &b.s, &work);
    let total: usize = flops.iter().sum();

    let mask = match mask {
        Some(m) if should_discard_mask(m.nvals(), total, &config.heuristics) => {
            log::debug!(
                "saxpy3: mask with {} entries discarded for {} flops",
                m.nvals(),
                total
            );
            None
        }
        other => other,
    };
    let mask_applied = mask.is_some();

    let c = match config.max_batch_flops {
        Some(limit) if total > limit => {
            saxpy_batched(a, b, mask, semiring, cls, iso, nthreads, config, limit)?
        }
        _ => saxpy3_pass(
            a, b, &work, &flops, mask, semiring, cls, iso, forced, nthreads, config,
        )?
        .into_matrix(a.s.vlen, b.s.vdim, iso),
    };
    Ok(SaxpyOutcome {
        c,
        mask_applied,
        method: Method::Saxpy3,
    })
}
