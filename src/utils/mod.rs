//! Utility functions and helpers

pub mod formats;

use crate::error::{AxbError, Result};

/// Replace `counts[0..n]` by its exclusive prefix sum in place, where
/// `counts` has length `n+1`; returns the total
pub fn cumsum_in_place(counts: &mut [usize]) -> usize {
    let mut sum = 0;
    for c in counts.iter_mut() {
        let v = *c;
        *c = sum;
        sum += v;
    }
    counts.last().copied().unwrap_or(0)
}

/// Allocate `n` copies of `fill`, reporting failure instead of aborting
pub fn try_alloc<X: Clone>(n: usize, fill: X) -> Result<Vec<X>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| AxbError::OutOfMemory {
        size: n.saturating_mul(std::mem::size_of::<X>()),
    })?;
    v.resize(n, fill);
    Ok(v)
}

/// Split `data` into consecutive pieces `data[offsets[k]..offsets[k+1]]`.
///
/// `offsets` must be non-decreasing and end at or before `data.len()`.
pub fn split_by_offsets_mut<'a, X>(mut data: &'a mut [X], offsets: &[usize]) -> Vec<&'a mut [X]> {
    let mut pieces = Vec::with_capacity(offsets.len().saturating_sub(1));
    let mut consumed = offsets.first().copied().unwrap_or(0);
    data = &mut std::mem::take(&mut data)[consumed..];
    for w in offsets.windows(2) {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(w[1] - consumed);
        pieces.push(head);
        data = tail;
        consumed = w[1];
    }
    pieces
}

/// Smallest power of two at least `n`, and at least 1
pub fn next_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}
