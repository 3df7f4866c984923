//! Sorting of row indices within output vectors
//!
//! Hash and coarse Gustavson tasks may leave vectors jumbled. They are
//! sorted here, either on demand or when a matrix is finalized with
//! [`Matrix::wait`].

use rayon::prelude::*;

use crate::constants::PAR_SORT_CUTOFF;
use crate::matrix::pattern::Layout;
use crate::matrix::Matrix;
use crate::semiring::Scalar;
use crate::utils::split_by_offsets_mut;

/// Sort `keys` ascending and permute `vals` the same way.
///
/// `vals` is either empty (pattern only) or as long as `keys`. Large inputs
/// are split in two, sorted with `rayon::join`, and merged.
///
/// # Arguments
///
/// * `keys` - Row indices, distinct within one vector
/// * `vals` - Values that travel with the keys
pub fn sort_pairs<T: Scalar>(keys: &mut [usize], vals: &mut [T]) {
    if vals.is_empty() {
        if keys.len() >= PAR_SORT_CUTOFF {
            keys.par_sort_unstable();
        } else {
            keys.sort_unstable();
        }
        return;
    }
    debug_assert_eq!(keys.len(), vals.len());
    let mut pairs: Vec<(usize, T)> = keys.iter().copied().zip(vals.iter().copied()).collect();
    merge_sort(&mut pairs);
    for (q, (k, v)) in pairs.into_iter().enumerate() {
        keys[q] = k;
        vals[q] = v;
    }
}

fn merge_sort<T: Scalar>(pairs: &mut [(usize, T)]) {
    if pairs.len() < PAR_SORT_CUTOFF {
        pairs.sort_unstable_by_key(|&(k, _)| k);
        return;
    }
    let mid = pairs.len() / 2;
    {
        let (left, right) = pairs.split_at_mut(mid);
        rayon::join(|| merge_sort(left), || merge_sort(right));
    }
    let mut merged = Vec::with_capacity(pairs.len());
    parallel_merge(&pairs[..mid], &pairs[mid..], &mut merged);
    pairs.copy_from_slice(&merged);
}

/// Merge two sorted runs, splitting the larger one at its midpoint and the
/// other at the matching position
fn parallel_merge<T: Scalar>(a: &[(usize, T)], b: &[(usize, T)], out: &mut Vec<(usize, T)>) {
    if a.len() + b.len() < PAR_SORT_CUTOFF {
        let (mut x, mut y) = (0, 0);
        while x < a.len() && y < b.len() {
            if a[x].0 <= b[y].0 {
                out.push(a[x]);
                x += 1;
            } else {
                out.push(b[y]);
                y += 1;
            }
        }
        out.extend_from_slice(&a[x..]);
        out.extend_from_slice(&b[y..]);
        return;
    }
    let (big, small) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mid = big.len() / 2;
    let pivot = big[mid].0;
    let cut = small.partition_point(|&(k, _)| k < pivot);
    let (mut lo, mut hi) = (
        Vec::with_capacity(mid + cut),
        Vec::with_capacity(big.len() - mid + small.len() - cut),
    );
    rayon::join(
        || parallel_merge(&big[..mid], &small[..cut], &mut lo),
        || parallel_merge(&big[mid..], &small[cut..], &mut hi),
    );
    out.extend(lo);
    out.extend(hi);
}

/// Sort the rows of every vector of a sparse or hypersparse matrix.
///
/// Vectors are independent, so they are sorted in parallel. Clears the
/// jumbled flag.
pub fn sort_vectors<T: Scalar>(m: &mut Matrix<T>) {
    let iso = m.iso;
    let (p, i) = match &mut m.s.layout {
        Layout::Sparse { p, i } | Layout::Hypersparse { p, i, .. } => (&*p, i),
        _ => {
            m.s.jumbled = false;
            return;
        }
    };
    let rows = split_by_offsets_mut(i, p);
    if iso {
        rows.into_par_iter().for_each(|r| r.sort_unstable());
    } else {
        let vals = split_by_offsets_mut(&mut m.x, p);
        rows.into_par_iter()
            .zip(vals.into_par_iter())
            .for_each(|(r, v)| sort_pairs(r, v));
    }
    m.s.jumbled = false;
}
