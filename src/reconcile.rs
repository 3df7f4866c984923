//! Format reconciliation of engine outputs
//!
//! Two finishing steps bring an engine's output back to the canonical
//! layout: expansion of a compact bitmap computed over the held vectors of
//! hypersparse operands, and concatenation of column slices computed by
//! independent saxpy passes.

use crate::accumulator::{Accumulator, MaskMode, ScratchArena, TableKind, TableSpec, TableView};
use crate::constants::DEFAULT_CACHE_LINE_SIZE;
use crate::error::{AxbError, Result};
use crate::matrix::pattern::{flip_index, Layout, Structure};
use crate::matrix::Matrix;
use crate::semiring::{AddOp, Scalar};

/// Expand a compact bitmap to sparse or hypersparse form with the true
/// dimensions.
///
/// Compact row `r` is row `row_map[r]` of the result and compact column
/// `c` is column `col_map[c]`. Every compact position becomes a slot:
/// occupied positions are live entries and the others are zombies that
/// keep their true row index. With a column map the result is
/// hypersparse, holding only the mapped columns.
///
/// # Arguments
/// * `compact` - Bitmap result over the held vectors of the operands
/// * `row_map` - True row of each compact row, or None for the identity
/// * `col_map` - True column of each compact column, or None for the identity
/// * `vlen`, `vdim` - True dimensions of the result
pub fn expand_compact_bitmap<T: Scalar>(
    compact: Matrix<T>,
    row_map: Option<&[usize]>,
    col_map: Option<&[usize]>,
    vlen: usize,
    vdim: usize,
) -> Result<Matrix<T>> {
    let (cm, cn) = (compact.s.vlen, compact.s.vdim);
    let Layout::Bitmap { b, nvals } = &compact.s.layout else {
        return Err(AxbError::InvalidObject(
            "compact result is not a bitmap".to_string(),
        ));
    };
    if row_map.is_some_and(|r| r.len() != cm) || col_map.is_some_and(|c| c.len() != cn) {
        return Err(AxbError::DimensionMismatch(format!(
            "compact {cm}x{cn} result does not match its vector maps"
        )));
    }

    let row_of = |r: usize| row_map.map_or(r, |m| m[r]);
    let p: Vec<usize> = (0..=cn).map(|k| k * cm).collect();
    let i: Vec<usize> = b
        .iter()
        .enumerate()
        .map(|(q, &present)| {
            let row = row_of(q % cm.max(1));
            if present {
                row
            } else {
                flip_index(row)
            }
        })
        .collect();
    let nzombies = cm * cn - nvals;
    let layout = match col_map {
        Some(h) => Layout::Hypersparse { p, h: h.to_vec(), i },
        None => Layout::Sparse { p, i },
    };
    log::trace!(
        "expand compact {}x{} bitmap to {}x{}, {} zombies",
        cm,
        cn,
        vlen,
        vdim,
        nzombies
    );
    let s = Structure::from_parts_unchecked(vlen, vdim, layout, false, nzombies);
    Ok(Matrix::from_parts_unchecked(s, compact.x, compact.iso))
}

/// Concatenate column slices of C.
///
/// Each slice holds a contiguous run of C's columns, in order. The last
/// column of one slice may also be the first column of the next; such
/// shared columns are summed with `add` through a dense scratch row and
/// come out sorted. All other columns are copied unchanged. The result is
/// hypersparse.
pub fn hcat_slices<T: Scalar, A: AddOp<T>>(
    slices: Vec<Matrix<T>>,
    vlen: usize,
    vdim: usize,
    add: &A,
    iso: Option<T>,
) -> Result<Matrix<T>> {
    // output vectors, each a list of (slice, held vector) parts
    let mut columns: Vec<(usize, Vec<(usize, usize)>)> = Vec::new();
    for (s, slice) in slices.iter().enumerate() {
        if slice.s.vlen != vlen || slice.s.vdim != vdim {
            return Err(AxbError::DimensionMismatch(format!(
                "slice {} is {}x{}, expected {}x{}",
                s, slice.s.vlen, slice.s.vdim, vlen, vdim
            )));
        }
        for k in 0..slice.s.nvec() {
            let j = slice.s.vector_index(k);
            match columns.last_mut() {
                Some((last, parts)) if *last == j => parts.push((s, k)),
                Some((last, _)) if *last > j => {
                    return Err(AxbError::InvalidObject(format!(
                        "slice {s} starts at column {j} before column {last}"
                    )))
                }
                _ => columns.push((j, vec![(s, k)])),
            }
        }
    }

    let shared = columns.iter().filter(|(_, parts)| parts.len() > 1).count();
    let mut arena = ScratchArena::<T>::new(
        &[TableSpec {
            kind: TableKind::Gustavson,
            size: if shared > 0 { vlen } else { 0 },
        }],
        iso.is_none(),
        DEFAULT_CACHE_LINE_SIZE,
    )?;
    let mut tables = arena.tables();
    let Some(TableView::Gustavson(table)) = tables.first_mut() else {
        return Err(AxbError::Panic("scratch row was not carved".to_string()));
    };

    let mut p = Vec::with_capacity(columns.len() + 1);
    let mut h = Vec::with_capacity(columns.len());
    let mut i = Vec::new();
    let mut x = Vec::new();
    let mut jumbled = false;
    p.push(0);

    for (j, parts) in &columns {
        if let [(s, k)] = parts.as_slice() {
            let c = &slices[*s];
            jumbled |= c.s.jumbled;
            for q in c.s.vector_range(*k) {
                if c.s.is_live(q) {
                    i.push(c.s.index(q));
                    if iso.is_none() {
                        x.push(c.value(q));
                    }
                }
            }
        } else {
            table.next_vector();
            for &(s, k) in parts {
                let c = &slices[s];
                for q in c.s.vector_range(k) {
                    if c.s.is_live(q) {
                        table.upsert(c.s.index(q), MaskMode::Unmasked, add, || c.value(q));
                    }
                }
            }
            table.for_each_present(|row, v| {
                i.push(row);
                if iso.is_none() {
                    x.push(v);
                }
            });
        }
        h.push(*j);
        p.push(i.len());
    }

    log::trace!(
        "hcat {} slices into {} columns, {} shared",
        slices.len(),
        h.len(),
        shared
    );
    let s = Structure::from_parts_unchecked(
        vlen,
        vdim,
        Layout::Hypersparse { p, h, i },
        jumbled,
        0,
    );
    Ok(match iso {
        Some(v) => Matrix::from_parts_unchecked(s, vec![v], true),
        None => Matrix::from_parts_unchecked(s, x, false),
    })
}
