//! Method selection for `C = A*B`
//!
//! The selector turns the shape of a call (operand layouts, mask, in-place
//! eligibility, user override) into an ordered list of candidate engines.
//! The entry point runs them in order; an engine that cannot serve the
//! input declines and the next one runs. An out-of-place list always ends
//! with saxpy3, which never declines. An in-place list ends with dot4,
//! which only declines for a C that is not full or is iso; the entry point
//! brings C to a full, non-iso layout before the list runs.

use crate::matrix::config::{AxbMethod, Heuristics};
use crate::matrix::is_diagonal;
use crate::matrix::pattern::{unflip_index, Layout, Structure};
use crate::matrix::{Mask, Matrix};
use crate::semiring::{BinaryOp, BinaryOpcode, Classification, Scalar, Semiring};

/// Engine that computed C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `C<!M>` with M full: nothing may be written
    Empty,
    /// Both operands full and iso: C is iso-full without any engine
    IsoFull,
    /// `C = A*D`
    ColScale,
    /// `C = D*B`
    RowScale,
    Dot2,
    Dot3,
    /// `C += A'*B` in place
    Dot4,
    Saxpy3,
    SaxpyBitmap,
    /// `C += A*B` in place, A sparse, B dense
    Saxpy4,
    /// `C += A*B` in place, A dense, B sparse
    Saxpy5,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Empty => "empty",
            Method::IsoFull => "iso full",
            Method::ColScale => "colscale",
            Method::RowScale => "rowscale",
            Method::Dot2 => "dot2",
            Method::Dot3 => "dot3",
            Method::Dot4 => "dot4",
            Method::Saxpy3 => "saxpy3",
            Method::SaxpyBitmap => "saxpy bitmap",
            Method::Saxpy4 => "saxpy4",
            Method::Saxpy5 => "saxpy5",
        }
    }

    /// True for engines that update an existing C
    pub fn is_in_place(self) -> bool {
        matches!(self, Method::Dot4 | Method::Saxpy4 | Method::Saxpy5)
    }
}

/// Number of rows of `s` holding at least one live entry
pub(crate) fn nonempty_rows(s: &Structure) -> usize {
    match &s.layout {
        Layout::Full => {
            if s.vdim == 0 {
                0
            } else {
                s.vlen
            }
        }
        _ => {
            let mut seen = vec![false; s.vlen];
            let mut count = 0;
            for q in 0..s.nnz_held() {
                if s.is_live(q) {
                    let i = unflip_index(s.index(q));
                    if !seen[i] {
                        seen[i] = true;
                        count += 1;
                    }
                }
            }
            count
        }
    }
}

/// Dot-vs-saxpy cost model for `C = A*B`, with A `m×k` and B `k×n` as
/// used by saxpy.
///
/// Dot computes every entry of a dense `nonempty_rows(A) × nvec_nonempty(B)`
/// result; saxpy touches only the flops.
pub fn prefers_dot(a: &Structure, b: &Structure, heuristics: &Heuristics) -> bool {
    if a.is_bitmap_or_full() || b.is_bitmap_or_full() {
        return true;
    }
    let anz = a.nvals();
    let bnz = b.nvals();
    let inputs = anz as f64 + bnz as f64;
    let cnz = nonempty_rows(a) as f64 * b.nvec_nonempty() as f64;
    if cnz > inputs {
        return false;
    }
    if cnz <= heuristics.dot_cnz_tiny as f64 || cnz * heuristics.dot_flop_ratio < inputs {
        return true;
    }
    let row_degree = anz as f64 / a.vlen.max(1) as f64;
    let col_degree = anz as f64 / a.vdim.max(1) as f64;
    row_degree < heuristics.dot_row_degree && col_degree > heuristics.dot_col_degree
}

/// True if `C += A*B` may be computed in place by dot4, saxpy4 or saxpy5
pub fn in_place_legal<T: Scalar>(
    c: Option<&Matrix<T>>,
    mask: Option<&Mask>,
    accum: Option<&BinaryOp<T>>,
    semiring: &Semiring<T>,
    cls: &Classification,
) -> bool {
    let Some(c) = c else {
        return false;
    };
    c.structure().is_as_if_full()
        && mask.is_none()
        && accum.is_some_and(|op| op.same_op(semiring.add().op()))
        && cls.is_builtin()
        && cls.add != BinaryOpcode::Any
        && T::atomic_safe(cls.add)
}

/// Everything the selector looks at
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// A as supplied: `A'` when `a_transposed` is set. Transposing keeps
    /// the layout kind, so only the cost model sees the other orientation.
    pub a: &'a Structure,
    /// B as a `k×n` operand
    pub b: &'a Structure,
    pub mask: Option<&'a Mask<'a>>,
    pub in_place: bool,
    /// A was supplied transposed, so `A'` is available without work
    pub a_transposed: bool,
    /// No mask and not in place
    pub plain: bool,
    pub method: AxbMethod,
}

fn sparse_mask(mask: Option<&Mask>) -> bool {
    mask.is_some_and(|m| !m.is_complemented() && m.structure().is_sparse_or_hyper())
}

/// Ordered candidate engines for a call
pub fn candidates(sel: &Selection, heuristics: &Heuristics) -> Vec<Method> {
    let mut out = Vec::new();
    if sel.in_place && sel.method != AxbMethod::Hash && sel.method != AxbMethod::Gustavson {
        let dot_first = sel.a_transposed || sel.method == AxbMethod::Dot;
        if dot_first {
            out.push(Method::Dot4);
        }
        if sel.method != AxbMethod::Dot {
            if sel.a.is_bitmap_or_full() && sel.b.is_sparse_or_hyper() {
                out.push(Method::Saxpy5);
            } else if sel.a.is_sparse_or_hyper() && sel.b.is_bitmap_or_full() {
                out.push(Method::Saxpy4);
            }
        }
        if !dot_first {
            out.push(Method::Dot4);
        }
        return out;
    }

    match sel.method {
        AxbMethod::Default => {
            if sel.plain && is_diagonal(sel.b) {
                out.push(Method::ColScale);
            } else if sel.plain && is_diagonal(sel.a) {
                out.push(Method::RowScale);
            }
            if sparse_mask(sel.mask) {
                out.push(Method::Dot3);
            }
            if prefers_dot(sel.a, sel.b, heuristics) {
                out.push(Method::Dot2);
            }
            out.push(Method::SaxpyBitmap);
        }
        AxbMethod::Dot => {
            if sparse_mask(sel.mask) {
                out.push(Method::Dot3);
            }
            out.push(Method::Dot2);
        }
        AxbMethod::Saxpy => out.push(Method::SaxpyBitmap),
        AxbMethod::Hash | AxbMethod::Gustavson => {}
    }
    out.push(Method::Saxpy3);
    out
}
