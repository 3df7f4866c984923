//! Entry point: `C = A*B`, `C<M> = A*B`, `C<!M> = A*B` and `C += A*B`

use std::borrow::Cow;
use std::sync::OnceLock;

use crate::accumulator::TableKind;
use crate::dot::{dot2, dot3, dot4};
use crate::error::{AxbError, Result};
use crate::iso::iso_result;
use crate::matrix::config::{AxbConfig, AxbMethod};
use crate::matrix::pattern::Layout;
use crate::matrix::{Mask, Matrix};
use crate::method::{candidates, in_place_legal, Method, Selection};
use crate::saxpy::{saxpy, saxpy4, saxpy5, saxpy_bitmap};
use crate::scale::{colscale, rowscale};
use crate::semiring::{classify, BinaryOp, Catalog, Classification, Scalar, Semiring};
use crate::slice::nthreads_for_work;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct AxbDescriptor {
    /// Use `A'` in place of A
    pub a_transpose: bool,
    /// Use `B'` in place of B
    pub b_transpose: bool,
    /// Apply the multiplier as `f(b, a)`
    pub flipxy: bool,
    /// Force a family of engines
    pub method: AxbMethod,
    /// Finish the result: no zombies, no jumbled vectors
    pub sort: bool,
}

/// Result of [`axb`]
#[derive(Debug)]
pub struct AxbOutcome<T: Scalar> {
    /// The computed C, or None if the existing C was updated in place
    pub result: Option<Matrix<T>>,
    /// False if the mask was not applied and the caller must apply it
    pub mask_applied: bool,
    /// True if `C += A*B` was done in the caller's C
    pub done_in_place: bool,
    /// Engine that produced C
    pub method: Method,
}

impl<T: Scalar> AxbOutcome<T> {
    fn computed(c: Matrix<T>, mask_applied: bool, method: Method) -> Self {
        Self {
            result: Some(c),
            mask_applied,
            done_in_place: false,
            method,
        }
    }

    fn in_place(method: Method) -> Self {
        Self {
            result: None,
            mask_applied: false,
            done_in_place: true,
            method,
        }
    }
}

/// The left operand, as supplied, with its transpose made on first use
struct Left<'a, T: Scalar> {
    given: Cow<'a, Matrix<T>>,
    given_is_transposed: bool,
    other: OnceLock<Matrix<T>>,
}

impl<T: Catalog> Left<'_, T> {
    /// A as an `m×k` matrix
    fn a(&self) -> &Matrix<T> {
        if self.given_is_transposed {
            self.other.get_or_init(|| self.given.transpose())
        } else {
            &self.given
        }
    }

    /// `A'`, `k×m`: vector `i` is row `i` of A
    fn at(&self) -> &Matrix<T> {
        if self.given_is_transposed {
            &self.given
        } else {
            self.other.get_or_init(|| self.given.transpose())
        }
    }
}

/// The matrix itself if it is finished, else a finished copy
fn finished<T: Catalog>(m: &Matrix<T>) -> Cow<'_, Matrix<T>> {
    if m.is_jumbled() || m.nzombies() > 0 {
        let mut copy = m.clone();
        copy.wait();
        Cow::Owned(copy)
    } else {
        Cow::Borrowed(m)
    }
}

/// Bring an in-place C to a full, non-iso layout
fn prepare_in_place<T: Catalog>(c: &mut Matrix<T>) -> Result<()> {
    if !matches!(c.s.layout, Layout::Full) {
        *c = c.to_full()?;
    }
    c.expand_iso();
    Ok(())
}

fn table_kind(method: AxbMethod) -> Option<TableKind> {
    match method {
        AxbMethod::Hash => Some(TableKind::Hash),
        AxbMethod::Gustavson => Some(TableKind::Gustavson),
        _ => None,
    }
}

/// Compute `C = A*B` over a semiring, optionally masked or accumulated
/// into an existing C.
///
/// # Arguments
/// * `c_in_place` - Existing C for `C += A*B`; updated in place only when
///   legal (C as-if-full, no mask, `accum` equal to the monoid's operator,
///   a builtin semiring whose monoid is not ANY)
/// * `mask` - Mask of the call, complemented or structural as constructed
/// * `accum` - Accumulator operator of the caller, if any
/// * `semiring` - Semiring of the product
/// * `a`, `b` - Operands
/// * `desc` - Transposes, flip, method override, and finishing
/// * `config` - Threads and heuristics
///
/// # Returns
/// The computed C (or nothing, if done in place), whether the mask was
/// applied, and the engine used. When the mask was not applied the
/// caller must apply it; when C was not updated in place the caller
/// must accumulate the returned matrix.
///
/// # Errors
/// [`AxbError::DimensionMismatch`] if the shapes do not agree,
/// [`AxbError::OutOfMemory`] if a workspace cannot be allocated, and
/// [`AxbError::ThreadPool`] if the per-call pool cannot be built.
#[allow(clippy::too_many_arguments)]
pub fn axb<T: Catalog>(
    mut c_in_place: Option<&mut Matrix<T>>,
    mask: Option<&Mask>,
    accum: Option<&BinaryOp<T>>,
    semiring: &Semiring<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    desc: &AxbDescriptor,
    config: &AxbConfig,
) -> Result<AxbOutcome<T>> {
    let (m, ka) = if desc.a_transpose {
        (a.ncols(), a.nrows())
    } else {
        (a.nrows(), a.ncols())
    };
    let (kb, n) = if desc.b_transpose {
        (b.ncols(), b.nrows())
    } else {
        (b.nrows(), b.ncols())
    };
    if ka != kb {
        return Err(AxbError::DimensionMismatch(format!(
            "inner dimensions differ: A is {m}x{ka}, B is {kb}x{n}"
        )));
    }
    if let Some(mk) = mask {
        if (mk.nrows(), mk.ncols()) != (m, n) {
            return Err(AxbError::DimensionMismatch(format!(
                "mask is {}x{}, C is {m}x{n}",
                mk.nrows(),
                mk.ncols()
            )));
        }
    }
    if let Some(c) = c_in_place.as_deref() {
        if c.shape() != (m, n) {
            return Err(AxbError::DimensionMismatch(format!(
                "C is {}x{}, A*B is {m}x{n}",
                c.nrows(),
                c.ncols()
            )));
        }
    }

    // a structural mask holding every position selects everything
    let mask = match mask {
        Some(mk) if mk.is_trivially_full() => {
            if mk.is_complemented() {
                log::debug!("axb: complemented full mask, C is empty");
                return Ok(AxbOutcome::computed(Matrix::empty(m, n), true, Method::Empty));
            }
            None
        }
        other => other,
    };

    let cls = classify(semiring, desc.flipxy);
    let in_place = in_place_legal(c_in_place.as_deref(), mask, accum, semiring, &cls);
    let left = Left {
        given: finished(a),
        given_is_transposed: desc.a_transpose,
        other: OnceLock::new(),
    };
    let b = if desc.b_transpose {
        Cow::Owned(b.transpose())
    } else {
        finished(b)
    };
    let b: &Matrix<T> = &b;

    let iso = if in_place {
        None
    } else {
        iso_result(&left.given, b, ka, semiring, &cls, false).map(|v| {
            log::trace!("axb: C is iso ({:?}), {} monoid calls", v.rule, v.monoid_calls);
            v.value
        })
    };
    if let Some(v) = iso {
        let full = left.given.structure().is_as_if_full() && b.structure().is_as_if_full();
        if full && ka > 0 && mask.is_none() && c_in_place.is_none() {
            log::debug!("axb: {}x{} iso full result", m, n);
            return Ok(AxbOutcome::computed(Matrix::iso_full(m, n, v), false, Method::IsoFull));
        }
    }

    let work = (left.given.nvals() + b.nvals() + n) as f64;
    let nthreads = nthreads_for_work(work, config.chunk(), config.max_threads());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(nthreads)
        .build()?;

    let mut outcome = pool.install(|| {
        if in_place {
            if let Some(c) = c_in_place.as_deref_mut() {
                prepare_in_place(c)?;
            }
        }
        let sel = Selection {
            a: left.given.structure(),
            b: b.structure(),
            mask,
            in_place,
            a_transposed: desc.a_transpose,
            plain: mask.is_none() && c_in_place.is_none(),
            method: desc.method,
        };
        let list = candidates(&sel, &config.heuristics);
        log::trace!(
            "axb: {} candidates {:?}",
            semiring.name(),
            list.iter().map(|m| m.name()).collect::<Vec<_>>()
        );

        for method in list {
            let target = if method.is_in_place() {
                c_in_place.as_deref_mut()
            } else {
                None
            };
            let attempt = run_method(
                method,
                target,
                mask,
                semiring,
                &cls,
                &left,
                b,
                iso,
                nthreads,
                desc,
                config,
            );
            match attempt {
                Err(AxbError::Declined) => {
                    log::trace!("axb: {} declined", method.name());
                }
                other => return other,
            }
        }
        Err(AxbError::Panic("every method declined".to_string()))
    })?;

    if desc.sort {
        if let Some(c) = outcome.result.as_mut() {
            c.wait();
        }
    }
    log::debug!(
        "axb: {} {}x{}x{} via {} on {} threads{}",
        semiring.name(),
        m,
        ka,
        n,
        outcome.method.name(),
        nthreads,
        if outcome.mask_applied || mask.is_none() {
            ""
        } else {
            ", mask left to caller"
        }
    );
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn run_method<T: Catalog>(
    method: Method,
    c: Option<&mut Matrix<T>>,
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    left: &Left<'_, T>,
    b: &Matrix<T>,
    iso: Option<T>,
    nthreads: usize,
    desc: &AxbDescriptor,
    config: &AxbConfig,
) -> Result<AxbOutcome<T>> {
    let h = &config.heuristics;
    let masked = mask.is_some();
    match method {
        Method::ColScale => {
            colscale(left.a(), b, semiring, cls, iso).map(|c| AxbOutcome::computed(c, false, method))
        }
        Method::RowScale => {
            rowscale(left.a(), b, semiring, cls, iso).map(|c| AxbOutcome::computed(c, false, method))
        }
        Method::Dot2 => dot2(left.at(), b, mask, semiring, cls, iso, nthreads, h)
            .map(|c| AxbOutcome::computed(c, masked, method)),
        Method::Dot3 => {
            let mask = mask.ok_or(AxbError::Declined)?;
            dot3(left.at(), b, mask, semiring, cls, iso, nthreads, h)
                .map(|c| AxbOutcome::computed(c, true, method))
        }
        Method::SaxpyBitmap => saxpy_bitmap(left.a(), b, mask, semiring, cls, iso, nthreads)
            .map(|c| AxbOutcome::computed(c, masked, method)),
        Method::Saxpy3 => {
            let out = saxpy(
                left.a(),
                b,
                mask,
                semiring,
                cls,
                iso,
                table_kind(desc.method),
                nthreads,
                config,
            )?;
            Ok(AxbOutcome::computed(out.c, out.mask_applied, out.method))
        }
        Method::Dot4 | Method::Saxpy4 | Method::Saxpy5 => {
            let c = c.ok_or(AxbError::Declined)?;
            match method {
                Method::Dot4 => dot4(c, left.at(), b, semiring, cls, nthreads)?,
                Method::Saxpy4 => saxpy4(c, left.a(), b, semiring, cls, nthreads)?,
                _ => saxpy5(c, left.a(), b, semiring, cls, nthreads)?,
            }
            Ok(AxbOutcome::in_place(method))
        }
        Method::Empty | Method::IsoFull => Err(AxbError::Declined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::reference_mxm;

    #[test]
    fn test_dimension_mismatch() {
        let a = Matrix::<f64>::empty(2, 3);
        let b = Matrix::<f64>::empty(2, 3);
        let err = axb(
            None,
            None,
            None,
            &Semiring::plus_times(),
            &a,
            &b,
            &AxbDescriptor::default(),
            &AxbConfig::with_threads(1),
        )
        .unwrap_err();
        assert!(matches!(err, AxbError::DimensionMismatch(_)));

        let desc = AxbDescriptor {
            a_transpose: true,
            ..Default::default()
        };
        let out = axb(
            None,
            None,
            None,
            &Semiring::plus_times(),
            &a,
            &b,
            &desc,
            &AxbConfig::with_threads(1),
        )
        .unwrap();
        assert_eq!(out.result.map(|c| c.shape()), Some((3, 3)));
    }

    #[test]
    fn test_transposed_operands() {
        let a = Matrix::from_triplets(3, 2, &[(0, 0, 1i64), (2, 1, 4), (1, 0, 2)]).unwrap();
        let b = Matrix::from_triplets(2, 3, &[(0, 2, 3i64), (1, 0, 5)]).unwrap();
        let s = Semiring::plus_times();
        let expected = reference_mxm(&a, &b, &s, false, |_, _| true);
        let desc = AxbDescriptor {
            a_transpose: true,
            b_transpose: true,
            sort: true,
            ..Default::default()
        };
        let out = axb(
            None,
            None,
            None,
            &s,
            &a.transpose(),
            &b.transpose(),
            &desc,
            &AxbConfig::with_threads(2),
        )
        .unwrap();
        let c = out.result.unwrap();
        assert_eq!(c.sorted_entries(), expected.sorted_entries());
    }

    #[test]
    fn test_complemented_full_mask_gives_empty() {
        let a = Matrix::iso_full(2, 2, 1.0);
        let m = Matrix::iso_full(2, 2, true);
        let mask = Mask::structural(&m).complement();
        let out = axb(
            None,
            Some(&mask),
            None,
            &Semiring::plus_times(),
            &a,
            &a,
            &AxbDescriptor::default(),
            &AxbConfig::default(),
        )
        .unwrap();
        assert_eq!(out.method, Method::Empty);
        assert_eq!(out.result.unwrap().nvals(), 0);
    }

    #[test]
    fn test_iso_full_shortcut() {
        let a = Matrix::iso_full(3, 4, 2i32);
        let b = Matrix::iso_full(4, 2, 5i32);
        let out = axb(
            None,
            None,
            None,
            &Semiring::plus_times(),
            &a,
            &b,
            &AxbDescriptor::default(),
            &AxbConfig::default(),
        )
        .unwrap();
        assert_eq!(out.method, Method::IsoFull);
        let c = out.result.unwrap();
        assert!(c.is_iso());
        assert_eq!(c.get(2, 1), Some(40));
    }

    #[test]
    fn test_accum_other_than_monoid_is_not_in_place() {
        let a = Matrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 2.0)]).unwrap();
        let mut c = Matrix::iso_full(2, 2, 1.0);
        let out = axb(
            Some(&mut c),
            None,
            Some(&BinaryOp::times()),
            &Semiring::plus_times(),
            &a,
            &a,
            &AxbDescriptor::default(),
            &AxbConfig::default(),
        )
        .unwrap();
        assert!(!out.done_in_place);
        assert!(out.result.is_some());
        assert_eq!(c.values(), &[1.0]);
    }

    #[test]
    fn test_in_place_c_is_made_full_before_dot4() {
        // every position held, but sparse and iso: dot4 alone would decline
        let mut c = Matrix::iso_sparse(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], 1i64).unwrap();
        let a = Matrix::from_triplets(2, 2, &[(0, 0, 1i64), (1, 1, 2)]).unwrap();
        let out = axb(
            Some(&mut c),
            None,
            Some(&BinaryOp::plus()),
            &Semiring::plus_times(),
            &a,
            &a,
            &AxbDescriptor::default(),
            &AxbConfig::with_threads(2),
        )
        .unwrap();
        assert!(out.done_in_place);
        assert_eq!(out.method, Method::Dot4);
        assert!(!c.is_iso());
        assert_eq!(c.sorted_entries(), vec![(0, 0, 2), (1, 0, 1), (0, 1, 1), (1, 1, 5)]);
    }
}
