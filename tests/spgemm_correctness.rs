//! Tests for AxB correctness against the reference multiply

use axb::iso::{iso_result, IsoRule};
use axb::semiring::classify;
use axb::{
    axb, reference_mxm, AxbConfig, AxbDescriptor, AxbMethod, Mask, Matrix, Method, Semiring,
    Sparsity,
};

fn multiply<T: axb::Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    semiring: &Semiring<T>,
    method: AxbMethod,
) -> (Matrix<T>, Method) {
    let desc = AxbDescriptor {
        method,
        sort: true,
        ..Default::default()
    };
    let out = axb(None, None, None, semiring, a, b, &desc, &AxbConfig::with_threads(4)).unwrap();
    assert!(!out.done_in_place);
    (out.result.unwrap(), out.method)
}

/// Create a tridiagonal matrix
fn tridiagonal(n: usize) -> Matrix<f64> {
    let mut t = Vec::new();
    for i in 0..n {
        if i > 0 {
            t.push((i, i - 1, 1.0));
        }
        t.push((i, i, 2.0));
        if i + 1 < n {
            t.push((i, i + 1, 1.0));
        }
    }
    Matrix::from_triplets(n, n, &t).unwrap()
}

#[test]
fn test_diagonal_scales_rows_of_full_b() {
    let a = Matrix::diagonal(&[2.0, 3.0, 4.0]);
    let b = Matrix::iso_full(3, 2, 1.0);
    let expected = [2.0, 3.0, 4.0];

    let (c, method) = multiply(&a, &b, &Semiring::plus_times(), AxbMethod::Default);
    assert_eq!(method, Method::RowScale);
    for method in [AxbMethod::Default, AxbMethod::Dot, AxbMethod::Saxpy, AxbMethod::Hash] {
        let (c2, _) = multiply(&a, &b, &Semiring::plus_times(), method);
        assert_eq!(c2.sorted_entries(), c.sorted_entries());
    }
    for i in 0..3 {
        for j in 0..2 {
            assert_eq!(c.get(i, j), Some(expected[i]));
        }
    }
}

#[test]
fn test_forced_dot_and_saxpy_agree_exactly() {
    let a = Matrix::from_triplets(
        4,
        4,
        &[(0, 0, 1i64), (0, 2, 2), (1, 1, 3), (2, 0, 4), (3, 1, 5), (3, 3, 6)],
    )
    .unwrap();
    let b = Matrix::from_triplets(4, 4, &[(0, 0, 7i64), (1, 2, 8), (2, 0, 9), (2, 3, 10), (3, 1, 11)])
        .unwrap();
    let s = Semiring::plus_times();
    let (dot, dot_method) = multiply(&a, &b, &s, AxbMethod::Dot);
    let (saxpy, saxpy_method) = multiply(&a, &b, &s, AxbMethod::Saxpy);
    assert!(matches!(dot_method, Method::Dot2 | Method::Dot3));
    assert_eq!(saxpy_method, Method::Saxpy3);
    assert_eq!(dot.sorted_entries(), saxpy.sorted_entries());

    let expected = reference_mxm(&a, &b, &s, false, |_, _| true);
    assert_eq!(dot.sorted_entries(), expected.sorted_entries());
    // C(0,0) = 1*7 + 2*9
    assert_eq!(dot.get(0, 0), Some(25));
}

#[test]
fn test_full_iso_operands_give_iso_full_c() {
    let a = Matrix::iso_full(4, 4, 2.0f64);
    let b = Matrix::iso_full(4, 4, 3.0f64);
    let s = Semiring::plus_times();

    let (c, method) = multiply(&a, &b, &s, AxbMethod::Default);
    assert_eq!(method, Method::IsoFull);
    assert_eq!(c.sparsity(), Sparsity::Full);
    assert!(c.is_iso());
    assert_eq!(c.iso_value(), Some(24.0));
    assert_eq!(c.values().len(), 1);

    let iso = iso_result(&a, &b, 4, &s, &classify(&s, false), false).unwrap();
    assert_eq!(iso.rule, IsoRule::FullReduction);
    assert_eq!(iso.value, 24.0);
    // log2(4) doublings
    assert!(iso.monoid_calls <= 2);
}

#[test]
fn test_hypersparse_b_keeps_its_dimensions() {
    let a = Matrix::from_triplets(5, 4, &[(0, 0, 1i32), (1, 2, 2), (4, 1, 3), (2, 3, 4)]).unwrap();
    let b = Matrix::hypersparse(4, 10, vec![0, 2, 3], vec![0, 3], vec![0, 2, 1], vec![5, 6, 7])
        .unwrap();
    let s = Semiring::plus_times();
    let expected = reference_mxm(&a, &b, &s, false, |_, _| true);
    for method in [AxbMethod::Dot, AxbMethod::Saxpy, AxbMethod::Gustavson] {
        let (c, _) = multiply(&a, &b, &s, method);
        assert_eq!(c.shape(), (5, 10));
        assert_eq!(c.sparsity(), Sparsity::Hypersparse, "{:?}", method);
        assert!(c.structure().nvec() <= 2);
        assert_eq!(c.sorted_entries(), expected.sorted_entries());
        for j in [1, 2, 4, 5, 6, 7, 8, 9] {
            assert!((0..5).all(|i| c.get(i, j).is_none()));
        }
    }
}

#[test]
fn test_dense_valued_mask_is_left_to_caller() {
    let a = Matrix::from_triplets(30, 30, &[(0, 0, 1i64), (5, 1, 2)]).unwrap();
    let b = Matrix::from_triplets(30, 30, &[(0, 3, 4i64), (1, 3, 5), (1, 7, 6)]).unwrap();
    let mut t = Vec::new();
    for j in 0..30 {
        for i in 0..30 {
            // valued mask: zeros keep the slot but select nothing
            t.push((i, j, if (i + j) % 7 == 0 { 0u8 } else { 1 }));
        }
    }
    let m = Matrix::from_triplets(30, 30, &t).unwrap();
    let mask = Mask::new(&m);
    let s = Semiring::plus_times();
    let desc = AxbDescriptor {
        method: AxbMethod::Saxpy,
        sort: true,
        ..Default::default()
    };
    let out = axb(None, Some(&mask), None, &s, &a, &b, &desc, &AxbConfig::with_threads(2)).unwrap();
    assert!(!out.mask_applied);
    let c = out.result.unwrap();

    let unmasked = reference_mxm(&a, &b, &s, false, |_, _| true);
    assert_eq!(c.sorted_entries(), unmasked.sorted_entries());

    let selected = |i: usize, j: usize| m.get(i, j).is_some_and(|v| v != 0);
    let caller_masked: Vec<_> = c
        .sorted_entries()
        .into_iter()
        .filter(|&(i, j, _)| selected(i, j))
        .collect();
    let expected = reference_mxm(&a, &b, &s, false, selected);
    assert_eq!(caller_masked, expected.sorted_entries());
}

#[test]
fn test_identity_multiplication() {
    let ident = Matrix::diagonal(&[1.0; 10]);
    let t = tridiagonal(10);
    let (c, _) = multiply(&ident, &t, &Semiring::plus_times(), AxbMethod::Default);
    assert_eq!(c.sorted_entries(), t.sorted_entries());
    let (c, _) = multiply(&t, &ident, &Semiring::plus_times(), AxbMethod::Default);
    assert_eq!(c.sorted_entries(), t.sorted_entries());
}

#[test]
fn test_tridiagonal_square() {
    let t = tridiagonal(50);
    let s = Semiring::plus_times();
    let expected = reference_mxm(&t, &t, &s, false, |_, _| true);
    for method in [
        AxbMethod::Default,
        AxbMethod::Dot,
        AxbMethod::Saxpy,
        AxbMethod::Hash,
        AxbMethod::Gustavson,
    ] {
        let (c, _) = multiply(&t, &t, &s, method);
        assert_eq!(c.nvals(), expected.nvals(), "{:?}", method);
        for (i, j, v) in expected.sorted_entries() {
            let got = c.get(i, j).unwrap();
            assert!((got - v).abs() < 1e-12, "({i},{j}) {got} != {v}");
        }
    }
    // interior rows of T^2 are [1 4 6 4 1]
    assert_eq!(expected.get(10, 10), Some(6.0));
    assert_eq!(expected.get(10, 12), Some(1.0));
}

#[test]
fn test_tropical_semirings() {
    let a = Matrix::from_triplets(3, 3, &[(0, 1, 1.0), (1, 2, 2.0), (0, 2, 5.0), (2, 0, 1.0)]).unwrap();
    for s in [Semiring::min_plus(), Semiring::max_plus(), Semiring::max_times()] {
        let expected = reference_mxm(&a, &a, &s, false, |_, _| true);
        for method in [AxbMethod::Dot, AxbMethod::Hash, AxbMethod::Gustavson] {
            let (c, _) = multiply(&a, &a, &s, method);
            assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{}", s.name());
        }
    }
    // shortest two-hop path 0 -> 1 -> 2
    let (c, _) = multiply(&a, &a, &Semiring::min_plus(), AxbMethod::Default);
    assert_eq!(c.get(0, 2), Some(3.0));
}

#[test]
fn test_boolean_semiring() {
    let a = Matrix::from_triplets(3, 3, &[(0, 1, true), (1, 2, true), (2, 2, true)]).unwrap();
    let s = Semiring::<bool>::builtin(axb::BinaryOpcode::Lor, axb::BinaryOpcode::Land).unwrap();
    let expected = reference_mxm(&a, &a, &s, false, |_, _| true);
    for method in [AxbMethod::Default, AxbMethod::Dot, AxbMethod::Hash] {
        let (c, _) = multiply(&a, &a, &s, method);
        assert_eq!(c.sorted_entries(), expected.sorted_entries());
    }
    assert_eq!(expected.sorted_entries(), vec![(0, 2, true), (1, 2, true), (2, 2, true)]);
}

#[test]
fn test_flipxy_with_non_commutative_op() {
    let a = Matrix::from_triplets(2, 2, &[(0, 0, 10i32), (1, 0, 20)]).unwrap();
    let b = Matrix::from_triplets(2, 2, &[(0, 1, 3i32)]).unwrap();
    let s = Semiring::new(axb::Monoid::plus(), axb::BinaryOp::minus());
    let desc = AxbDescriptor {
        flipxy: true,
        sort: true,
        ..Default::default()
    };
    let out = axb(None, None, None, &s, &a, &b, &desc, &AxbConfig::with_threads(1)).unwrap();
    let c = out.result.unwrap();
    // f(b, a) = b - a
    assert_eq!(c.sorted_entries(), vec![(0, 1, -7), (1, 1, -17)]);
}

#[test]
fn test_empty_operands() {
    let a = Matrix::<f64>::empty(4, 3);
    let b = Matrix::<f64>::empty(3, 5);
    for method in [AxbMethod::Default, AxbMethod::Dot, AxbMethod::Hash] {
        let (c, _) = multiply(&a, &b, &Semiring::plus_times(), method);
        assert_eq!(c.shape(), (4, 5));
        assert_eq!(c.nvals(), 0);
    }
    let z = Matrix::<f64>::empty(4, 0);
    let (c, _) = multiply(&z, &Matrix::empty(0, 2), &Semiring::plus_times(), AxbMethod::Default);
    assert_eq!(c.shape(), (4, 2));
    assert_eq!(c.nvals(), 0);
}

#[test]
fn test_outcome_is_printable() {
    let a = Matrix::from_triplets(2, 2, &[(0, 0, 1i32), (1, 0, 2)]).unwrap();
    let desc = AxbDescriptor {
        a_transpose: true,
        ..Default::default()
    };
    let out = axb(None, None, None, &Semiring::plus_times(), &a, &a, &desc, &AxbConfig::with_threads(1))
        .unwrap();
    let shown = format!("{:?}", out);
    assert!(shown.contains("mask_applied"));
    assert!(shown.contains(&format!("{:?}", out.method)));
    // A'*A = [5]
    assert_eq!(out.result.unwrap().sorted_entries(), vec![(0, 0, 5)]);
}
