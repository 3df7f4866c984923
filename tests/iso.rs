//! Iso results: the value is stored once and must match the full computation

use axb::iso::{iso_result, IsoRule};
use axb::semiring::classify;
use axb::{
    axb, reference_mxm, AxbConfig, AxbDescriptor, AxbMethod, BinaryOpcode, Matrix, Semiring,
};

fn pattern(n: usize, stride: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|j| (0..n).map(move |i| (i, j)))
        .filter(|&(i, j)| (i * 5 + j * 3) % stride == 0)
        .collect()
}

fn iso_sparse<T: axb::Scalar>(n: usize, stride: usize, v: T) -> Matrix<T> {
    let t: Vec<_> = pattern(n, stride).into_iter().map(|(i, j)| (i, j, v)).collect();
    let m = Matrix::from_triplets(n, n, &t).unwrap();
    let s = m.structure();
    Matrix::iso_sparse(
        n,
        n,
        s.p().unwrap().to_vec(),
        s.i().unwrap().to_vec(),
        v,
    )
    .unwrap()
}

fn run<T: axb::Catalog>(a: &Matrix<T>, b: &Matrix<T>, s: &Semiring<T>, method: AxbMethod) -> Matrix<T> {
    let desc = AxbDescriptor {
        method,
        sort: true,
        ..Default::default()
    };
    axb(None, None, None, s, a, b, &desc, &AxbConfig::fine_grained(3))
        .unwrap()
        .result
        .unwrap()
}

#[test]
fn test_any_pair_gives_iso_one() {
    let a = Matrix::from_triplets(6, 6, &[(0, 1, 4.5), (2, 3, -1.0), (5, 0, 2.0)]).unwrap();
    let b = Matrix::from_triplets(6, 6, &[(1, 2, 7.0), (3, 2, 8.0), (0, 4, 9.0)]).unwrap();
    let s = Semiring::any_pair();
    for method in [AxbMethod::Default, AxbMethod::Dot, AxbMethod::Hash, AxbMethod::Gustavson] {
        let c = run(&a, &b, &s, method);
        assert!(c.is_iso(), "{:?}", method);
        assert_eq!(c.sorted_entries(), vec![(0, 2, 1.0), (2, 2, 1.0), (5, 4, 1.0)]);
    }
}

#[test]
fn test_plus_pair_is_not_iso() {
    // PLUS is not idempotent: counts differ per entry
    let a = Matrix::from_triplets(2, 2, &[(0, 0, 1i32), (0, 1, 1)]).unwrap();
    let b = Matrix::from_triplets(2, 2, &[(0, 0, 1i32), (1, 0, 1), (1, 1, 1)]).unwrap();
    let s = Semiring::plus_pair();
    assert!(iso_result(&a, &b, 2, &s, &classify(&s, false), false).is_none());
    let c = run(&a, &b, &s, AxbMethod::Default);
    assert!(!c.is_iso());
    assert_eq!(c.get(0, 0), Some(2));
    assert_eq!(c.get(0, 1), Some(1));
}

#[test]
fn test_second_of_iso_b() {
    let a = Matrix::from_triplets(8, 8, &[(0, 1, 3u32), (4, 2, 9), (7, 7, 1)]).unwrap();
    let b = iso_sparse(8, 4, 6u32);
    let s = Semiring::<u32>::builtin(BinaryOpcode::Min, BinaryOpcode::Second).unwrap();
    let iso = iso_result(&a, &b, 8, &s, &classify(&s, false), false).unwrap();
    assert_eq!(iso.rule, IsoRule::SecondOfIso);
    assert_eq!(iso.value, 6);

    let expected = reference_mxm(&a, &b, &s, false, |_, _| true);
    for method in [AxbMethod::Dot, AxbMethod::Saxpy, AxbMethod::Hash] {
        let c = run(&a, &b, &s, method);
        assert!(c.is_iso());
        assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{:?}", method);
    }
}

#[test]
fn test_first_of_iso_a_with_flip() {
    let a = iso_sparse(7, 3, 2i64);
    let b = Matrix::from_triplets(7, 7, &[(0, 0, 5i64), (3, 1, 6), (6, 6, 7)]).unwrap();
    let s = Semiring::<i64>::builtin(BinaryOpcode::Max, BinaryOpcode::Second).unwrap();
    // flipped SECOND reads x, the A value
    let cls = classify(&s, true);
    let iso = iso_result(&a, &b, 7, &s, &cls, false).unwrap();
    assert_eq!(iso.value, 2);

    let desc = AxbDescriptor {
        flipxy: true,
        sort: true,
        ..Default::default()
    };
    let out = axb(None, None, None, &s, &a, &b, &desc, &AxbConfig::with_threads(2)).unwrap();
    let c = out.result.unwrap();
    assert!(c.is_iso());
    assert_eq!(c.iso_value(), Some(2));
    let expected = reference_mxm(&a, &b, &s, true, |_, _| true);
    assert_eq!(c.sorted_entries(), expected.sorted_entries());
}

#[test]
fn test_both_iso_with_idempotent_monoid() {
    let a = iso_sparse(9, 2, 3.0f32);
    let b = iso_sparse(9, 5, 4.0f32);
    let s = Semiring::max_times();
    let iso = iso_result(&a, &b, 9, &s, &classify(&s, false), false).unwrap();
    assert_eq!(iso.rule, IsoRule::BothIso);
    assert_eq!(iso.value, 12.0);
    let c = run(&a, &b, &s, AxbMethod::Default);
    let expected = reference_mxm(&a, &b, &s, false, |_, _| true);
    assert_eq!(c.sorted_entries(), expected.sorted_entries());
}

#[test]
fn test_full_reduction_matches_plain_sum() {
    for n in [1usize, 2, 3, 7, 16, 33] {
        let a = Matrix::iso_full(3, n, 2i64);
        let b = Matrix::iso_full(n, 2, 5i64);
        let s = Semiring::plus_times();
        let iso = iso_result(&a, &b, n, &s, &classify(&s, false), false).unwrap();
        assert_eq!(iso.rule, IsoRule::FullReduction);
        assert_eq!(iso.value, 10 * n as i64);
        let log = (usize::BITS - n.leading_zeros()) as usize;
        assert!(iso.monoid_calls <= 2 * log, "n={n}");

        let c = run(&a, &b, &s, AxbMethod::Default);
        assert!(c.is_iso());
        assert_eq!(c.get(2, 1), Some(10 * n as i64));
    }
}

#[test]
fn test_positional_multiplier_is_never_iso() {
    let a = Matrix::iso_full(3, 3, 1i64);
    let s = Semiring::<i64>::builtin(BinaryOpcode::Min, BinaryOpcode::Firsti).unwrap();
    assert!(iso_result(&a, &a, 3, &s, &classify(&s, false), false).is_none());
    let c = run(&a, &a, &s, AxbMethod::Default);
    assert!(!c.is_iso());
    assert_eq!(c.get(2, 0), Some(2));
}

#[test]
fn test_scaling_by_iso_diagonal_stores_one_value() {
    let t: Vec<_> = pattern(6, 4).into_iter().map(|(i, j)| (i, j, (i + j) as i32)).collect();
    let a = Matrix::from_triplets(6, 6, &t).unwrap();
    let d = Matrix::iso_sparse(6, 6, (0..=6).collect(), (0..6).collect(), 3i32).unwrap();
    let out = axb(
        None,
        None,
        None,
        &Semiring::plus_second(),
        &a,
        &d,
        &AxbDescriptor::default(),
        &AxbConfig::with_threads(2),
    )
    .unwrap();
    assert_eq!(out.method, axb::Method::ColScale);
    let c = out.result.unwrap();
    assert!(c.is_iso());
    let expected = reference_mxm(&a, &d, &Semiring::plus_second(), false, |_, _| true);
    assert_eq!(c.sorted_entries(), expected.sorted_entries());
}
