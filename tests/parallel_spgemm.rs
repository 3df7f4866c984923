//! Thread-count independence, in-place engines and batched saxpy

use axb::{
    axb, reference_mxm, AxbConfig, AxbDescriptor, AxbMethod, BinaryOp, Matrix, Method, Semiring,
};

/// Deterministic pseudo-random sparse matrix
fn random_matrix(m: usize, n: usize, density: f64, seed: u64) -> Matrix<i64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };
    let threshold = (density * (1u64 << 31) as f64) as u64;
    let mut t = Vec::new();
    for j in 0..n {
        for i in 0..m {
            if next() < threshold {
                t.push((i, j, (next() % 9) as i64 - 4));
            }
        }
    }
    Matrix::from_triplets(m, n, &t).unwrap()
}

fn multiply(
    a: &Matrix<i64>,
    b: &Matrix<i64>,
    method: AxbMethod,
    config: &AxbConfig,
) -> (Matrix<i64>, Method) {
    let desc = AxbDescriptor {
        method,
        sort: true,
        ..Default::default()
    };
    let out = axb(None, None, None, &Semiring::plus_times(), a, b, &desc, config).unwrap();
    (out.result.unwrap(), out.method)
}

#[test]
fn test_thread_count_does_not_change_result() {
    let a = random_matrix(120, 90, 0.05, 1);
    let b = random_matrix(90, 110, 0.05, 2);
    for method in [
        AxbMethod::Default,
        AxbMethod::Dot,
        AxbMethod::Saxpy,
        AxbMethod::Hash,
        AxbMethod::Gustavson,
    ] {
        let (one, _) = multiply(&a, &b, method, &AxbConfig::with_threads(1));
        for nthreads in [2, 4, 7] {
            let (many, _) = multiply(&a, &b, method, &AxbConfig::fine_grained(nthreads));
            assert_eq!(one.sorted_entries(), many.sorted_entries(), "{:?} {}", method, nthreads);
        }
    }
}

#[test]
fn test_parallel_vs_reference() {
    let a = random_matrix(200, 150, 0.03, 3);
    let b = random_matrix(150, 180, 0.04, 4);
    let expected = reference_mxm(&a, &b, &Semiring::plus_times(), false, |_, _| true);
    for method in [AxbMethod::Hash, AxbMethod::Gustavson, AxbMethod::Dot] {
        let (c, _) = multiply(&a, &b, method, &AxbConfig::fine_grained(8));
        assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{:?}", method);
    }
}

#[test]
fn test_costly_column_is_split_into_fine_tasks() {
    // one column of B touches every column of a dense-ish A
    let a = random_matrix(300, 60, 0.3, 5);
    let mut t: Vec<_> = (0..60).map(|k| (k, 0, 1i64)).collect();
    t.push((3, 1, 2));
    let b = Matrix::from_triplets(60, 2, &t).unwrap();
    let mut config = AxbConfig::fine_grained(6);
    config.heuristics.costly = 1.0;
    config.heuristics.fine_work = 1.0;
    let expected = reference_mxm(&a, &b, &Semiring::plus_times(), false, |_, _| true);
    for method in [AxbMethod::Hash, AxbMethod::Gustavson] {
        let (c, method_used) = multiply(&a, &b, method, &config);
        assert_eq!(method_used, Method::Saxpy3);
        assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{:?}", method);
    }
}

#[test]
fn test_parallel_with_empty_columns() {
    let a = Matrix::from_triplets(50, 50, &[(0, 0, 1i64), (49, 49, 2), (25, 0, 3)]).unwrap();
    let b = Matrix::from_triplets(50, 50, &[(0, 10, 4i64), (49, 49, 5)]).unwrap();
    let (c, _) = multiply(&a, &b, AxbMethod::Hash, &AxbConfig::fine_grained(4));
    assert_eq!(c.sorted_entries(), vec![(0, 10, 4), (25, 10, 12), (49, 49, 10)]);
}

#[test]
fn test_batched_saxpy_matches_single_pass() {
    let a = random_matrix(80, 80, 0.08, 6);
    let b = random_matrix(80, 80, 0.08, 7);
    let (whole, _) = multiply(&a, &b, AxbMethod::Gustavson, &AxbConfig::with_threads(3));
    let mut config = AxbConfig::with_threads(3);
    config.max_batch_flops = Some(50);
    let (batched, _) = multiply(&a, &b, AxbMethod::Gustavson, &config);
    assert_eq!(whole.sorted_entries(), batched.sorted_entries());
}

fn in_place(
    c: &mut Matrix<i64>,
    a: &Matrix<i64>,
    b: &Matrix<i64>,
    desc: &AxbDescriptor,
    nthreads: usize,
) -> Method {
    let out = axb(
        Some(c),
        None,
        Some(&BinaryOp::plus()),
        &Semiring::plus_times(),
        a,
        b,
        desc,
        &AxbConfig::fine_grained(nthreads),
    )
    .unwrap();
    assert!(out.done_in_place);
    assert!(out.result.is_none());
    out.method
}

fn check_accumulated(c: &Matrix<i64>, start: i64, ab: &Matrix<i64>) {
    for j in 0..c.ncols() {
        for i in 0..c.nrows() {
            assert_eq!(c.get(i, j), Some(start + ab.get(i, j).unwrap_or(0)), "({i},{j})");
        }
    }
}

#[test]
fn test_in_place_sparse_times_dense() {
    let a = random_matrix(30, 20, 0.2, 8);
    let b = random_matrix(20, 6, 0.9, 9).to_bitmap();
    let ab = reference_mxm(&a, &b, &Semiring::plus_times(), false, |_, _| true);
    for nthreads in [1, 4, 16] {
        let mut c = Matrix::iso_full(30, 6, 3i64);
        let method = in_place(&mut c, &a, &b, &AxbDescriptor::default(), nthreads);
        assert_eq!(method, Method::Saxpy4);
        check_accumulated(&c, 3, &ab);
    }
}

#[test]
fn test_in_place_dense_times_sparse() {
    let a = random_matrix(25, 15, 0.9, 10).to_bitmap();
    let b = random_matrix(15, 5, 0.3, 11);
    let ab = reference_mxm(&a, &b, &Semiring::plus_times(), false, |_, _| true);
    for nthreads in [1, 5] {
        let mut c = Matrix::iso_full(25, 5, -1i64);
        let method = in_place(&mut c, &a, &b, &AxbDescriptor::default(), nthreads);
        assert_eq!(method, Method::Saxpy5);
        check_accumulated(&c, -1, &ab);
    }
}

#[test]
fn test_in_place_dot_with_transposed_a() {
    let a = random_matrix(18, 12, 0.25, 12);
    let b = random_matrix(18, 7, 0.25, 13);
    let at = a.transpose();
    let ab = reference_mxm(&at, &b, &Semiring::plus_times(), false, |_, _| true);
    let desc = AxbDescriptor {
        a_transpose: true,
        ..Default::default()
    };
    let mut c = Matrix::iso_full(12, 7, 0i64);
    let method = in_place(&mut c, &a, &b, &desc, 3);
    assert_eq!(method, Method::Dot4);
    check_accumulated(&c, 0, &ab);
}

#[test]
fn test_in_place_declined_falls_back_to_dot4() {
    // both operands sparse: neither saxpy4 nor saxpy5 applies
    let a = random_matrix(10, 10, 0.2, 14);
    let b = random_matrix(10, 10, 0.2, 15);
    let ab = reference_mxm(&a, &b, &Semiring::plus_times(), false, |_, _| true);
    let mut c = Matrix::iso_full(10, 10, 7i64);
    let method = in_place(&mut c, &a, &b, &AxbDescriptor::default(), 2);
    assert_eq!(method, Method::Dot4);
    check_accumulated(&c, 7, &ab);
}

#[test]
fn test_min_plus_in_place() {
    let a = Matrix::from_triplets(3, 3, &[(0, 1, 1i64), (1, 2, 1), (0, 2, 9)]).unwrap();
    let mut c = Matrix::full(3, 3, vec![0, 100, 100, 100, 0, 100, 9, 100, 0]).unwrap();
    let s = Semiring::min_plus();
    let out = axb(
        Some(&mut c),
        None,
        Some(&BinaryOp::min()),
        &s,
        &a,
        &a,
        &AxbDescriptor::default(),
        &AxbConfig::with_threads(2),
    )
    .unwrap();
    assert!(out.done_in_place);
    // two-hop path 0 -> 1 -> 2 beats the direct edge
    assert_eq!(c.get(0, 2), Some(2));
    assert_eq!(c.get(0, 1), Some(100));
}
