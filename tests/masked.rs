//! Masked multiply: `C<M> = A*B` and `C<!M> = A*B`

use axb::{
    axb, reference_mxm, AxbConfig, AxbDescriptor, AxbMethod, Mask, Matrix, Method, Semiring,
};

fn banded(n: usize, offsets: &[isize], seed: i64) -> Matrix<i64> {
    let mut t = Vec::new();
    for j in 0..n {
        for &d in offsets {
            let i = j as isize + d;
            if i >= 0 && (i as usize) < n {
                t.push((i as usize, j, (i as i64 * 3 + j as i64 + seed) % 7 + 1));
            }
        }
    }
    Matrix::from_triplets(n, n, &t).unwrap()
}

fn run(
    a: &Matrix<i64>,
    b: &Matrix<i64>,
    mask: &Mask,
    method: AxbMethod,
    nthreads: usize,
) -> (Matrix<i64>, bool, Method) {
    let desc = AxbDescriptor {
        method,
        sort: true,
        ..Default::default()
    };
    let out = axb(
        None,
        Some(mask),
        None,
        &Semiring::plus_times(),
        a,
        b,
        &desc,
        &AxbConfig::fine_grained(nthreads),
    )
    .unwrap();
    (out.result.unwrap(), out.mask_applied, out.method)
}

const METHODS: [AxbMethod; 5] = [
    AxbMethod::Default,
    AxbMethod::Dot,
    AxbMethod::Saxpy,
    AxbMethod::Hash,
    AxbMethod::Gustavson,
];

#[test]
fn test_mask_result_is_subset_of_mask() {
    let a = banded(24, &[-1, 0, 2], 1);
    let b = banded(24, &[-2, 0, 1], 2);
    let m = banded(24, &[-3, -1, 0, 1, 3], 0);
    let mask = Mask::structural(&m);
    let s = Semiring::plus_times();
    let expected = reference_mxm(&a, &b, &s, false, |i, j| m.get(i, j).is_some());

    for method in METHODS {
        for nthreads in [1, 3] {
            let (c, applied, used) = run(&a, &b, &mask, method, nthreads);
            if !applied {
                continue;
            }
            assert!(
                c.entries().iter().all(|&(i, j, _)| m.get(i, j).is_some()),
                "{:?} via {}",
                method,
                used.name()
            );
            assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{:?}", method);
        }
    }
}

#[test]
fn test_complemented_mask_is_disjoint() {
    let a = banded(20, &[-1, 0, 1], 3);
    let b = banded(20, &[0, 2], 4);
    let m = banded(20, &[0, 1], 0);
    let mask = Mask::structural(&m).complement();
    let s = Semiring::plus_times();
    let expected = reference_mxm(&a, &b, &s, false, |i, j| m.get(i, j).is_none());

    for method in METHODS {
        for nthreads in [1, 4] {
            let (c, applied, _) = run(&a, &b, &mask, method, nthreads);
            if !applied {
                continue;
            }
            assert!(c.entries().iter().all(|&(i, j, _)| m.get(i, j).is_none()));
            assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{:?}", method);
        }
    }
}

#[test]
fn test_valued_mask_ignores_zero_entries() {
    let a = banded(12, &[0, 1], 5);
    let b = banded(12, &[-1, 0], 6);
    let mut t = Vec::new();
    for j in 0..12 {
        for i in 0..12 {
            if (i + j) % 3 != 1 {
                t.push((i, j, if i % 2 == 0 { 1.0 } else { 0.0 }));
            }
        }
    }
    let m = Matrix::from_triplets(12, 12, &t).unwrap();
    let s = Semiring::plus_times();
    let selected = |i: usize, j: usize| m.get(i, j).is_some_and(|v| v != 0.0);

    let valued = Mask::new(&m);
    let expected = reference_mxm(&a, &b, &s, false, selected);
    let comp = Mask::new(&m).complement();
    let expected_comp = reference_mxm(&a, &b, &s, false, |i, j| !selected(i, j));
    for method in METHODS {
        let (c, applied, _) = run(&a, &b, &valued, method, 2);
        if applied {
            assert_eq!(c.sorted_entries(), expected.sorted_entries(), "{:?}", method);
        }
        let (c, applied, _) = run(&a, &b, &comp, method, 2);
        if applied {
            assert_eq!(c.sorted_entries(), expected_comp.sorted_entries(), "{:?}", method);
        }
    }
}

#[test]
fn test_sparse_mask_selects_dot3() {
    let a = banded(40, &[-1, 0, 1], 0);
    let m = Matrix::from_triplets(40, 40, &[(3, 3, true), (10, 11, true), (39, 0, true)]).unwrap();
    let mask = Mask::new(&m);
    let (c, applied, method) = run(&a, &a, &mask, AxbMethod::Default, 2);
    assert_eq!(method, Method::Dot3);
    assert!(applied);
    let expected = reference_mxm(&a, &a, &Semiring::plus_times(), false, |i, j| {
        m.get(i, j).is_some()
    });
    assert_eq!(c.sorted_entries(), expected.sorted_entries());
}

#[test]
fn test_unapplied_mask_returns_plain_product() {
    let a = Matrix::from_triplets(40, 40, &[(1, 2, 3i64)]).unwrap();
    let b = Matrix::from_triplets(40, 40, &[(2, 5, 4i64)]).unwrap();
    let m = Matrix::iso_full(40, 40, 1i64).to_bitmap();
    let mask = Mask::new(&m);
    for method in METHODS {
        let (c, applied, _) = run(&a, &b, &mask, method, 2);
        // every position is selected, so the result is A*B either way
        assert_eq!(c.sorted_entries(), vec![(1, 5, 12)], "{:?} applied={}", method, applied);
    }
}

#[test]
fn test_mask_shape_is_checked() {
    let a = banded(4, &[0], 0);
    let m = Matrix::from_triplets(3, 4, &[(0, 0, true)]).unwrap();
    let err = axb(
        None,
        Some(&Mask::new(&m)),
        None,
        &Semiring::plus_times(),
        &a,
        &a,
        &AxbDescriptor::default(),
        &AxbConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, axb::AxbError::DimensionMismatch(_)));
}
