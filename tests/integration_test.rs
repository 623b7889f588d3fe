//! End-to-end tests for the lsqr solve on the host backend.

use approx::assert_abs_diff_eq;
use half::f16;
use qrsolve::parser;
use qrsolve::solver::{Reorder, SolveOptions};
use qrsolve::{CsrMatrix, DenseArray, Precision, QrSolveError, SolverContext};

fn reference_matrix() -> CsrMatrix<f64> {
    CsrMatrix::try_new(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![4.0, 1.0, 1.0, 3.0])
        .expect("valid CSR")
}

/// Helper: check A*x ≈ b with the solution the context returned.
fn assert_solves<T: qrsolve::Element>(a: &CsrMatrix<T>, b: &[f64], x: &[f64], eps: f64) {
    let ax = a.spmv_f64(x).expect("spmv");
    for i in 0..b.len() {
        assert_abs_diff_eq!(ax[i], b[i], epsilon = eps);
    }
}

// ── Reference scenarios ───────────────────────────────────────────

#[test]
fn test_reference_2x2_csr() {
    let mut ctx = SolverContext::host();
    let a = reference_matrix();
    let b = DenseArray::from_vec(vec![1.0, 2.0]);

    let result = ctx.lsqr(&a, &b).expect("solve failed");

    assert_abs_diff_eq!(result.x[0], 0.0909, epsilon = 1e-4);
    assert_abs_diff_eq!(result.x[1], 0.6364, epsilon = 1e-4);
    assert_abs_diff_eq!(result.r1norm, 0.0, epsilon = 1e-12);
    let expected_xnorm = (result.x[0] * result.x[0] + result.x[1] * result.x[1]).sqrt();
    assert_abs_diff_eq!(result.xnorm, expected_xnorm, epsilon = 1e-15);
    assert_eq!(result.singularity, None);
}

#[test]
fn test_reference_2x2_dense_input() {
    let mut ctx = SolverContext::host();
    let a = DenseArray::from_rows(&[vec![4.0, 1.0], vec![1.0, 3.0]]).unwrap();
    let b = DenseArray::from_vec(vec![1.0, 2.0]);

    let result = ctx.lsqr(&a, &b).expect("solve failed");

    assert_abs_diff_eq!(result.x[0], 1.0 / 11.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.x[1], 7.0 / 11.0, epsilon = 1e-12);
}

#[test]
fn test_singular_system_does_not_fail() {
    let mut ctx = SolverContext::host().with_options(SolveOptions {
        tol: Some(1e-8),
        reorder: Reorder::Symrcm,
    });
    let a = DenseArray::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
    let b = DenseArray::from_vec(vec![1.0, 1.0]);

    let result = ctx.lsqr(&a, &b).expect("singular systems are reported, not raised");

    // x is not checked for accuracy here.
    assert!(result.singularity.is_some());
    assert_eq!(result.x.len(), 2);
}

fn ones_2x2<T: Copy + Default + std::ops::AddAssign>(one: T) -> CsrMatrix<T> {
    CsrMatrix::from_triplets(2, 2, &[(0, 0, one), (0, 1, one), (1, 0, one), (1, 1, one)])
}

#[test]
fn test_singular_single_precision_with_default_options() {
    let mut ctx = SolverContext::host();
    let b = DenseArray::from_vec(vec![1.0f32, 1.0]);

    let result = ctx.lsqr(&ones_2x2(1.0f32), &b).unwrap();

    assert_eq!(result.precision, Precision::Single);
    assert!(result.singularity.is_some(), "got {:?}", result.singularity);
}

#[test]
fn test_singular_promoted_integer_with_default_options() {
    let mut ctx = SolverContext::host();
    let b = DenseArray::from_vec(vec![1i16, 1]);

    let result = ctx.lsqr(&ones_2x2(1i16), &b).unwrap();

    assert_eq!(result.precision, Precision::Single);
    assert!(result.singularity.is_some(), "got {:?}", result.singularity);
}

#[test]
fn test_singular_double_precision_with_default_options() {
    let mut ctx = SolverContext::host();
    let b = DenseArray::from_vec(vec![1.0, 1.0]);

    let result = ctx.lsqr(&ones_2x2(1.0f64), &b).unwrap();

    assert_eq!(result.precision, Precision::Double);
    assert!(result.singularity.is_some(), "got {:?}", result.singularity);
}

#[test]
fn test_legacy_tolerance_flags_unit_pivots() {
    // With tol = 1.0 the identity already counts as singular.
    let mut ctx = SolverContext::host().with_options(SolveOptions::legacy());
    let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]);
    let b = DenseArray::from_vec(vec![3.0, 7.0]);

    let result = ctx.lsqr(&a, &b).unwrap();

    assert_eq!(result.singularity, Some(0));
    assert_abs_diff_eq!(result.x[0], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.x[1], 7.0, epsilon = 1e-12);
}

#[test]
fn test_larger_system_with_and_without_reorder() {
    // Shifted 1-D Laplacian with one corner coupling that breaks the band.
    let n = 6;
    let mut triplets = Vec::new();
    for i in 0..n {
        triplets.push((i, i, 3.0));
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
        }
    }
    triplets.push((0, n - 1, 0.5));
    let a = CsrMatrix::from_triplets(n, n, &triplets);
    let b_vals: Vec<f64> = (1..=n).map(|v| v as f64).collect();
    let b = DenseArray::from_vec(b_vals.clone());

    for reorder in [Reorder::None, Reorder::Symrcm] {
        let mut ctx = SolverContext::host().with_options(SolveOptions {
            tol: Some(1e-12),
            reorder,
        });
        let result = ctx.lsqr(&a, &b).unwrap();
        assert_solves(&a, &b_vals, &result.x, 1e-10);
        assert!(result.r1norm < 1e-10, "{reorder:?}: r1norm = {}", result.r1norm);
        assert_eq!(result.singularity, None);
    }
}

// ── Precision selection ───────────────────────────────────────────

#[test]
fn test_integer_matrix_promotes_to_double() {
    let mut ctx = SolverContext::host();
    let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 4i64), (0, 1, 1), (1, 0, 1), (1, 1, 3)]);
    let b = DenseArray::from_vec(vec![1i64, 2]);

    let result = ctx.lsqr(&a, &b).unwrap();

    assert_eq!(result.precision, Precision::Double);
    assert_abs_diff_eq!(result.x[0], 1.0 / 11.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.x[1], 7.0 / 11.0, epsilon = 1e-12);
}

#[test]
fn test_small_integer_matrix_promotes_to_single() {
    let mut ctx = SolverContext::host();
    let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 4i16), (0, 1, 1), (1, 0, 1), (1, 1, 3)]);
    let b = DenseArray::from_vec(vec![1.0f64, 2.0]);

    let result = ctx.lsqr(&a, &b).unwrap();

    assert_eq!(result.precision, Precision::Single);
    assert_abs_diff_eq!(result.x[0], 1.0 / 11.0, epsilon = 1e-6);
    assert_abs_diff_eq!(result.x[1], 7.0 / 11.0, epsilon = 1e-6);
}

#[test]
fn test_half_precision_matrix_solves_in_single() {
    let mut ctx = SolverContext::host();
    let h = f16::from_f32;
    let a = DenseArray::from_rows(&[vec![h(4.0), h(1.0)], vec![h(1.0), h(3.0)]]).unwrap();
    let b = DenseArray::from_vec(vec![1.0f32, 2.0]);

    let result = ctx.lsqr(&a, &b).unwrap();

    assert_eq!(result.precision, Precision::Single);
    assert_abs_diff_eq!(result.x[1], 7.0 / 11.0, epsilon = 1e-6);
}

#[test]
fn test_f32_stays_single_and_output_is_f64() {
    let mut ctx = SolverContext::host();
    let a = reference_matrix().map_values(|v| v as f32);
    let b = DenseArray::from_vec(vec![1.0f32, 2.0]);

    let result = ctx.lsqr(&a, &b).unwrap();

    assert_eq!(result.precision, Precision::Single);
    let x: &Vec<f64> = &result.x;
    assert_abs_diff_eq!(x[0], 1.0 / 11.0, epsilon = 1e-6);
}

// ── Precondition failures ─────────────────────────────────────────

#[test]
fn test_non_square_csr_is_shape_error() {
    let mut ctx = SolverContext::host();
    for (rows, cols) in [(2, 3), (3, 2), (1, 4)] {
        let a = CsrMatrix::from_triplets(rows, cols, &[(0, 0, 1.0)]);
        let b = DenseArray::from_vec(vec![1.0; rows]);
        let err = ctx.lsqr(&a, &b).unwrap_err();
        assert!(matches!(err, QrSolveError::Shape(_)), "{rows}x{cols}: {err}");
    }
    assert_eq!(ctx.native_calls(), 0);
}

#[test]
fn test_non_square_dense_is_shape_error() {
    let mut ctx = SolverContext::host();
    let a = DenseArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
    let b = DenseArray::from_vec(vec![1.0, 2.0]);
    let err = ctx.lsqr(&a, &b).unwrap_err();
    assert!(matches!(err, QrSolveError::Shape(_)));
}

#[test]
fn test_dense_1d_matrix_is_shape_error() {
    let mut ctx = SolverContext::host();
    let a = DenseArray::from_vec(vec![1.0, 2.0]);
    let b = DenseArray::from_vec(vec![1.0, 2.0]);
    assert!(matches!(ctx.lsqr(&a, &b), Err(QrSolveError::Shape(_))));
}

#[test]
fn test_wrong_length_b_is_value_error() {
    let mut ctx = SolverContext::host();
    let b = DenseArray::from_vec(vec![1.0, 2.0, 3.0]);
    let err = ctx.lsqr(&reference_matrix(), &b).unwrap_err();
    assert!(matches!(err, QrSolveError::Value(_)));
    assert!(format!("{err}").contains("length 2"), "got: {err}");
}

#[test]
fn test_two_dimensional_b_is_value_error() {
    let mut ctx = SolverContext::host();
    let b = DenseArray::from_shape_vec(vec![2, 1], vec![1.0, 2.0]).unwrap();
    let err = ctx.lsqr(&reference_matrix(), &b).unwrap_err();
    assert!(matches!(err, QrSolveError::Value(_)));
    assert_eq!(ctx.allocations(), 0);
}

#[test]
fn test_malformed_csr_is_value_error() {
    let mut ctx = SolverContext::host();
    let mut a = reference_matrix();
    a.col_indices[3] = 5;
    let b = DenseArray::from_vec(vec![1.0, 2.0]);
    assert!(matches!(ctx.lsqr(&a, &b), Err(QrSolveError::Value(_))));
}

#[test]
fn test_unsupported_regardless_of_inputs() {
    let mut ctx = SolverContext::unavailable("sparse QR not built");

    let good = ctx.lsqr(&reference_matrix(), &DenseArray::from_vec(vec![1.0, 2.0]));
    assert!(matches!(good, Err(QrSolveError::Unsupported(_))));

    let non_square = CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0)]);
    let bad_b = DenseArray::from_shape_vec(vec![1, 2], vec![1.0, 2.0]).unwrap();
    let bad = ctx.lsqr(&non_square, &bad_b);
    assert!(matches!(bad, Err(QrSolveError::Unsupported(_))));

    assert_eq!(ctx.allocations(), 0);
    assert_eq!(ctx.native_calls(), 0);
}

// ── File input ────────────────────────────────────────────────────

#[test]
fn test_matrix_market_end_to_end() {
    let matrix = "\
%%MatrixMarket matrix coordinate integer symmetric
3 3 5
1 1 4
2 1 1
2 2 4
3 2 1
3 3 4
";
    let rhs = "%%MatrixMarket matrix array real general\n3 1\n5\n6\n5\n";

    let mm = parser::parse_matrix_market(matrix).unwrap();
    let a = mm.to_csr_i64().unwrap();
    let b = DenseArray::from_vec(parser::parse_vector(rhs).unwrap());

    let mut ctx = SolverContext::host();
    let result = ctx.lsqr(&a, &b).unwrap();

    // [[4,1,0],[1,4,1],[0,1,4]] * [1,1,1] = [5,6,5]
    for xi in &result.x {
        assert_abs_diff_eq!(*xi, 1.0, epsilon = 1e-12);
    }
    assert_eq!(result.precision, Precision::Double);
}
