#![allow(dead_code)]

use distla::{Matrix, Orientation, Scalar};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Routes `tracing` output through the test harness; `RUST_LOG=distla=trace`
/// shows every hop and panel.
///
/// Installed globally rather than per thread, since every rank runs on its own
/// thread. Later calls are no-ops.
pub fn init_test_subscriber() {
    let fmt_layer = fmt::layer().with_target(true).with_test_writer();

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}

/// A deterministic, non-symmetric test matrix with small integer values.
pub fn test_matrix(seed: usize, m: usize, n: usize) -> Matrix<f64> {
    Matrix::from_fn(m, n, |i, j| ((i * 7 + j * 3 + seed * 5) % 11) as f64 - 5.0).unwrap()
}

pub fn op_entry<T: Scalar>(orient: Orientation, x: &Matrix<T>, i: usize, j: usize) -> T {
    match orient {
        Orientation::Normal => x.get(i, j),
        Orientation::Transpose => x.get(j, i),
        Orientation::Adjoint => x.get(j, i).conj(),
    }
}

pub fn op_dims<T: Scalar>(orient: Orientation, x: &Matrix<T>) -> (usize, usize) {
    if orient.is_transposed() {
        (x.width(), x.height())
    } else {
        (x.height(), x.width())
    }
}

/// `alpha * op(A) * op(B) + beta * C` computed entry by entry.
pub fn reference_gemm<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: &Matrix<T>,
    b: &Matrix<T>,
    beta: T,
    c: &Matrix<T>,
) -> Matrix<T> {
    let (m, k) = op_dims(orient_a, a);
    let n = op_dims(orient_b, b).1;
    Matrix::from_fn(m, n, |i, j| {
        let mut sum = T::zero();
        for l in 0..k {
            sum += op_entry(orient_a, a, i, l) * op_entry(orient_b, b, l, j);
        }
        alpha * sum + beta * c.get(i, j)
    })
    .unwrap()
}

pub fn assert_close(got: &Matrix<f64>, expected: &Matrix<f64>, context: &str) {
    assert_eq!(got.dims(), expected.dims(), "{context}");
    for j in 0..expected.width() {
        for i in 0..expected.height() {
            let (g, e) = (got.get(i, j), expected.get(i, j));
            assert!(
                (g - e).abs() <= 1e-9 * (1.0 + e.abs()),
                "{context}: entry ({i}, {j}) is {g}, expected {e}"
            );
        }
    }
}
