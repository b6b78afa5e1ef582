use crate::{check_operand, cpu_level1, KernelError, Result, Scalar};
use rayon::prelude::*;

/// How an operand enters a product: as stored, transposed, or conjugate-transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Normal,
    Transpose,
    Adjoint,
}

impl Orientation {
    pub fn is_transposed(self) -> bool {
        self != Orientation::Normal
    }

    /// The BLAS-style letter, used in error messages such as `GemmNT`.
    pub fn as_char(self) -> char {
        match self {
            Orientation::Normal => 'N',
            Orientation::Transpose => 'T',
            Orientation::Adjoint => 'C',
        }
    }
}

/// Which implementation runs the local product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Packed triple loop parallelised over columns of `C` with `rayon`.
    Reference,
    /// `matrixmultiply::{s,d}gemm` for `f32`/`f64`; other types fall back to `Reference`.
    #[default]
    MatrixMultiply,
}

/// CPU implementation of `C := alpha * op(A) * op(B) + beta * C`.
///
/// All operands are column-major with explicit leading dimensions, so windows
/// into a larger buffer can be passed without copying.
///
/// # Arguments
///
/// * `orient_a`, `orient_b` - orientation applied to `A` and `B`.
/// * `m`, `n`, `k` - `op(A)` is `m x k`, `op(B)` is `k x n`, `C` is `m x n`.
/// * `lda`, `ldb`, `ldc` - leading dimensions of the stored operands.
///
/// When `beta` is zero, `C` is overwritten without being read, so it may hold
/// garbage (including NaN). When `k` is zero or `alpha` is zero the call only
/// scales `C`.
#[allow(clippy::too_many_arguments)]
pub fn gemm<T: Scalar>(
    backend: Backend,
    orient_a: Orientation,
    orient_b: Orientation,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) -> Result<()> {
    let (a_rows, a_cols) = if orient_a.is_transposed() { (k, m) } else { (m, k) };
    let (b_rows, b_cols) = if orient_b.is_transposed() { (n, k) } else { (k, n) };
    check_operand("A", a, a_rows, a_cols, lda)?;
    check_operand("B", b, b_rows, b_cols, ldb)?;
    check_operand("C", c, m, n, ldc)?;

    if m == 0 || n == 0 {
        return Ok(());
    }
    if k == 0 || alpha == T::zero() {
        return cpu_level1::scale(m, n, beta, c, ldc);
    }

    if backend == Backend::MatrixMultiply {
        if beta == T::zero() {
            cpu_level1::scale(m, n, T::zero(), c, ldc)?;
        }
        let accelerated = T::accelerated_gemm(
            orient_a.is_transposed(),
            orient_b.is_transposed(),
            m,
            n,
            k,
            alpha,
            a,
            lda,
            b,
            ldb,
            beta,
            c,
            ldc,
        );
        if accelerated {
            return Ok(());
        }
    }

    reference_gemm(orient_a, orient_b, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc);
    Ok(())
}

/// Checks that `op(A)` (`a_dims`) and `op(B)` (`b_dims`) can produce an `m x n` result.
pub fn check_conformal(
    orient_a: Orientation,
    orient_b: Orientation,
    a_dims: (usize, usize),
    b_dims: (usize, usize),
    c_dims: (usize, usize),
) -> Result<usize> {
    let op_a = if orient_a.is_transposed() { (a_dims.1, a_dims.0) } else { a_dims };
    let op_b = if orient_b.is_transposed() { (b_dims.1, b_dims.0) } else { b_dims };
    if op_a.0 != c_dims.0 || op_b.1 != c_dims.1 || op_a.1 != op_b.0 {
        return Err(KernelError::Nonconformal {
            op: "local gemm",
            dims: format!(
                "op(A) {}x{}, op(B) {}x{}, C {}x{}",
                op_a.0, op_a.1, op_b.0, op_b.1, c_dims.0, c_dims.1
            ),
        });
    }
    Ok(op_a.1)
}

#[allow(clippy::too_many_arguments)]
fn reference_gemm<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) {
    // Pack rows of op(A) and columns of op(B) contiguously so the inner
    // product below walks both operands sequentially.
    let mut packed_a = Vec::with_capacity(m * k);
    for i in 0..m {
        for l in 0..k {
            packed_a.push(match orient_a {
                Orientation::Normal => a[i + l * lda],
                Orientation::Transpose => a[l + i * lda],
                Orientation::Adjoint => a[l + i * lda].conj(),
            });
        }
    }
    let mut packed_b = Vec::with_capacity(k * n);
    for j in 0..n {
        for l in 0..k {
            packed_b.push(match orient_b {
                Orientation::Normal => b[l + j * ldb],
                Orientation::Transpose => b[j + l * ldb],
                Orientation::Adjoint => b[j + l * ldb].conj(),
            });
        }
    }

    c.par_chunks_mut(ldc)
        .take(n)
        .enumerate()
        .for_each(|(j, col)| {
            let b_col = &packed_b[j * k..(j + 1) * k];
            for (i, out) in col[..m].iter_mut().enumerate() {
                let a_row = &packed_a[i * k..(i + 1) * k];
                let mut sum = T::zero();
                for (&val_a, &val_b) in a_row.iter().zip(b_col.iter()) {
                    sum += val_a * val_b;
                }
                *out = if beta == T::zero() {
                    alpha * sum
                } else {
                    beta * *out + alpha * sum
                };
            }
        });
}
