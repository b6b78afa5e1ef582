//! Process-local kernels for column-major matrices.
//!
//! Every routine here operates on a plain slice plus a leading dimension, the
//! same convention BLAS uses: entry `(i, j)` of an `m x n` operand lives at
//! `data[i + j * ld]` with `ld >= m`. The distributed layer in `distla` hands
//! its local buffers (or windows into them) straight to these functions.

use num_complex::Complex;
use num_traits::{FromPrimitive, Num, NumAssign};
use std::fmt::Debug;
use thiserror::Error;

pub mod cpu_gemm;
pub mod cpu_level1;
pub mod cpu_transpose;

pub use cpu_gemm::{check_conformal, gemm, Backend, Orientation};
pub use cpu_level1::{axpy, scale};
pub use cpu_transpose::transpose;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Nonconformal {op}: {dims}")]
    Nonconformal { op: &'static str, dims: String },
    #[error("Buffer for {operand} too small: need {required} elements, got {got}")]
    BufferTooSmall {
        operand: &'static str,
        required: usize,
        got: usize,
    },
    #[error("Leading dimension {ldim} of {operand} is smaller than its height {height}")]
    InvalidLeadingDimension {
        operand: &'static str,
        ldim: usize,
        height: usize,
    },
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Element types the kernels (and everything built on them) accept.
///
/// The bound mirrors what the distributed algorithms need: ring arithmetic,
/// conjugation for adjoint orientations, and a real-valued modulus for norms.
pub trait Scalar:
    Num + NumAssign + FromPrimitive + Copy + Debug + Send + Sync + 'static
{
    /// The real field underlying `Self` (`Self` for real and integer types).
    type Real: Scalar<Real = Self::Real> + PartialOrd;

    fn conj(self) -> Self;

    /// `|x|`, the absolute value or complex modulus.
    fn modulus(self) -> Self::Real;

    fn from_real(re: Self::Real) -> Self;

    /// Builds a value from real and imaginary parts; real types drop `im`.
    fn from_parts(re: f64, im: f64) -> Self;

    /// Runs `c := alpha * op(a) * op(b) + beta * c` through `matrixmultiply`.
    ///
    /// Returns `false` when the type has no accelerated path, in which case the
    /// caller falls back to the reference kernel. Operand extents have already
    /// been validated by [`gemm`].
    #[allow(clippy::too_many_arguments)]
    fn accelerated_gemm(
        _trans_a: bool,
        _trans_b: bool,
        _m: usize,
        _n: usize,
        _k: usize,
        _alpha: Self,
        _a: &[Self],
        _lda: usize,
        _b: &[Self],
        _ldb: usize,
        _beta: Self,
        _c: &mut [Self],
        _ldc: usize,
    ) -> bool {
        false
    }
}

macro_rules! impl_float_scalar {
    ($t:ty, $gemm:path) => {
        impl Scalar for $t {
            type Real = $t;

            fn conj(self) -> Self {
                self
            }

            fn modulus(self) -> Self::Real {
                self.abs()
            }

            fn from_real(re: Self::Real) -> Self {
                re
            }

            fn from_parts(re: f64, _im: f64) -> Self {
                re as $t
            }

            fn accelerated_gemm(
                trans_a: bool,
                trans_b: bool,
                m: usize,
                n: usize,
                k: usize,
                alpha: Self,
                a: &[Self],
                lda: usize,
                b: &[Self],
                ldb: usize,
                beta: Self,
                c: &mut [Self],
                ldc: usize,
            ) -> bool {
                let (rsa, csa) = if trans_a { (lda as isize, 1) } else { (1, lda as isize) };
                let (rsb, csb) = if trans_b { (ldb as isize, 1) } else { (1, ldb as isize) };
                // SAFETY: `gemm` checked that every operand slice covers its
                // strided extent, so all reads and writes stay in bounds.
                unsafe {
                    $gemm(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ptr(),
                        rsa,
                        csa,
                        b.as_ptr(),
                        rsb,
                        csb,
                        beta,
                        c.as_mut_ptr(),
                        1,
                        ldc as isize,
                    );
                }
                true
            }
        }
    };
}

impl_float_scalar!(f32, matrixmultiply::sgemm);
impl_float_scalar!(f64, matrixmultiply::dgemm);

macro_rules! impl_int_scalar {
    ($t:ty) => {
        impl Scalar for $t {
            type Real = $t;

            fn conj(self) -> Self {
                self
            }

            fn modulus(self) -> Self::Real {
                self.wrapping_abs()
            }

            fn from_real(re: Self::Real) -> Self {
                re
            }

            fn from_parts(re: f64, _im: f64) -> Self {
                re as $t
            }
        }
    };
}

impl_int_scalar!(i32);
impl_int_scalar!(i64);

macro_rules! impl_complex_scalar {
    ($t:ty) => {
        impl Scalar for Complex<$t> {
            type Real = $t;

            fn conj(self) -> Self {
                Complex::conj(&self)
            }

            fn modulus(self) -> Self::Real {
                self.norm()
            }

            fn from_real(re: Self::Real) -> Self {
                Complex::new(re, 0.0)
            }

            fn from_parts(re: f64, im: f64) -> Self {
                Complex::new(re as $t, im as $t)
            }
        }
    };
}

impl_complex_scalar!(f32);
impl_complex_scalar!(f64);

/// Number of elements a column-major `rows x cols` operand with leading
/// dimension `ld` spans in memory.
pub fn required_len(rows: usize, cols: usize, ld: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        (cols - 1) * ld + rows
    }
}

pub(crate) fn check_operand<T>(
    operand: &'static str,
    data: &[T],
    rows: usize,
    cols: usize,
    ld: usize,
) -> Result<()> {
    if rows > 0 && ld < rows {
        return Err(KernelError::InvalidLeadingDimension {
            operand,
            ldim: ld,
            height: rows,
        });
    }
    let required = required_len(rows, cols, ld);
    if data.len() < required {
        return Err(KernelError::BufferTooSmall {
            operand,
            required,
            got: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_conj_and_modulus() {
        let z = Complex::new(3.0f64, -4.0);
        assert_eq!(Scalar::conj(z), Complex::new(3.0, 4.0));
        assert_eq!(z.modulus(), 5.0);
    }

    #[test]
    fn test_int_modulus() {
        assert_eq!((-7i32).modulus(), 7);
        assert_eq!(Scalar::conj(5i64), 5);
    }

    #[test]
    fn test_check_operand_rejects_short_ld() {
        let data = vec![0.0f32; 12];
        let err = check_operand("A", &data, 4, 3, 3);
        assert!(matches!(
            err,
            Err(KernelError::InvalidLeadingDimension { ldim: 3, height: 4, .. })
        ));
    }

    #[test]
    fn test_check_operand_rejects_short_buffer() {
        let data = vec![0.0f32; 10];
        let err = check_operand("C", &data, 4, 3, 4);
        assert!(matches!(
            err,
            Err(KernelError::BufferTooSmall { required: 12, got: 10, .. })
        ));
    }

    #[test]
    fn test_empty_operand_needs_no_storage() {
        let data: Vec<f64> = Vec::new();
        assert!(check_operand("B", &data, 0, 5, 1).is_ok());
        assert_eq!(required_len(3, 0, 7), 0);
    }
}
