//! # Local Matrices
//!
//! [`Matrix`] is the process-local, column-major buffer every distributed
//! matrix stores its piece in. [`MatrixView`] and [`MatrixViewMut`] are
//! borrowed windows into one, sharing its leading dimension, so submatrices
//! can be handed to the kernels without copying.
//!
//! # Memory Layout
//!
//! Entry `(i, j)` lives at `data[i + j * ldim]` with `ldim = max(1, height)`.
//! Keeping `ldim >= 1` even for empty matrices means every kernel call sees a
//! valid leading dimension.

mod view;

pub use view::{MatrixView, MatrixViewMut};

use crate::error::{DistError, Result};
use distla_kernels::Scalar;
use std::ops::{Index, IndexMut};

/// A column-major matrix owned by one process.
#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    height: usize,
    width: usize,
    ldim: usize,
}

impl<T: Scalar> Matrix<T> {
    /// Creates a matrix from column-major data.
    ///
    /// # Errors
    ///
    /// Returns `DistError::ShapeMismatch` if `data.len() != height * width`.
    pub fn new(data: Vec<T>, height: usize, width: usize) -> Result<Self> {
        if data.len() != height * width {
            return Err(DistError::ShapeMismatch {
                expected: (height, width),
                got: (data.len(), 1),
            });
        }
        let ldim = height.max(1);
        // An empty matrix with a positive height keeps no storage; that is
        // fine because no column is ever addressed.
        Ok(Self {
            data,
            height,
            width,
            ldim,
        })
    }

    /// A `height x width` matrix of zeros.
    ///
    /// # Errors
    ///
    /// Returns `DistError::Allocation` if the buffer cannot be reserved.
    pub fn zeros(height: usize, width: usize) -> Result<Self> {
        let elements = height
            .checked_mul(width)
            .ok_or(DistError::Allocation { elements: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(elements)
            .map_err(|_| DistError::Allocation { elements })?;
        data.resize(elements, T::zero());
        Ok(Self {
            data,
            height,
            width,
            ldim: height.max(1),
        })
    }

    pub(crate) fn empty() -> Self {
        Self {
            data: Vec::new(),
            height: 0,
            width: 0,
            ldim: 1,
        }
    }

    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> T) -> Result<Self> {
        let mut matrix = Self::zeros(height, width)?;
        for j in 0..width {
            for i in 0..height {
                matrix[(i, j)] = f(i, j);
            }
        }
        Ok(matrix)
    }

    pub fn identity(n: usize) -> Result<Self> {
        Self::from_fn(n, n, |i, j| if i == j { T::one() } else { T::zero() })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn ldim(&self) -> usize {
        self.ldim
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Returns a slice of the underlying column-major data.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        self[(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self[(i, j)] = value;
    }

    pub fn update(&mut self, i: usize, j: usize, value: T) {
        self[(i, j)] += value;
    }

    /// Reallocates to `height x width` zeros.
    pub fn resize(&mut self, height: usize, width: usize) -> Result<()> {
        if (height, width) != self.dims() {
            *self = Self::zeros(height, width)?;
        }
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn view(&self) -> MatrixView<'_, T> {
        MatrixView::from_parts(&self.data, self.height, self.width, self.ldim)
    }

    pub fn view_mut(&mut self) -> MatrixViewMut<'_, T> {
        MatrixViewMut::from_parts(&mut self.data, self.height, self.width, self.ldim)
    }

    /// The `h x w` window starting at `(i0, j0)`.
    pub fn sub(&self, i0: usize, j0: usize, h: usize, w: usize) -> Result<MatrixView<'_, T>> {
        self.view().sub(i0, j0, h, w)
    }

    pub fn sub_mut(&mut self, i0: usize, j0: usize, h: usize, w: usize) -> Result<MatrixViewMut<'_, T>> {
        check_window((self.height, self.width), i0, j0, h, w)?;
        Ok(self.view_mut().into_sub(i0, j0, h, w))
    }

    /// `A^T` (or `A^H` when `conjugate`) as a new matrix.
    pub fn transpose(&self, conjugate: bool) -> Result<Matrix<T>> {
        self.view().transpose(conjugate)
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (i, j): (usize, usize)) -> &T {
        debug_assert!(i < self.height && j < self.width);
        &self.data[i + j * self.ldim]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        debug_assert!(i < self.height && j < self.width);
        &mut self.data[i + j * self.ldim]
    }
}

impl<T: Scalar> std::fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Matrix {}x{} [", self.height, self.width)?;
        for i in 0..self.height {
            let row: Vec<T> = (0..self.width).map(|j| self[(i, j)]).collect();
            writeln!(f, "  {row:?}")?;
        }
        write!(f, "]")
    }
}

pub(crate) fn check_window(
    (height, width): (usize, usize),
    i0: usize,
    j0: usize,
    h: usize,
    w: usize,
) -> Result<()> {
    if i0 + h > height || j0 + w > width {
        return Err(DistError::IndexOutOfBounds {
            row: i0 + h,
            col: j0 + w,
            height,
            width,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_column_major() {
        let m = Matrix::new(vec![1, 2, 3, 4, 5, 6], 2, 3).unwrap();
        assert_eq!(m.get(0, 0), 1);
        assert_eq!(m.get(1, 0), 2);
        assert_eq!(m.get(0, 2), 5);
        assert_eq!(m.ldim(), 2);
    }

    #[test]
    fn test_new_shape_mismatch() {
        let err = Matrix::new(vec![1.0; 5], 2, 3);
        assert!(matches!(err, Err(DistError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_empty_keeps_positive_ldim() {
        let m = Matrix::<f64>::zeros(0, 4).unwrap();
        assert_eq!(m.ldim(), 1);
        assert!(m.is_empty());
        assert!(m.data().is_empty());
    }

    #[test]
    fn test_zeros_overflow_is_allocation_error() {
        let err = Matrix::<f32>::zeros(usize::MAX, 2);
        assert!(matches!(err, Err(DistError::Allocation { .. })));
    }

    #[test]
    fn test_sub_mut_writes_through() {
        let mut m = Matrix::<i32>::zeros(3, 3).unwrap();
        {
            let mut window = m.sub_mut(1, 1, 2, 2).unwrap();
            window.set(1, 0, 7);
        }
        assert_eq!(m.get(2, 1), 7);
        assert!(m.sub_mut(2, 2, 2, 1).is_err());
    }

    #[test]
    fn test_transpose() {
        let m = Matrix::from_fn(2, 3, |i, j| (10 * i + j) as i64).unwrap();
        let t = m.transpose(false).unwrap();
        assert_eq!(t.dims(), (3, 2));
        assert_eq!(t.get(2, 1), 12);
    }
}
