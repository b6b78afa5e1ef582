use super::{check_window, Matrix};
use crate::error::Result;
use distla_kernels::{required_len, Scalar};
use std::ops::Range;

/// Slice range covering an `h x w` window at offset `offset` with leading
/// dimension `ldim`. Empty windows map to an empty range so offsets past the
/// end of the parent stay valid.
fn window_range(offset: usize, h: usize, w: usize, ldim: usize) -> Range<usize> {
    let span = required_len(h, w, ldim);
    if span == 0 {
        0..0
    } else {
        offset..offset + span
    }
}

/// A borrowed, read-only column-major window.
#[derive(Clone, Copy)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    height: usize,
    width: usize,
    ldim: usize,
}

impl<'a, T: Scalar> MatrixView<'a, T> {
    pub(crate) fn from_parts(data: &'a [T], height: usize, width: usize, ldim: usize) -> Self {
        debug_assert!(data.len() >= required_len(height, width, ldim));
        Self {
            data,
            height,
            width,
            ldim,
        }
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

    /// Data starting at entry `(0, 0)`, suitable for a kernel call together
    /// with [`ldim`](Self::ldim).
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.ldim]
    }

    pub fn sub(&self, i0: usize, j0: usize, h: usize, w: usize) -> Result<MatrixView<'a, T>> {
        check_window(self.dims(), i0, j0, h, w)?;
        let range = window_range(i0 + j0 * self.ldim, h, w, self.ldim);
        Ok(Self::from_parts(&self.data[range], h, w, self.ldim))
    }

    pub fn to_matrix(&self) -> Result<Matrix<T>> {
        Matrix::from_fn(self.height, self.width, |i, j| self.get(i, j))
    }

    pub fn transpose(&self, conjugate: bool) -> Result<Matrix<T>> {
        let data = distla_kernels::transpose(self.height, self.width, self.data, self.ldim, conjugate)?;
        Matrix::new(data, self.width, self.height)
    }
}

/// A borrowed, mutable column-major window.
pub struct MatrixViewMut<'a, T> {
    data: &'a mut [T],
    height: usize,
    width: usize,
    ldim: usize,
}

impl<'a, T: Scalar> MatrixViewMut<'a, T> {
    pub(crate) fn from_parts(data: &'a mut [T], height: usize, width: usize, ldim: usize) -> Self {
        debug_assert!(data.len() >= required_len(height, width, ldim));
        Self {
            data,
            height,
            width,
            ldim,
        }
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

    pub fn data(&self) -> &[T] {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut *self.data
    }

    pub fn get(&self, i: usize, j: usize) -> T {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.ldim]
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.ldim] = value;
    }

    pub fn update(&mut self, i: usize, j: usize, value: T) {
        debug_assert!(i < self.height && j < self.width);
        self.data[i + j * self.ldim] += value;
    }

    pub fn as_view(&self) -> MatrixView<'_, T> {
        MatrixView::from_parts(&*self.data, self.height, self.width, self.ldim)
    }

    /// Reborrows the `h x w` window at `(i0, j0)`.
    pub fn sub_mut(&mut self, i0: usize, j0: usize, h: usize, w: usize) -> Result<MatrixViewMut<'_, T>> {
        check_window(self.dims(), i0, j0, h, w)?;
        let range = window_range(i0 + j0 * self.ldim, h, w, self.ldim);
        Ok(MatrixViewMut::from_parts(&mut self.data[range], h, w, self.ldim))
    }

    /// Like [`sub_mut`](Self::sub_mut) but consumes the view, keeping the
    /// original lifetime. The window must already be checked.
    pub(crate) fn into_sub(self, i0: usize, j0: usize, h: usize, w: usize) -> MatrixViewMut<'a, T> {
        let MatrixViewMut { data, ldim, .. } = self;
        let range = window_range(i0 + j0 * ldim, h, w, ldim);
        MatrixViewMut::from_parts(&mut data[range], h, w, ldim)
    }

    /// Overwrites this window with `src`, which must have the same dims.
    pub fn copy_from(&mut self, src: &MatrixView<'_, T>) {
        debug_assert_eq!(self.dims(), src.dims());
        for j in 0..self.width {
            for i in 0..self.height {
                self.set(i, j, src.get(i, j));
            }
        }
    }
}
