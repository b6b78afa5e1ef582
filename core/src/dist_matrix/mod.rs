//! # Distributed Matrices
//!
//! A [`DistMatrix`] is a global `m x n` matrix spread over a [`Grid`]
//! according to a [`DistPair`]. Every process stores only the entries it
//! holds, densely packed and column-major, in a local [`Matrix`].
//!
//! ```text
//!  global 5x4, [MC,MR] on a 2x2 grid, alignments 0
//!
//!     c0 c1 c2 c3          (0,0) holds rows {0,2,4} x cols {0,2}
//!  r0  a  b  a  b          (1,0) holds rows {1,3}   x cols {0,2}
//!  r1  c  d  c  d          (0,1) holds rows {0,2,4} x cols {1,3}
//!  r2  a  b  a  b          (1,1) holds rows {1,3}   x cols {1,3}
//!  r3  c  d  c  d
//!  r4  a  b  a  b
//! ```
//!
//! # Alignment Constraints
//!
//! Alignments start out free. [`align`](DistMatrix::align) and
//! [`align_with`](DistMatrix::align_with) pin them; a pinned alignment is kept
//! by every later redistribution into the matrix. Free alignments are adopted
//! from the source of the first redistribution, which is what lets temporaries
//! in the algorithms avoid a data movement.
//!
//! > [!NOTE]
//! > Changing the alignment with `align` discards the contents. Use
//! > [`realign`](DistMatrix::realign) to keep them.

mod view;

pub use view::{DistView, DistViewMut};

pub(crate) use view::Window;

use crate::dist::{compatible_alignment, Dist, DistPair, Layout, Ownership};
use crate::error::Result;
use crate::grid::Grid;
use crate::matrix::{Matrix, MatrixView};
use distla_kernels::Scalar;
use std::fmt;
use std::sync::Arc;
use view::layout_accessors;

pub struct DistMatrix<T> {
    grid: Arc<Grid>,
    layout: Layout,
    col_constrained: bool,
    row_constrained: bool,
    root_constrained: bool,
    pub(crate) local: Matrix<T>,
}

impl<T: Scalar> DistMatrix<T> {
    /// An empty `0 x 0` matrix with free alignments.
    pub fn new(grid: &Arc<Grid>, dist: DistPair) -> Self {
        Self {
            grid: Arc::clone(grid),
            layout: Layout::new(dist, 0, 0),
            col_constrained: false,
            row_constrained: false,
            root_constrained: false,
            local: Matrix::empty(),
        }
    }

    /// An `height x width` matrix of zeros with alignments 0 (not pinned).
    pub fn zeros(grid: &Arc<Grid>, dist: DistPair, height: usize, width: usize) -> Result<Self> {
        let mut matrix = Self::new(grid, dist);
        matrix.resize(height, width)?;
        Ok(matrix)
    }

    /// Builds a matrix from a function of the global indices. Each process
    /// only evaluates `f` at the entries it holds.
    pub fn from_global_fn(
        grid: &Arc<Grid>,
        dist: DistPair,
        height: usize,
        width: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Result<Self> {
        let mut matrix = Self::zeros(grid, dist, height, width)?;
        let col = matrix.col_ownership();
        let row = matrix.row_ownership();
        for (jl, j) in row.indices(width).enumerate() {
            for (il, i) in col.indices(height).enumerate() {
                matrix.local.set(il, jl, f(i, j));
            }
        }
        Ok(matrix)
    }

    /// Distributes a matrix every process already holds in full. No
    /// communication.
    pub fn from_global(grid: &Arc<Grid>, dist: DistPair, global: &Matrix<T>) -> Result<Self> {
        Self::from_global_fn(grid, dist, global.height(), global.width(), |i, j| {
            global.get(i, j)
        })
    }

    /// A redistributed copy of `src`. Alignments are taken from `src`
    /// where the distributions are compatible.
    pub fn from_view(dist: DistPair, src: &DistView<'_, T>) -> Result<Self> {
        let mut matrix = Self::new(src.grid(), dist);
        matrix.resize(src.height(), src.width())?;
        matrix.copy_from(src)?;
        Ok(matrix)
    }

    layout_accessors!();

    pub fn local(&self) -> &Matrix<T> {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut Matrix<T> {
        &mut self.local
    }

    pub fn col_constrained(&self) -> bool {
        self.col_constrained
    }

    pub fn row_constrained(&self) -> bool {
        self.row_constrained
    }

    pub fn root_constrained(&self) -> bool {
        self.root_constrained
    }

    pub fn set_local(&mut self, local_row: usize, local_col: usize, value: T) {
        self.local.set(local_row, local_col, value);
    }

    pub fn update_local(&mut self, local_row: usize, local_col: usize, value: T) {
        self.local.update(local_row, local_col, value);
    }

    /// Reads entry `(i, j)` on every process. Collective; see
    /// [`DistView::get`].
    pub fn get(&self, i: usize, j: usize) -> Result<T> {
        self.as_view().get(i, j)
    }

    /// Writes `value` at `(i, j)` on the processes that hold it. Every process
    /// may call it; non-holders do nothing. No communication.
    pub fn set(&mut self, i: usize, j: usize, value: T) -> Result<()> {
        self.layout.check_index(i, j)?;
        if let Some((il, jl)) = self.local_position(i, j) {
            self.local.set(il, jl, value);
        }
        Ok(())
    }

    /// Adds `value` to `(i, j)` on the processes that hold it.
    pub fn update(&mut self, i: usize, j: usize, value: T) -> Result<()> {
        self.layout.check_index(i, j)?;
        if let Some((il, jl)) = self.local_position(i, j) {
            self.local.update(il, jl, value);
        }
        Ok(())
    }

    /// Changes the global dimensions, keeping distribution and alignments.
    /// The contents are reset to zero.
    pub fn resize(&mut self, height: usize, width: usize) -> Result<()> {
        self.layout.height = height;
        self.layout.width = width;
        self.reallocate()
    }

    /// Resets to `0 x 0` and frees every alignment.
    pub fn empty(&mut self) {
        self.layout = Layout::new(self.layout.dist, 0, 0);
        self.col_constrained = false;
        self.row_constrained = false;
        self.root_constrained = false;
        self.local = Matrix::empty();
    }

    /// Pins both alignments. Non-cyclic dimensions ignore their argument.
    ///
    /// # Errors
    ///
    /// Returns `DistError::Configuration` if an alignment is not smaller than
    /// the stride of its dimension.
    pub fn align(&mut self, col_align: usize, row_align: usize) -> Result<()> {
        let mut layout = self.layout;
        layout.col_align = normalized(self.dist().col(), col_align);
        layout.row_align = normalized(self.dist().row(), row_align);
        layout.validate(&self.grid.shape())?;
        self.col_constrained = true;
        self.row_constrained = true;
        self.set_layout(layout)
    }

    pub fn align_cols(&mut self, col_align: usize) -> Result<()> {
        let row_constrained = self.row_constrained;
        self.align(col_align, self.row_align())?;
        self.row_constrained = row_constrained;
        Ok(())
    }

    pub fn align_rows(&mut self, row_align: usize) -> Result<()> {
        let col_constrained = self.col_constrained;
        self.align(self.col_align(), row_align)?;
        self.col_constrained = col_constrained;
        Ok(())
    }

    /// Pins the root of an `[o,o]` matrix.
    pub fn set_root(&mut self, root: usize) -> Result<()> {
        let mut layout = self.layout;
        layout.root = root;
        layout.validate(&self.grid.shape())?;
        self.root_constrained = true;
        self.set_layout(layout)
    }

    /// Pins every alignment that has a counterpart in `other`, so the two
    /// matrices' local pieces line up along those dimensions.
    ///
    /// `[MC,*]` aligned with `[MC,MR]` takes the `MC` alignment; `[*,MC]`
    /// takes it for its row dimension. Unrelated dimensions stay as they are.
    pub fn align_with(&mut self, other: &Layout) -> Result<()> {
        let shape = self.grid.shape();
        let mut layout = self.layout;
        if let Some(align) = compatible_alignment(self.dist().col(), other, &shape) {
            layout.col_align = align;
            self.col_constrained = true;
        }
        if let Some(align) = compatible_alignment(self.dist().row(), other, &shape) {
            layout.row_align = align;
            self.row_constrained = true;
        }
        if self.dist() == DistPair::CIRC_CIRC && other.dist == DistPair::CIRC_CIRC {
            layout.root = other.root;
            self.root_constrained = true;
        }
        self.set_layout(layout)
    }

    /// Lets the next redistribution into this matrix pick its alignments
    /// again. The current contents and alignments are kept until then.
    pub fn free_alignments(&mut self) {
        self.col_constrained = false;
        self.row_constrained = false;
        self.root_constrained = false;
    }

    /// Moves to new alignments, keeping the contents. Collective.
    pub fn realign(&mut self, col_align: usize, row_align: usize) -> Result<()> {
        let mut target = Self::new(&self.grid, self.dist());
        target.layout.root = self.root();
        target.root_constrained = self.root_constrained;
        target.align(col_align, row_align)?;
        target.resize(self.height(), self.width())?;
        target.copy_from(&self.as_view())?;
        *self = target;
        Ok(())
    }

    /// Overwrites this matrix with `src`, redistributing as needed.
    /// Collective; see [`redistribute`](crate::redistribute).
    pub fn copy_from(&mut self, src: &DistView<'_, T>) -> Result<()> {
        crate::redist::redistribute(src, self)
    }

    /// Gathers the whole matrix onto every process. Collective.
    pub fn to_global(&self) -> Result<Matrix<T>> {
        self.as_view().to_global()
    }

    pub fn as_view(&self) -> DistView<'_, T> {
        DistView {
            grid: &self.grid,
            layout: self.layout,
            local: self.local.view(),
        }
    }

    pub fn as_view_mut(&mut self) -> DistViewMut<'_, T> {
        DistViewMut {
            grid: &self.grid,
            layout: self.layout,
            local: self.local.view_mut(),
        }
    }

    /// The `h x w` window starting at global `(i0, j0)`.
    pub fn view(&self, i0: usize, j0: usize, h: usize, w: usize) -> Result<DistView<'_, T>> {
        self.as_view().view(i0, j0, h, w)
    }

    pub fn view_mut(&mut self, i0: usize, j0: usize, h: usize, w: usize) -> Result<DistViewMut<'_, T>> {
        let window = Window::new(&self.grid, &self.layout, i0, j0, h, w)?;
        let local = self.local.sub_mut(
            window.local_row,
            window.local_col,
            window.local_height,
            window.local_width,
        )?;
        Ok(DistViewMut {
            grid: &self.grid,
            layout: window.layout,
            local,
        })
    }

    /// Local entries as `(global_row, global_col, value)`, column by column.
    pub fn local_entries(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        local_entries(self.as_view().local(), self.col_ownership(), self.row_ownership())
    }

    pub(crate) fn is_free(&self) -> (bool, bool, bool) {
        (!self.col_constrained, !self.row_constrained, !self.root_constrained)
    }

    /// Replaces the layout (dims included) and reallocates if it changed.
    /// Constraint flags are left alone.
    pub(crate) fn set_layout(&mut self, layout: Layout) -> Result<()> {
        if layout != self.layout {
            self.layout = layout;
            self.reallocate()?;
        }
        Ok(())
    }

    fn reallocate(&mut self) -> Result<()> {
        let (h, w) = self.layout.local_dims(&self.grid.shape(), self.grid.position());
        self.local = Matrix::zeros(h, w)?;
        Ok(())
    }
}

fn normalized(dist: Dist, align: usize) -> usize {
    if dist.is_cyclic() {
        align
    } else {
        0
    }
}

pub(crate) fn local_entries<'a, T: Scalar>(
    local: MatrixView<'a, T>,
    col: Ownership,
    row: Ownership,
) -> impl Iterator<Item = (usize, usize, T)> + 'a {
    (0..local.width()).flat_map(move |jl| {
        (0..local.height()).map(move |il| (col.global_index(il), row.global_index(jl), local.get(il, jl)))
    })
}

impl<T: Scalar> fmt::Debug for DistMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistMatrix")
            .field("dist", &self.layout.dist.to_string())
            .field("height", &self.layout.height)
            .field("width", &self.layout.width)
            .field("col_align", &self.layout.col_align)
            .field("row_align", &self.layout.row_align)
            .field("local", &self.local.dims())
            .finish()
    }
}
