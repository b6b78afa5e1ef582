use crate::dist::{DistPair, Layout, Ownership};
use crate::error::{DistError, Result};
use crate::grid::Grid;
use crate::matrix::{Matrix, MatrixView, MatrixViewMut};
use distla_kernels::Scalar;
use std::sync::Arc;

/// Where a window of a distributed matrix sits in this process's local piece.
pub(crate) struct Window {
    pub layout: Layout,
    pub local_row: usize,
    pub local_col: usize,
    pub local_height: usize,
    pub local_width: usize,
}

impl Window {
    pub(crate) fn new(grid: &Grid, layout: &Layout, i0: usize, j0: usize, h: usize, w: usize) -> Result<Self> {
        layout.check_window(i0, j0, h, w)?;
        let shape = grid.shape();
        let me = grid.position();
        let col = layout.col_ownership(&shape, me);
        let row = layout.row_ownership(&shape, me);
        let local_row = col.len(i0);
        let local_col = row.len(j0);
        Ok(Self {
            layout: layout.window(&shape, i0, j0, h, w),
            local_row,
            local_col,
            local_height: col.len(i0 + h) - local_row,
            local_width: row.len(j0 + w) - local_col,
        })
    }
}

/// Shared accessors of [`DistMatrix`](super::DistMatrix), [`DistView`] and [`DistViewMut`]:
/// everything derived from the grid and the layout.
macro_rules! layout_accessors {
    () => {
        pub fn grid(&self) -> &Arc<Grid> {
            &self.grid
        }

        pub fn layout(&self) -> &Layout {
            &self.layout
        }

        pub fn dist(&self) -> DistPair {
            self.layout.dist
        }

        pub fn height(&self) -> usize {
            self.layout.height
        }

        pub fn width(&self) -> usize {
            self.layout.width
        }

        pub fn col_align(&self) -> usize {
            self.layout.col_align
        }

        pub fn row_align(&self) -> usize {
            self.layout.row_align
        }

        pub fn root(&self) -> usize {
            self.layout.root
        }

        pub fn col_stride(&self) -> usize {
            self.layout.col_stride(&self.grid.shape())
        }

        pub fn row_stride(&self) -> usize {
            self.layout.row_stride(&self.grid.shape())
        }

        /// Which global rows this process holds.
        pub fn col_ownership(&self) -> Ownership {
            self.layout.col_ownership(&self.grid.shape(), self.grid.position())
        }

        /// Which global columns this process holds.
        pub fn row_ownership(&self) -> Ownership {
            self.layout.row_ownership(&self.grid.shape(), self.grid.position())
        }

        /// First global row held here, relative to the stride.
        pub fn col_shift(&self) -> usize {
            match self.col_ownership() {
                Ownership::Cyclic { shift, .. } => shift,
                _ => 0,
            }
        }

        pub fn row_shift(&self) -> usize {
            match self.row_ownership() {
                Ownership::Cyclic { shift, .. } => shift,
                _ => 0,
            }
        }

        pub fn ldim(&self) -> usize {
            self.local.ldim()
        }

        pub fn local_height(&self) -> usize {
            self.local.height()
        }

        pub fn local_width(&self) -> usize {
            self.local.width()
        }

        pub fn global_row(&self, local_row: usize) -> usize {
            self.col_ownership().global_index(local_row)
        }

        pub fn global_col(&self, local_col: usize) -> usize {
            self.row_ownership().global_index(local_col)
        }

        pub fn is_local(&self, i: usize, j: usize) -> bool {
            self.local_position(i, j).is_some()
        }

        /// Local `(row, col)` of global entry `(i, j)` if this process holds it.
        pub fn local_position(&self, i: usize, j: usize) -> Option<(usize, usize)> {
            let col = self.col_ownership();
            let row = self.row_ownership();
            (i < self.height() && j < self.width() && col.holds(i) && row.holds(j))
                .then(|| (col.local_index(i), row.local_index(j)))
        }

        pub fn get_local(&self, local_row: usize, local_col: usize) -> T {
            self.local.get(local_row, local_col)
        }
    };
}

pub(crate) use layout_accessors;

/// A read-only window of a distributed matrix.
///
/// Views carry their own [`Layout`] (with alignments shifted to the window's
/// origin) and borrow the matching part of the owner's local buffer, so every
/// algorithm that takes a view works on submatrices without copying.
pub struct DistView<'a, T> {
    pub(crate) grid: &'a Arc<Grid>,
    pub(crate) layout: Layout,
    pub(crate) local: MatrixView<'a, T>,
}

impl<T: Copy> Clone for DistView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Copy> Copy for DistView<'_, T> {}

impl<'a, T: Scalar> DistView<'a, T> {
    layout_accessors!();

    pub fn local(&self) -> MatrixView<'a, T> {
        self.local
    }

    /// The `h x w` window starting at `(i0, j0)`, relative to this view.
    pub fn view(&self, i0: usize, j0: usize, h: usize, w: usize) -> Result<DistView<'a, T>> {
        let window = Window::new(self.grid, &self.layout, i0, j0, h, w)?;
        let local = self.local.sub(
            window.local_row,
            window.local_col,
            window.local_height,
            window.local_width,
        )?;
        Ok(DistView {
            grid: self.grid,
            layout: window.layout,
            local,
        })
    }

    /// Reads entry `(i, j)` on every process.
    ///
    /// Collective over the communicator of the entry's holders: every
    /// process of the grid must call it with the same indices.
    pub fn get(&self, i: usize, j: usize) -> Result<T> {
        self.layout.check_index(i, j)?;
        let scope = self.layout.dist.owner_scope();
        let Some(comm) = self.grid.comm(scope) else {
            return Ok(self.local.get(i, j));
        };
        let shape = self.grid.shape();
        let owner = self.layout.owner_position(&shape, self.grid.position(), i, j);
        let root = shape.scope_index(scope, owner);
        let mut value = match self.local_position(i, j) {
            Some((il, jl)) if comm.rank() == root => vec![self.local.get(il, jl)],
            _ => Vec::new(),
        };
        comm.broadcast(root, &mut value)?;
        value
            .first()
            .copied()
            .ok_or_else(|| DistError::Communication("broadcast delivered no value".to_string()))
    }

    /// Gathers the whole matrix onto every process.
    ///
    /// One all-gather over the owner communicator: each member contributes
    /// its local piece column-major, and every process places the blocks by
    /// evaluating the layout at the member's position.
    pub fn to_global(&self) -> Result<Matrix<T>> {
        let (height, width) = (self.height(), self.width());
        let scope = self.layout.dist.owner_scope();
        let Some(comm) = self.grid.comm(scope) else {
            return Matrix::from_fn(height, width, |i, j| self.local.get(i, j));
        };

        let mut packed = Vec::with_capacity(self.local.height() * self.local.width());
        for jl in 0..self.local.width() {
            for il in 0..self.local.height() {
                packed.push(self.local.get(il, jl));
            }
        }
        let blocks = comm.all_gather(&packed)?;

        let shape = self.grid.shape();
        let mut global = Matrix::zeros(height, width)?;
        for (pos, block) in shape.scope_positions(scope, self.grid.position()).into_iter().zip(blocks) {
            let rows: Vec<usize> = self.layout.col_ownership(&shape, pos).indices(height).collect();
            let cols: Vec<usize> = self.layout.row_ownership(&shape, pos).indices(width).collect();
            if block.len() != rows.len() * cols.len() {
                return Err(DistError::Communication(format!(
                    "expected {} entries from {pos:?}, got {}",
                    rows.len() * cols.len(),
                    block.len()
                )));
            }
            let mut values = block.into_iter();
            for &j in &cols {
                for &i in &rows {
                    if let Some(value) = values.next() {
                        global.set(i, j, value);
                    }
                }
            }
        }
        Ok(global)
    }
}

/// A mutable window of a distributed matrix.
pub struct DistViewMut<'a, T> {
    pub(crate) grid: &'a Arc<Grid>,
    pub(crate) layout: Layout,
    pub(crate) local: MatrixViewMut<'a, T>,
}

impl<'a, T: Scalar> DistViewMut<'a, T> {
    layout_accessors!();

    pub fn local(&self) -> MatrixView<'_, T> {
        self.local.as_view()
    }

    pub fn local_mut(&mut self) -> &mut MatrixViewMut<'a, T> {
        &mut self.local
    }

    pub fn set_local(&mut self, local_row: usize, local_col: usize, value: T) {
        self.local.set(local_row, local_col, value);
    }

    pub fn update_local(&mut self, local_row: usize, local_col: usize, value: T) {
        self.local.update(local_row, local_col, value);
    }

    pub fn as_view(&self) -> DistView<'_, T> {
        DistView {
            grid: self.grid,
            layout: self.layout,
            local: self.local.as_view(),
        }
    }

    /// Reborrows the `h x w` window starting at `(i0, j0)`.
    pub fn view_mut(&mut self, i0: usize, j0: usize, h: usize, w: usize) -> Result<DistViewMut<'_, T>> {
        let window = Window::new(self.grid, &self.layout, i0, j0, h, w)?;
        let local = self.local.sub_mut(
            window.local_row,
            window.local_col,
            window.local_height,
            window.local_width,
        )?;
        Ok(DistViewMut {
            grid: self.grid,
            layout: window.layout,
            local,
        })
    }

    /// Writes `value` at `(i, j)` where it is held. No communication.
    pub fn set(&mut self, i: usize, j: usize, value: T) -> Result<()> {
        self.layout.check_index(i, j)?;
        if let Some((il, jl)) = self.local_position(i, j) {
            self.local.set(il, jl, value);
        }
        Ok(())
    }
}
