use super::{Dist, DistPair};
use crate::error::{DistError, Result};
use crate::grid::{GridShape, Position};

/// Number of indices `i < n` with `i ≡ shift (mod stride)`.
pub fn local_length(n: usize, shift: usize, stride: usize) -> usize {
    if n > shift {
        (n - shift - 1) / stride + 1
    } else {
        0
    }
}

/// Which global indices of one matrix dimension a process holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Every index (a `*` dimension, or the root of `[o,o]`).
    All,
    /// No index (a non-root process of `[o,o]`).
    Nothing,
    /// Indices `shift, shift + stride, shift + 2 * stride, ...`.
    Cyclic { shift: usize, stride: usize },
}

impl Ownership {
    pub fn holds(self, i: usize) -> bool {
        match self {
            Ownership::All => true,
            Ownership::Nothing => false,
            Ownership::Cyclic { shift, stride } => i >= shift && (i - shift) % stride == 0,
        }
    }

    /// How many of the indices `0..n` are held.
    pub fn len(self, n: usize) -> usize {
        match self {
            Ownership::All => n,
            Ownership::Nothing => 0,
            Ownership::Cyclic { shift, stride } => local_length(n, shift, stride),
        }
    }

    /// Local position of global index `i`; `i` must be held.
    pub fn local_index(self, i: usize) -> usize {
        debug_assert!(self.holds(i));
        match self {
            Ownership::All | Ownership::Nothing => i,
            Ownership::Cyclic { shift, stride } => (i - shift) / stride,
        }
    }

    pub fn global_index(self, local: usize) -> usize {
        match self {
            Ownership::All | Ownership::Nothing => local,
            Ownership::Cyclic { shift, stride } => shift + local * stride,
        }
    }

    /// Held indices in `0..n`, ascending.
    pub fn indices(self, n: usize) -> impl Iterator<Item = usize> {
        (0..self.len(n)).map(move |local| self.global_index(local))
    }

    /// Indices in `0..n` held under both `self` and `other`, ascending.
    pub fn common_indices(self, other: Ownership, n: usize) -> Vec<usize> {
        // Walk the sparser of the two and test membership in the other.
        let (walk, test) = if self.len(n) <= other.len(n) {
            (self, other)
        } else {
            (other, self)
        };
        walk.indices(n).filter(|&i| test.holds(i)).collect()
    }
}

/// Everything needed to say which process holds which entry of a matrix.
///
/// A `Layout` is pure metadata: global shape, distribution and alignments. It
/// is shared by [`DistMatrix`](crate::DistMatrix) and its views and can be
/// evaluated for any grid position, which is how redistributions work out what
/// every peer holds without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub dist: DistPair,
    pub height: usize,
    pub width: usize,
    /// Alignment of the column distribution (rows of the matrix).
    pub col_align: usize,
    /// Alignment of the row distribution (columns of the matrix).
    pub row_align: usize,
    /// VC rank of the root process of `[o,o]`.
    pub root: usize,
}

impl Layout {
    pub fn new(dist: DistPair, height: usize, width: usize) -> Self {
        Self {
            dist,
            height,
            width,
            col_align: 0,
            row_align: 0,
            root: 0,
        }
    }

    pub fn col_stride(&self, shape: &GridShape) -> usize {
        self.dist.col().stride(shape)
    }

    pub fn row_stride(&self, shape: &GridShape) -> usize {
        self.dist.row().stride(shape)
    }

    pub fn col_ownership(&self, shape: &GridShape, pos: Position) -> Ownership {
        self.dim_ownership(self.dist.col(), self.col_align, shape, pos)
    }

    pub fn row_ownership(&self, shape: &GridShape, pos: Position) -> Ownership {
        self.dim_ownership(self.dist.row(), self.row_align, shape, pos)
    }

    /// Local `(height, width)` of the process at `pos`.
    pub fn local_dims(&self, shape: &GridShape, pos: Position) -> (usize, usize) {
        (
            self.col_ownership(shape, pos).len(self.height),
            self.row_ownership(shape, pos).len(self.width),
        )
    }

    pub fn holds(&self, shape: &GridShape, pos: Position, i: usize, j: usize) -> bool {
        self.col_ownership(shape, pos).holds(i) && self.row_ownership(shape, pos).holds(j)
    }

    fn dim_ownership(&self, dist: Dist, align: usize, shape: &GridShape, pos: Position) -> Ownership {
        let index = match dist {
            Dist::Star => return Ownership::All,
            Dist::Circ => {
                return if shape.vc_rank(pos) == self.root {
                    Ownership::All
                } else {
                    Ownership::Nothing
                };
            }
            Dist::MC => pos.row,
            Dist::MR => pos.col,
            Dist::VC => shape.vc_rank(pos),
            Dist::VR => shape.vr_rank(pos),
        };
        let stride = dist.stride(shape);
        Ownership::Cyclic {
            shift: (index + stride - align % stride) % stride,
            stride,
        }
    }

    /// A position that holds entry `(i, j)`.
    ///
    /// For `*` dimensions `me`'s coordinate is kept, so the result is the
    /// holder that shares `me`'s communicator along the other dimension.
    pub fn owner_position(&self, shape: &GridShape, me: Position, i: usize, j: usize) -> Position {
        let mut pos = me;
        for (dist, align, index) in [
            (self.dist.col(), self.col_align, i),
            (self.dist.row(), self.row_align, j),
        ] {
            let stride = dist.stride(shape);
            match dist {
                Dist::MC => pos.row = (index + align) % stride,
                Dist::MR => pos.col = (index + align) % stride,
                Dist::VC => pos = shape.position_of_vc((index + align) % stride),
                Dist::VR => pos = shape.position_of_vr((index + align) % stride),
                Dist::Circ => pos = shape.position_of_vc(self.root),
                Dist::Star => {}
            }
        }
        pos
    }

    /// The layout of the `h x w` window starting at `(i0, j0)`.
    ///
    /// The window's alignments are shifted so that ownership of its relative
    /// indices matches ownership of the parent's absolute ones.
    pub fn window(&self, shape: &GridShape, i0: usize, j0: usize, h: usize, w: usize) -> Layout {
        let shift = |dist: Dist, align: usize, offset: usize| {
            if dist.is_cyclic() {
                (align + offset) % dist.stride(shape)
            } else {
                0
            }
        };
        Layout {
            dist: self.dist,
            height: h,
            width: w,
            col_align: shift(self.dist.col(), self.col_align, i0),
            row_align: shift(self.dist.row(), self.row_align, j0),
            root: self.root,
        }
    }

    /// Checks that the window `(i0, j0, h, w)` fits inside this layout.
    pub fn check_window(&self, i0: usize, j0: usize, h: usize, w: usize) -> Result<()> {
        if i0 + h > self.height || j0 + w > self.width {
            return Err(DistError::IndexOutOfBounds {
                row: i0 + h,
                col: j0 + w,
                height: self.height,
                width: self.width,
            });
        }
        Ok(())
    }

    pub fn check_index(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.height || j >= self.width {
            return Err(DistError::IndexOutOfBounds {
                row: i,
                col: j,
                height: self.height,
                width: self.width,
            });
        }
        Ok(())
    }

    /// Alignments must be smaller than the stride they align, and the root
    /// must be a process of the grid.
    pub fn validate(&self, shape: &GridShape) -> Result<()> {
        let col_ok = !self.dist.col().is_cyclic() || self.col_align < self.col_stride(shape);
        let row_ok = !self.dist.row().is_cyclic() || self.row_align < self.row_stride(shape);
        if !(col_ok && row_ok) {
            return Err(DistError::Configuration(format!(
                "alignments ({}, {}) out of range for {} on a {}x{} grid",
                self.col_align,
                self.row_align,
                self.dist,
                shape.height(),
                shape.width()
            )));
        }
        if self.root >= shape.size() {
            return Err(DistError::Configuration(format!(
                "root {} is not a process of a {}-process grid",
                self.root,
                shape.size()
            )));
        }
        Ok(())
    }

    /// Same distribution and alignments, so local pieces correspond one to one.
    pub fn same_alignment(&self, other: &Layout) -> bool {
        self.dist == other.dist
            && self.col_align == other.col_align
            && self.row_align == other.row_align
            && (self.dist != DistPair::CIRC_CIRC || self.root == other.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridOrder;
    use proptest::prelude::*;

    fn shape(r: usize, c: usize) -> GridShape {
        GridShape::new(r, c, GridOrder::ColumnMajor).unwrap()
    }

    #[test]
    fn test_local_length() {
        assert_eq!(local_length(7, 0, 2), 4);
        assert_eq!(local_length(7, 1, 2), 3);
        assert_eq!(local_length(2, 3, 4), 0);
        assert_eq!(local_length(0, 0, 1), 0);
    }

    #[test]
    fn test_mc_mr_ownership_with_alignment() {
        let shape = shape(2, 3);
        let mut layout = Layout::new(DistPair::MC_MR, 5, 7);
        layout.col_align = 1;
        layout.row_align = 2;
        // Row 0 of the matrix lives on grid row 1; column 0 on grid column 2.
        let pos = Position { row: 1, col: 2 };
        assert!(layout.holds(&shape, pos, 0, 0));
        assert_eq!(layout.local_dims(&shape, pos), (3, 3));
        assert_eq!(
            layout.owner_position(&shape, Position { row: 0, col: 0 }, 4, 5),
            Position { row: 1, col: 1 }
        );
    }

    #[test]
    fn test_circ_only_on_root() {
        let shape = shape(2, 2);
        let mut layout = Layout::new(DistPair::CIRC_CIRC, 3, 3);
        layout.root = 2;
        assert_eq!(layout.local_dims(&shape, shape.position_of_vc(2)), (3, 3));
        assert_eq!(layout.local_dims(&shape, shape.position_of_vc(1)), (0, 0));
    }

    #[test]
    fn test_validate_alignment_range() {
        let shape = shape(2, 3);
        let mut layout = Layout::new(DistPair::STAR_MR, 4, 4);
        layout.row_align = 3;
        assert!(layout.validate(&shape).is_err());
        layout.row_align = 2;
        assert!(layout.validate(&shape).is_ok());
    }

    proptest! {
        #[test]
        fn prop_every_entry_has_exactly_the_expected_holders(
            r in 1usize..4,
            c in 1usize..4,
            n in 0usize..12,
            pair in 0usize..12,
            col_align in 0usize..16,
            row_align in 0usize..16,
        ) {
            let shape = shape(r, c);
            let dist = DistPair::ALL[pair];
            let mut layout = Layout::new(dist, n, n);
            layout.col_align = col_align % layout.col_stride(&shape);
            layout.row_align = row_align % layout.row_stride(&shape);
            layout.root = (col_align + row_align) % shape.size();

            let positions: Vec<Position> = (0..shape.size()).map(|vc| shape.position_of_vc(vc)).collect();
            for i in 0..n {
                for j in 0..n {
                    let holders = positions.iter().filter(|&&pos| layout.holds(&shape, pos, i, j)).count();
                    if dist == DistPair::CIRC_CIRC {
                        prop_assert_eq!(holders, 1);
                    } else {
                        prop_assert_eq!(holders, dist.volume(&shape));
                    }
                    let owner = layout.owner_position(&shape, positions[0], i, j);
                    prop_assert!(layout.holds(&shape, owner, i, j));
                }
            }
            // Local dims add up to the global size times the replication factor.
            let total: usize = positions.iter().map(|&pos| {
                let (h, w) = layout.local_dims(&shape, pos);
                h * w
            }).sum();
            if dist != DistPair::CIRC_CIRC {
                prop_assert_eq!(total, n * n * dist.volume(&shape));
            }
        }

        #[test]
        fn prop_window_ownership_matches_parent(
            n in 1usize..20,
            i0 in 0usize..20,
            stride_pick in 0usize..3,
            align in 0usize..6,
        ) {
            let shape = shape(2, 3);
            let dist = [DistPair::MC_MR, DistPair::VC_STAR, DistPair::STAR_VR][stride_pick];
            let mut layout = Layout::new(dist, n, n);
            layout.col_align = align % layout.col_stride(&shape);
            layout.row_align = align % layout.row_stride(&shape);
            let i0 = i0 % n;
            let window = layout.window(&shape, i0, i0, n - i0, n - i0);
            for vc in 0..shape.size() {
                let pos = shape.position_of_vc(vc);
                for k in 0..n - i0 {
                    prop_assert_eq!(
                        window.holds(&shape, pos, k, k),
                        layout.holds(&shape, pos, i0 + k, i0 + k)
                    );
                }
            }
        }
    }
}
