//! # Process Grid
//!
//! `p` processes are arranged as an `r x c` grid. Each process has a position
//! `(row, col)` and belongs to a handful of communicators derived from it:
//!
//! | comm | members                          | member index of `(row, col)` |
//! |------|----------------------------------|------------------------------|
//! | `mc` | the processes in my grid column  | `row`                        |
//! | `mr` | the processes in my grid row     | `col`                        |
//! | `vc` | everyone, column-major           | `row + col * r`              |
//! | `vr` | everyone, row-major              | `col + row * c`              |
//! | `md` | my diagonal `(k mod r, (d + k) mod c)` | `k`                    |
//!
//! The pure coordinate arithmetic lives on [`GridShape`], which has no
//! communicators and is what layouts compute ownership with.

use crate::distributed::Comm;
use crate::error::{DistError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// How world ranks are laid onto grid positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridOrder {
    /// World rank `w` sits at `(w mod r, w / r)`, so world order is VC order.
    #[default]
    ColumnMajor,
    /// World rank `w` sits at `(w / c, w mod c)`, so world order is VR order.
    RowMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

/// The member sets a redistribution or reduction can run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Purely local; no communication.
    SelfOnly,
    /// My grid column.
    Mc,
    /// My grid row.
    Mr,
    /// Everyone, in VC order.
    Vc,
    /// Everyone, in VR order.
    Vr,
}

/// Grid dimensions and rank ordering, without any communicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    height: usize,
    width: usize,
    order: GridOrder,
}

impl GridShape {
    pub fn new(height: usize, width: usize, order: GridOrder) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(DistError::Configuration(format!(
                "grid dimensions must be positive, got {height}x{width}"
            )));
        }
        Ok(Self {
            height,
            width,
            order,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn size(&self) -> usize {
        self.height * self.width
    }

    pub fn order(&self) -> GridOrder {
        self.order
    }

    pub fn position_of_world(&self, world_rank: usize) -> Position {
        match self.order {
            GridOrder::ColumnMajor => self.position_of_vc(world_rank),
            GridOrder::RowMajor => self.position_of_vr(world_rank),
        }
    }

    pub fn world_rank_of(&self, pos: Position) -> usize {
        match self.order {
            GridOrder::ColumnMajor => self.vc_rank(pos),
            GridOrder::RowMajor => self.vr_rank(pos),
        }
    }

    pub fn vc_rank(&self, pos: Position) -> usize {
        pos.row + pos.col * self.height
    }

    pub fn vr_rank(&self, pos: Position) -> usize {
        pos.col + pos.row * self.width
    }

    pub fn position_of_vc(&self, vc: usize) -> Position {
        Position {
            row: vc % self.height,
            col: vc / self.height,
        }
    }

    pub fn position_of_vr(&self, vr: usize) -> Position {
        Position {
            row: vr / self.width,
            col: vr % self.width,
        }
    }

    /// Number of distinct process diagonals, `gcd(r, c)`.
    pub fn diag_count(&self) -> usize {
        gcd(self.height, self.width)
    }

    /// Length of one process diagonal, `lcm(r, c)`.
    pub fn diag_length(&self) -> usize {
        self.size() / self.diag_count()
    }

    /// The diagonal through `pos`, in `0..gcd(r, c)`.
    pub fn diag_path(&self, pos: Position) -> usize {
        (pos.col + self.width - pos.row % self.width) % self.width % self.diag_count()
    }

    /// Positions `(k mod r, (path + k) mod c)` for `k` in `0..lcm(r, c)`.
    pub fn diag_members(&self, path: usize) -> Vec<Position> {
        (0..self.diag_length())
            .map(|k| Position {
                row: k % self.height,
                col: (path + k) % self.width,
            })
            .collect()
    }

    /// Member positions of `scope` as seen from `me`, in member order.
    pub fn scope_positions(&self, scope: Scope, me: Position) -> Vec<Position> {
        match scope {
            Scope::SelfOnly => vec![me],
            Scope::Mc => (0..self.height)
                .map(|row| Position { row, col: me.col })
                .collect(),
            Scope::Mr => (0..self.width)
                .map(|col| Position { row: me.row, col })
                .collect(),
            Scope::Vc => (0..self.size()).map(|vc| self.position_of_vc(vc)).collect(),
            Scope::Vr => (0..self.size()).map(|vr| self.position_of_vr(vr)).collect(),
        }
    }

    /// Whether `pos` is a member of `me`'s communicator for `scope`.
    pub fn in_scope(&self, scope: Scope, me: Position, pos: Position) -> bool {
        match scope {
            Scope::SelfOnly => pos == me,
            Scope::Mc => pos.col == me.col,
            Scope::Mr => pos.row == me.row,
            Scope::Vc | Scope::Vr => true,
        }
    }

    /// Member index of `pos` within `scope`.
    pub fn scope_index(&self, scope: Scope, pos: Position) -> usize {
        match scope {
            Scope::SelfOnly => 0,
            Scope::Mc => pos.row,
            Scope::Mr => pos.col,
            Scope::Vc => self.vc_rank(pos),
            Scope::Vr => self.vr_rank(pos),
        }
    }

    /// Grid height chosen when none is given: the smallest divisor of `p`
    /// that is at least `floor(sqrt(p))`.
    pub fn default_height(p: usize) -> usize {
        let mut height = ((p as f64).sqrt() as usize).max(1);
        while p % height != 0 {
            height += 1;
        }
        height
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// A process grid: its shape, this process's position, and the
/// communicators derived from it.
///
/// Grids are shared through `Arc`; every [`DistMatrix`](crate::DistMatrix)
/// holds one and operations on two matrices require the same grid.
#[derive(Debug)]
pub struct Grid {
    shape: GridShape,
    position: Position,
    world: Comm,
    mc: Comm,
    mr: Comm,
    vc: Comm,
    vr: Comm,
    md: Comm,
}

impl Grid {
    /// Builds a column-major grid over every rank of `world` with the
    /// default height.
    pub fn new(world: &Comm) -> Result<Arc<Grid>> {
        let p = world.size();
        let height = GridShape::default_height(p);
        Self::with_dims(world, height, p / height, GridOrder::ColumnMajor)
    }

    /// Builds an explicit `height x width` grid; `height * width` must equal
    /// the number of ranks in `world`.
    ///
    /// Every rank must call this collectively and in the same order relative
    /// to other communicator derivations.
    pub fn with_dims(
        world: &Comm,
        height: usize,
        width: usize,
        order: GridOrder,
    ) -> Result<Arc<Grid>> {
        let shape = GridShape::new(height, width, order)?;
        if shape.size() != world.size() {
            return Err(DistError::Configuration(format!(
                "a {height}x{width} grid needs {} processes, the world has {}",
                shape.size(),
                world.size()
            )));
        }

        let position = shape.position_of_world(world.rank());
        // `world` may itself be a sub-communicator, so grid ranks are member
        // indices of it and have to be mapped back to world ranks.
        let members: Vec<usize> = (0..world.size())
            .filter_map(|member| world.world_rank_of(member))
            .collect();
        let world_ranks = |positions: Vec<Position>| -> Vec<usize> {
            positions
                .into_iter()
                .map(|pos| members[shape.world_rank_of(pos)])
                .collect()
        };

        let owned_world = world.subset(members.clone())?;
        let mc = world.subset(world_ranks(shape.scope_positions(Scope::Mc, position)))?;
        let mr = world.subset(world_ranks(shape.scope_positions(Scope::Mr, position)))?;
        let vc = world.subset(world_ranks(shape.scope_positions(Scope::Vc, position)))?;
        let vr = world.subset(world_ranks(shape.scope_positions(Scope::Vr, position)))?;
        let md = world.subset(world_ranks(
            shape.diag_members(shape.diag_path(position)),
        ))?;

        debug!(
            rank = world.rank(),
            height,
            width,
            row = position.row,
            col = position.col,
            "grid constructed"
        );

        Ok(Arc::new(Grid {
            shape,
            position,
            world: owned_world,
            mc,
            mr,
            vc,
            vr,
            md,
        }))
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn row(&self) -> usize {
        self.position.row
    }

    pub fn col(&self) -> usize {
        self.position.col
    }

    pub fn vc_rank(&self) -> usize {
        self.shape.vc_rank(self.position)
    }

    pub fn vr_rank(&self) -> usize {
        self.shape.vr_rank(self.position)
    }

    /// The process diagonal this process lies on.
    pub fn diag_path(&self) -> usize {
        self.shape.diag_path(self.position)
    }

    /// Index along my diagonal, which is also my rank in [`Grid::md_comm`].
    pub fn diag_rank(&self) -> usize {
        self.md.rank()
    }

    pub fn world_comm(&self) -> &Comm {
        &self.world
    }

    pub fn mc_comm(&self) -> &Comm {
        &self.mc
    }

    pub fn mr_comm(&self) -> &Comm {
        &self.mr
    }

    pub fn vc_comm(&self) -> &Comm {
        &self.vc
    }

    pub fn vr_comm(&self) -> &Comm {
        &self.vr
    }

    pub fn md_comm(&self) -> &Comm {
        &self.md
    }

    /// The communicator behind `scope`, or `None` for [`Scope::SelfOnly`].
    pub fn comm(&self, scope: Scope) -> Option<&Comm> {
        match scope {
            Scope::SelfOnly => None,
            Scope::Mc => Some(&self.mc),
            Scope::Mr => Some(&self.mr),
            Scope::Vc => Some(&self.vc),
            Scope::Vr => Some(&self.vr),
        }
    }

    pub fn scope_positions(&self, scope: Scope) -> Vec<Position> {
        self.shape.scope_positions(scope, self.position)
    }

    pub fn scope_rank(&self, scope: Scope) -> usize {
        self.shape.scope_index(scope, self.position)
    }

    pub fn config(&self) -> &crate::config::Config {
        self.world.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::Universe;

    #[test]
    fn test_default_height() {
        assert_eq!(GridShape::default_height(1), 1);
        assert_eq!(GridShape::default_height(4), 2);
        assert_eq!(GridShape::default_height(6), 2);
        assert_eq!(GridShape::default_height(7), 7);
        assert_eq!(GridShape::default_height(8), 2);
        assert_eq!(GridShape::default_height(12), 3);
    }

    #[test]
    fn test_shapes_hash_by_order() {
        let shapes: std::collections::HashSet<GridShape> = [
            GridShape::new(2, 3, GridOrder::ColumnMajor).unwrap(),
            GridShape::new(2, 3, GridOrder::RowMajor).unwrap(),
            GridShape::new(2, 3, GridOrder::ColumnMajor).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(shapes.len(), 2);
    }

    #[test]
    fn test_vc_vr_round_trip() {
        let shape = GridShape::new(2, 3, GridOrder::ColumnMajor).unwrap();
        for vc in 0..6 {
            assert_eq!(shape.vc_rank(shape.position_of_vc(vc)), vc);
            assert_eq!(shape.vr_rank(shape.position_of_vr(vc)), vc);
        }
        let pos = Position { row: 1, col: 2 };
        assert_eq!(shape.vc_rank(pos), 5);
        assert_eq!(shape.vr_rank(pos), 5);
        assert_eq!(shape.vc_rank(Position { row: 1, col: 0 }), 1);
        assert_eq!(shape.vr_rank(Position { row: 1, col: 0 }), 3);
    }

    #[test]
    fn test_diagonals_partition_grid() {
        let shape = GridShape::new(2, 4, GridOrder::ColumnMajor).unwrap();
        assert_eq!(shape.diag_count(), 2);
        assert_eq!(shape.diag_length(), 4);
        let mut seen = Vec::new();
        for path in 0..shape.diag_count() {
            for pos in shape.diag_members(path) {
                assert_eq!(shape.diag_path(pos), path);
                seen.push(pos);
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_rejects_mismatched_dims() {
        let err = Universe::new(6).run(|world| Grid::with_dims(&world, 4, 2, GridOrder::ColumnMajor).map(|_| ()));
        assert!(matches!(err, Err(DistError::Configuration(_))));
    }

    #[test]
    fn test_comm_membership() {
        let positions = Universe::new(6)
            .run(|world| {
                let grid = Grid::new(&world)?;
                assert_eq!((grid.height(), grid.width()), (2, 3));
                assert_eq!(grid.mc_comm().size(), 2);
                assert_eq!(grid.mr_comm().size(), 3);
                assert_eq!(grid.mc_comm().rank(), grid.row());
                assert_eq!(grid.mr_comm().rank(), grid.col());
                assert_eq!(grid.vc_comm().rank(), grid.vc_rank());
                assert_eq!(grid.vr_comm().rank(), grid.vr_rank());
                assert_eq!(grid.md_comm().size(), 6);
                assert_eq!(grid.diag_rank() % 2, grid.row());
                assert_eq!(grid.diag_rank() % 3, grid.col());

                // Column sums over mc only see the two processes of my column.
                let mut col_sum = vec![world.rank()];
                grid.mc_comm().all_reduce_sum(&mut col_sum)?;
                Ok((grid.position(), col_sum[0]))
            })
            .unwrap();
        for (rank, (pos, col_sum)) in positions.into_iter().enumerate() {
            assert_eq!(pos, Position { row: rank % 2, col: rank / 2 });
            assert_eq!(col_sum, 4 * pos.col + 1);
        }
    }

    #[test]
    fn test_row_major_order() {
        let positions = Universe::new(6)
            .run(|world| {
                let grid = Grid::with_dims(&world, 2, 3, GridOrder::RowMajor)?;
                Ok(grid.position())
            })
            .unwrap();
        assert_eq!(positions[4], Position { row: 1, col: 1 });
        assert_eq!(positions[2], Position { row: 0, col: 2 });
    }
}
