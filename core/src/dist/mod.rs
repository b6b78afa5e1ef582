//! # Distributions
//!
//! A matrix distribution is a pair `[col_dist, row_dist]`: `col_dist` says how
//! the *rows* of the matrix (the entries down a column) are spread across the
//! grid, `row_dist` how the *columns* are spread. Each dimension is
//! distributed element-cyclically:
//!
//! | dist | global index `i` lives on              | stride  |
//! |------|----------------------------------------|---------|
//! | `MC` | grid row `(i + align) mod r`           | `r`     |
//! | `MR` | grid column `(i + align) mod c`        | `c`     |
//! | `VC` | VC rank `(i + align) mod p`            | `p`     |
//! | `VR` | VR rank `(i + align) mod p`            | `p`     |
//! | `*`  | every process                          | `1`     |
//! | `o`  | only the root process (as `[o,o]`)     | -       |
//!
//! Only twelve pairs are meaningful; [`DistPair::new`] rejects the rest.

mod layout;

pub use layout::{local_length, Layout, Ownership};

use crate::error::{DistError, Result};
use crate::grid::{GridShape, Scope};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dist {
    MC,
    MR,
    VC,
    VR,
    Star,
    Circ,
}

impl Dist {
    /// Entries of this dimension are split across processes element-cyclically.
    pub fn is_cyclic(self) -> bool {
        matches!(self, Dist::MC | Dist::MR | Dist::VC | Dist::VR)
    }

    pub fn stride(self, shape: &GridShape) -> usize {
        match self {
            Dist::MC => shape.height(),
            Dist::MR => shape.width(),
            Dist::VC | Dist::VR => shape.size(),
            Dist::Star | Dist::Circ => 1,
        }
    }

    /// The communicator this dimension is spread over, if any.
    pub fn axis_scope(self) -> Scope {
        match self {
            Dist::MC => Scope::Mc,
            Dist::MR => Scope::Mr,
            Dist::VC | Dist::Circ => Scope::Vc,
            Dist::VR => Scope::Vr,
            Dist::Star => Scope::SelfOnly,
        }
    }
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dist::MC => "MC",
            Dist::MR => "MR",
            Dist::VC => "VC",
            Dist::VR => "VR",
            Dist::Star => "*",
            Dist::Circ => "o",
        };
        f.write_str(name)
    }
}

/// A valid `[col_dist, row_dist]` combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistPair {
    col: Dist,
    row: Dist,
}

impl DistPair {
    pub const MC_MR: DistPair = DistPair::unchecked(Dist::MC, Dist::MR);
    pub const MR_MC: DistPair = DistPair::unchecked(Dist::MR, Dist::MC);
    pub const MC_STAR: DistPair = DistPair::unchecked(Dist::MC, Dist::Star);
    pub const STAR_MC: DistPair = DistPair::unchecked(Dist::Star, Dist::MC);
    pub const MR_STAR: DistPair = DistPair::unchecked(Dist::MR, Dist::Star);
    pub const STAR_MR: DistPair = DistPair::unchecked(Dist::Star, Dist::MR);
    pub const VC_STAR: DistPair = DistPair::unchecked(Dist::VC, Dist::Star);
    pub const STAR_VC: DistPair = DistPair::unchecked(Dist::Star, Dist::VC);
    pub const VR_STAR: DistPair = DistPair::unchecked(Dist::VR, Dist::Star);
    pub const STAR_VR: DistPair = DistPair::unchecked(Dist::Star, Dist::VR);
    pub const STAR_STAR: DistPair = DistPair::unchecked(Dist::Star, Dist::Star);
    pub const CIRC_CIRC: DistPair = DistPair::unchecked(Dist::Circ, Dist::Circ);

    pub const ALL: [DistPair; 12] = [
        DistPair::MC_MR,
        DistPair::MR_MC,
        DistPair::MC_STAR,
        DistPair::STAR_MR,
        DistPair::MR_STAR,
        DistPair::STAR_MC,
        DistPair::VC_STAR,
        DistPair::STAR_VC,
        DistPair::VR_STAR,
        DistPair::STAR_VR,
        DistPair::STAR_STAR,
        DistPair::CIRC_CIRC,
    ];

    const fn unchecked(col: Dist, row: Dist) -> Self {
        Self { col, row }
    }

    /// Validates a pair: `o` only pairs with itself, `VC`/`VR` only with `*`,
    /// and a grid axis may not distribute both dimensions.
    pub fn new(col: Dist, row: Dist) -> Result<Self> {
        let valid = match (col, row) {
            (Dist::Circ, Dist::Circ) => true,
            (Dist::Circ, _) | (_, Dist::Circ) => false,
            (Dist::VC | Dist::VR, other) | (other, Dist::VC | Dist::VR) => other == Dist::Star,
            (Dist::MC, Dist::MC) | (Dist::MR, Dist::MR) => false,
            _ => true,
        };
        if !valid {
            return Err(DistError::Configuration(format!(
                "[{col},{row}] is not a valid distribution"
            )));
        }
        Ok(Self { col, row })
    }

    pub fn col(self) -> Dist {
        self.col
    }

    pub fn row(self) -> Dist {
        self.row
    }

    /// The communicator over which the holders of any single entry are
    /// distinct. `Get` broadcasts over it and reductions combine over it.
    pub fn owner_scope(self) -> Scope {
        match (self.col, self.row) {
            (Dist::Star, Dist::Star) => Scope::SelfOnly,
            (Dist::MC, Dist::MR) | (Dist::MR, Dist::MC) => Scope::Vc,
            (Dist::VR, _) | (_, Dist::VR) => Scope::Vr,
            (Dist::MC, _) | (_, Dist::MC) => Scope::Mc,
            (Dist::MR, _) | (_, Dist::MR) => Scope::Mr,
            // VC and [o,o]
            _ => Scope::Vc,
        }
    }

    /// Relative size of each process's local piece, in units of `mn / p`.
    pub(crate) fn volume(self, shape: &GridShape) -> usize {
        match self {
            DistPair::CIRC_CIRC => shape.size(),
            _ => shape.size() / (self.col.stride(shape) * self.row.stride(shape)),
        }
    }
}

impl fmt::Display for DistPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.col, self.row)
    }
}

/// Alignment a dimension distributed by `target` should take so that it
/// lines up with `source`, if the two are related.
///
/// Same distribution copies the alignment; `MC`/`MR` derived from `VC`/`VR`
/// reduce it modulo the grid axis, and `VC`/`VR` derived from `MC`/`MR` keep it.
pub(crate) fn compatible_alignment(
    target: Dist,
    source: &Layout,
    shape: &GridShape,
) -> Option<usize> {
    let dims = [
        (source.dist.col(), source.col_align),
        (source.dist.row(), source.row_align),
    ];
    dims.into_iter().find_map(|(dist, align)| match (target, dist) {
        (t, s) if t == s && t.is_cyclic() => Some(align),
        (Dist::MC, Dist::VC) => Some(align % shape.height()),
        (Dist::MR, Dist::VR) => Some(align % shape.width()),
        (Dist::VC, Dist::MC) | (Dist::VR, Dist::MR) => Some(align),
        _ => None,
    })
}
