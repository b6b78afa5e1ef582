//! # Redistribution
//!
//! [`redistribute`] copies a distributed view into a distributed matrix of
//! the same global shape and any distribution. It is a pure relayout: every
//! value arrives bit-for-bit, and redistributing twice gives the same result
//! as doing it once.
//!
//! # How It Works
//!
//! 1. [`route`] plans a chain of hops. Each hop changes the distribution in
//!    one step that only needs a single communicator: a grid column, a grid
//!    row, the whole grid, or none at all.
//! 2. Every intermediate gets alignments compatible with its neighbours, so
//!    a hop within one grid axis always finds the data it needs inside that
//!    axis.
//! 3. Each hop runs one sparse exchange (see [`exchange`]) in which only
//!    non-empty messages are sent.
//!
//! Routes and alignments depend only on global metadata, so every process
//! runs exactly the same sequence of collectives.
//!
//! > [!NOTE]
//! > A destination with pinned alignments that the last hop cannot produce
//! > directly gets one extra realignment over its owner communicator.

mod exchange;
mod route;

pub use route::{route, Hop, Pattern};

use crate::dist::{compatible_alignment, Dist, Layout};
use crate::dist_matrix::{DistMatrix, DistView};
use crate::error::{DistError, Result};
use crate::grid::GridShape;
use distla_kernels::Scalar;
use std::sync::Arc;
use tracing::{debug, trace};

/// Overwrites `dst` with the contents of `src`.
///
/// Free alignments of `dst` are adopted from `src` where the distributions
/// are related; pinned ones are honoured.
///
/// # Errors
///
/// Both checked before any communication:
/// - `DistError::UnsupportedRedistribution` if the operands live on
///   different grids.
/// - `DistError::ShapeMismatch` if the global dimensions differ.
pub fn redistribute<T: Scalar>(src: &DistView<'_, T>, dst: &mut DistMatrix<T>) -> Result<()> {
    if !Arc::ptr_eq(src.grid(), dst.grid()) {
        return Err(DistError::UnsupportedRedistribution {
            src: src.dist(),
            dst: dst.dist(),
            reason: "operands live on different grids".to_string(),
        });
    }
    if (src.height(), src.width()) != (dst.height(), dst.width()) {
        return Err(DistError::ShapeMismatch {
            expected: (dst.height(), dst.width()),
            got: (src.height(), src.width()),
        });
    }

    let shape = src.grid().shape();
    let hops = route(src.dist(), dst.dist(), &shape)?;
    debug!(
        src = %src.dist(),
        dst = %dst.dist(),
        height = src.height(),
        width = src.width(),
        hops = hops.len(),
        "redistribute"
    );

    let Some((last, intermediate)) = hops.split_last() else {
        return same_distribution(src, dst);
    };

    let mut current: Option<DistMatrix<T>> = None;
    for (k, hop) in intermediate.iter().enumerate() {
        let from = current.as_ref().map_or(*src, DistMatrix::as_view);
        let layout = intermediate_layout(hop, from.layout(), dst.layout(), &shape);
        trace!(step = k, target = %hop.target, scope = ?hop.scope, pattern = ?hop.pattern, "hop");
        let mut next = DistMatrix::new(src.grid(), hop.target);
        next.set_layout(layout)?;
        exchange::exchange(hop.scope, &from, &mut next)?;
        current = Some(next);
    }

    let from = current.as_ref().map_or(*src, DistMatrix::as_view);
    trace!(step = intermediate.len(), target = %last.target, scope = ?last.scope, pattern = ?last.pattern, "hop");
    let (layout, staging) = final_layouts(last, from.layout(), dst, &shape);
    dst.set_layout(layout)?;
    match staging {
        None => exchange::exchange(last.scope, &from, dst),
        Some(staging) => {
            let mut temp = DistMatrix::new(src.grid(), last.target);
            temp.set_layout(staging)?;
            exchange::exchange(last.scope, &from, &mut temp)?;
            trace!(target = %last.target, pattern = ?Pattern::Realign, "hop");
            exchange::exchange(dst.dist().owner_scope(), &temp.as_view(), dst)
        }
    }
}

/// Same distribution on both sides: a local copy when the alignments agree,
/// otherwise a realignment over the owner communicator.
fn same_distribution<T: Scalar>(src: &DistView<'_, T>, dst: &mut DistMatrix<T>) -> Result<()> {
    let (col_free, row_free, root_free) = dst.is_free();
    let mut layout = *dst.layout();
    if col_free {
        layout.col_align = src.col_align();
    }
    if row_free {
        layout.row_align = src.row_align();
    }
    if root_free {
        layout.root = src.root();
    }
    dst.set_layout(layout)?;

    if dst.layout().same_alignment(src.layout()) {
        trace!(pattern = ?Pattern::LocalCopy, "hop");
        dst.local.view_mut().copy_from(&src.local());
        return Ok(());
    }
    trace!(pattern = ?Pattern::Realign, "hop");
    exchange::exchange(dst.dist().owner_scope(), src, dst)
}

/// Alignment of one cyclic dimension of an intermediate.
///
/// A hop within one grid axis must line up with its source; a global hop is
/// free to line up with the destination instead, which saves the next hop.
fn choose_alignment(dist: Dist, prev: &Layout, anchor: &Layout, hop: &Hop, shape: &GridShape) -> usize {
    if !dist.is_cyclic() {
        return 0;
    }
    let forward = compatible_alignment(dist, prev, shape);
    let backward = compatible_alignment(dist, anchor, shape);
    let choice = if hop.is_global() {
        backward.or(forward)
    } else {
        forward.or(backward)
    };
    choice.unwrap_or(0)
}

fn intermediate_layout(hop: &Hop, prev: &Layout, anchor: &Layout, shape: &GridShape) -> Layout {
    let mut layout = Layout::new(hop.target, prev.height, prev.width);
    layout.col_align = choose_alignment(hop.target.col(), prev, anchor, hop, shape);
    layout.row_align = choose_alignment(hop.target.row(), prev, anchor, hop, shape);
    layout.root = prev.root;
    layout
}

/// The destination layout after the last hop, and the layout of a staging
/// matrix if a pinned alignment cannot be reached by that hop directly.
fn final_layouts<T: Scalar>(
    last: &Hop,
    prev: &Layout,
    dst: &DistMatrix<T>,
    shape: &GridShape,
) -> (Layout, Option<Layout>) {
    let (col_free, row_free, _) = dst.is_free();
    let mut layout = *dst.layout();
    let mut staging = layout;
    let mut needs_staging = false;

    let dims = [
        (dst.dist().col(), col_free, &mut layout.col_align, &mut staging.col_align),
        (dst.dist().row(), row_free, &mut layout.row_align, &mut staging.row_align),
    ];
    for (dist, free, align, staged) in dims {
        if !dist.is_cyclic() {
            continue;
        }
        let Some(compatible) = compatible_alignment(dist, prev, shape) else {
            continue;
        };
        if free {
            *align = compatible;
            *staged = compatible;
        } else if !last.is_global() && compatible != *align {
            *staged = compatible;
            needs_staging = true;
        }
    }
    (layout, needs_staging.then_some(staging))
}
