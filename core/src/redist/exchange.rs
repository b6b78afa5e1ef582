//! The one communication step every hop is made of.
//!
//! Given a source view and a destination matrix on the same grid, every
//! member of a communicator works out, from the two layouts alone, which of
//! its entries each other member needs and which entries it will receive from
//! whom. An entry the receiver already holds is copied locally; otherwise the
//! holder that shares the receiver's coordinate along every replicated
//! dimension sends it. Entries travel
//! column-major in global index order, so sender and receiver agree on the
//! packing without exchanging any indices.

use crate::dist::{DistPair, Layout, Ownership};
use crate::dist_matrix::{DistMatrix, DistView};
use crate::error::{DistError, Result};
use crate::grid::{GridShape, Position, Scope};
use distla_kernels::Scalar;
use tracing::trace;

struct Member {
    pos: Position,
    src_col: Ownership,
    src_row: Ownership,
    dst_col: Ownership,
    dst_row: Ownership,
}

impl Member {
    fn holds_src(&self, i: usize, j: usize) -> bool {
        self.src_col.holds(i) && self.src_row.holds(j)
    }
}

/// Position that supplies entry `(i, j)` to `receiver`: the receiver itself
/// when it holds the entry, otherwise the source owner nearest to it.
fn sender_of(src: &Layout, shape: &GridShape, receiver: &Member, i: usize, j: usize) -> Position {
    if receiver.holds_src(i, j) {
        receiver.pos
    } else {
        src.owner_position(shape, receiver.pos, i, j)
    }
}

/// Copies `src` into `dst` through the communicator of `scope`.
///
/// `dst` must already carry its final layout and have the same global
/// dimensions as `src`. Collective over the scope's communicator.
pub(crate) fn exchange<T: Scalar>(
    scope: Scope,
    src: &DistView<'_, T>,
    dst: &mut DistMatrix<T>,
) -> Result<()> {
    let grid = src.grid().clone();
    let shape = grid.shape();
    let me = shape.scope_index(scope, grid.position());
    let (height, width) = (src.height(), src.width());

    let members: Vec<Member> = shape
        .scope_positions(scope, grid.position())
        .into_iter()
        .map(|pos| Member {
            pos,
            src_col: src.layout().col_ownership(&shape, pos),
            src_row: src.layout().row_ownership(&shape, pos),
            dst_col: dst.layout().col_ownership(&shape, pos),
            dst_row: dst.layout().row_ownership(&shape, pos),
        })
        .collect();
    let mine = &members[me];
    let src_layout = src.layout();
    let src_local = src.local();

    // What I send: entries each receiver needs that I am designated to supply.
    let mut sends = Vec::new();
    for (receiver, member) in members.iter().enumerate() {
        if receiver == me {
            continue;
        }
        let rows = mine.src_col.common_indices(member.dst_col, height);
        let cols = mine.src_row.common_indices(member.dst_row, width);
        let mut payload = Vec::new();
        for &j in &cols {
            for &i in &rows {
                if sender_of(src_layout, &shape, member, i, j) == mine.pos {
                    payload.push(src_local.get(mine.src_col.local_index(i), mine.src_row.local_index(j)));
                }
            }
        }
        if !payload.is_empty() {
            sends.push((receiver, payload));
        }
    }

    // What I receive, in the order each sender packs it.
    let mut expected: Vec<Vec<(usize, usize)>> = vec![Vec::new(); members.len()];
    let rows: Vec<usize> = mine.dst_col.indices(height).collect();
    let cols: Vec<usize> = mine.dst_row.indices(width).collect();
    for (jl, &j) in cols.iter().enumerate() {
        for (il, &i) in rows.iter().enumerate() {
            let sender = sender_of(src_layout, &shape, mine, i, j);
            if sender == mine.pos {
                let value = src_local.get(mine.src_col.local_index(i), mine.src_row.local_index(j));
                dst.local.set(il, jl, value);
            } else if shape.in_scope(scope, mine.pos, sender) {
                expected[shape.scope_index(scope, sender)].push((il, jl));
            } else {
                return Err(unreachable_entry(src.dist(), dst.dist(), scope, i, j));
            }
        }
    }

    let Some(comm) = grid.comm(scope) else {
        return Ok(());
    };
    let sources: Vec<usize> = (0..members.len())
        .filter(|&member| !expected[member].is_empty())
        .collect();
    trace!(
        scope = ?scope,
        sends = sends.len(),
        receives = sources.len(),
        "exchange"
    );
    let received = comm.sparse_exchange(sends, &sources)?;
    for (&source, payload) in sources.iter().zip(received) {
        let slots = &expected[source];
        if payload.len() != slots.len() {
            return Err(DistError::Communication(format!(
                "expected {} entries from member {source}, got {}",
                slots.len(),
                payload.len()
            )));
        }
        for (&(il, jl), value) in slots.iter().zip(payload) {
            dst.local.set(il, jl, value);
        }
    }
    Ok(())
}

fn unreachable_entry(src: DistPair, dst: DistPair, scope: Scope, i: usize, j: usize) -> DistError {
    DistError::UnsupportedRedistribution {
        src,
        dst,
        reason: format!("no process in the {scope:?} communicator holds entry ({i}, {j})"),
    }
}
