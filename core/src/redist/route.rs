//! Route planning: which chain of single-scope hops turns one distribution
//! into another.
//!
//! Every supported single-step transition is an edge between two
//! distributions, labelled with the communicator it runs over. Routes are the
//! cheapest paths through that graph, where a purely local filter is free and
//! any communicating hop costs one plus the relative size of what it
//! produces. Ties go to fewer hops, then to the earlier distribution in
//! [`DistPair::ALL`], so every process plans the same route.

use crate::dist::{Dist, DistPair};
use crate::error::{DistError, Result};
use crate::grid::{GridShape, Scope};

/// The communication shape of a hop, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    LocalCopy,
    /// Keep the subset of what is already held.
    Filter,
    AllGather,
    /// All-gather among the processes of one grid axis that share data.
    PartialAllGather,
    AllToAll,
    Permutation,
    Realign,
    Gather,
    Scatter,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub target: DistPair,
    pub scope: Scope,
    pub pattern: Pattern,
}

impl Hop {
    fn new(target: DistPair, scope: Scope, pattern: Pattern) -> Self {
        Self {
            target,
            scope,
            pattern,
        }
    }

    /// Runs over every process of the grid, so no alignment relation is
    /// needed between its source and target.
    pub fn is_global(&self) -> bool {
        matches!(self.scope, Scope::Vc | Scope::Vr)
    }

    fn cost(&self, shape: &GridShape) -> usize {
        match self.scope {
            Scope::SelfOnly => 0,
            _ => 1 + self.target.volume(shape),
        }
    }
}

/// The hops taking `src` to `dst`. Empty when they are the same.
///
/// # Errors
///
/// Returns `DistError::UnsupportedRedistribution` if no chain of hops
/// connects the two.
pub fn route(src: DistPair, dst: DistPair, shape: &GridShape) -> Result<Vec<Hop>> {
    if src == dst {
        return Ok(Vec::new());
    }
    if src == DistPair::CIRC_CIRC {
        let pattern = if dst == DistPair::STAR_STAR {
            Pattern::Broadcast
        } else {
            Pattern::Scatter
        };
        return Ok(vec![Hop::new(dst, Scope::Vc, pattern)]);
    }
    if dst == DistPair::CIRC_CIRC {
        let hop = if src == DistPair::STAR_STAR {
            Hop::new(dst, Scope::SelfOnly, Pattern::Filter)
        } else {
            Hop::new(dst, Scope::Vc, Pattern::Gather)
        };
        return Ok(vec![hop]);
    }
    shortest_path(src, dst, shape)
}

fn nodes() -> impl Iterator<Item = DistPair> {
    DistPair::ALL
        .into_iter()
        .filter(|&pair| pair != DistPair::CIRC_CIRC)
}

fn shortest_path(src: DistPair, dst: DistPair, shape: &GridShape) -> Result<Vec<Hop>> {
    let nodes: Vec<DistPair> = nodes().collect();
    let index = |pair: DistPair| nodes.iter().position(|&node| node == pair);
    let unsupported = |reason: &str| DistError::UnsupportedRedistribution {
        src,
        dst,
        reason: reason.to_string(),
    };
    let start = index(src).ok_or_else(|| unsupported("unknown source distribution"))?;
    let goal = index(dst).ok_or_else(|| unsupported("unknown target distribution"))?;

    // (cost, hops) per node, and the hop that reached it
    let mut best: Vec<Option<(usize, usize)>> = vec![None; nodes.len()];
    let mut via: Vec<Option<(usize, Hop)>> = vec![None; nodes.len()];
    let mut done = vec![false; nodes.len()];
    best[start] = Some((0, 0));

    while let Some((cost, hops, u)) = (0..nodes.len())
        .filter(|&u| !done[u])
        .filter_map(|u| best[u].map(|(cost, hops)| (cost, hops, u)))
        .min()
    {
        done[u] = true;
        if u == goal {
            break;
        }
        for hop in edges(nodes[u]) {
            let Some(v) = index(hop.target) else { continue };
            let candidate = (cost + hop.cost(shape), hops + 1);
            if best[v].map_or(true, |current| candidate < current) {
                best[v] = Some(candidate);
                via[v] = Some((u, hop));
            }
        }
    }

    let mut path = Vec::new();
    let mut at = goal;
    while at != start {
        let (from, hop) = via[at].ok_or_else(|| unsupported("no chain of supported hops"))?;
        path.push(hop);
        at = from;
    }
    path.reverse();
    Ok(path)
}

/// Every single-hop transition out of `from`.
fn edges(from: DistPair) -> Vec<Hop> {
    nodes()
        .filter(|&to| to != from)
        .filter_map(|to| edge(from, to).map(|(scope, pattern)| Hop::new(to, scope, pattern)))
        .collect()
}

fn edge(from: DistPair, to: DistPair) -> Option<(Scope, Pattern)> {
    if from == DistPair::STAR_STAR {
        return Some((Scope::SelfOnly, Pattern::Filter));
    }
    match (from.col() == to.col(), from.row() == to.row()) {
        (true, false) => axis_edge(from.row(), to.row()),
        (false, true) => axis_edge(from.col(), to.col()),
        (false, false) => cross_edge(from, to),
        (true, true) => None,
    }
}

/// One dimension changes, the other stays.
fn axis_edge(from: Dist, to: Dist) -> Option<(Scope, Pattern)> {
    match (from, to) {
        (Dist::Star, _) => Some((Scope::SelfOnly, Pattern::Filter)),
        (dist, Dist::Star) => Some((dist.axis_scope(), Pattern::AllGather)),
        (Dist::MC, Dist::VC) | (Dist::MR, Dist::VR) => Some((Scope::SelfOnly, Pattern::Filter)),
        (Dist::VC, Dist::MC) => Some((Scope::Mr, Pattern::PartialAllGather)),
        (Dist::VR, Dist::MR) => Some((Scope::Mc, Pattern::PartialAllGather)),
        (Dist::VC, Dist::VR) | (Dist::VR, Dist::VC) => Some((Scope::Vc, Pattern::Permutation)),
        _ => None,
    }
}

/// Both dimensions change: the four all-to-alls within one grid axis.
fn cross_edge(from: DistPair, to: DistPair) -> Option<(Scope, Pattern)> {
    use DistPair as D;
    match (from, to) {
        (D::MC_MR, D::VC_STAR)
        | (D::VC_STAR, D::MC_MR)
        | (D::MR_MC, D::STAR_VC)
        | (D::STAR_VC, D::MR_MC) => Some((Scope::Mr, Pattern::AllToAll)),
        (D::MC_MR, D::STAR_VR)
        | (D::STAR_VR, D::MC_MR)
        | (D::MR_MC, D::VR_STAR)
        | (D::VR_STAR, D::MR_MC) => Some((Scope::Mc, Pattern::AllToAll)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridOrder;

    fn shape() -> GridShape {
        GridShape::new(2, 3, GridOrder::ColumnMajor).unwrap()
    }

    #[test]
    fn test_every_pair_has_a_route() {
        let shape = shape();
        for src in DistPair::ALL {
            for dst in DistPair::ALL {
                let hops = route(src, dst, &shape).unwrap();
                assert_eq!(hops.is_empty(), src == dst, "{src} -> {dst}");
                if let Some(last) = hops.last() {
                    assert_eq!(last.target, dst);
                }
            }
        }
    }

    #[test]
    fn test_direct_routes() {
        let shape = shape();
        assert_eq!(
            route(DistPair::MC_MR, DistPair::MC_STAR, &shape).unwrap(),
            vec![Hop::new(DistPair::MC_STAR, Scope::Mr, Pattern::AllGather)]
        );
        assert_eq!(
            route(DistPair::VC_STAR, DistPair::MC_MR, &shape).unwrap(),
            vec![Hop::new(DistPair::MC_MR, Scope::Mr, Pattern::AllToAll)]
        );
        assert_eq!(
            route(DistPair::STAR_STAR, DistPair::STAR_VR, &shape).unwrap(),
            vec![Hop::new(DistPair::STAR_VR, Scope::SelfOnly, Pattern::Filter)]
        );
        assert_eq!(
            route(DistPair::CIRC_CIRC, DistPair::STAR_STAR, &shape).unwrap()[0].pattern,
            Pattern::Broadcast
        );
    }

    #[test]
    fn test_transpose_like_route_stays_off_star_star() {
        let hops = route(DistPair::MC_MR, DistPair::MR_MC, &shape()).unwrap();
        assert!(hops.len() > 1);
        assert!(hops.iter().all(|hop| hop.target != DistPair::STAR_STAR));
        assert!(hops.iter().all(|hop| hop.scope != Scope::SelfOnly));
    }

    #[test]
    fn test_filters_are_free() {
        // [MC,*] -> [VC,*] keeps a subset of the local rows.
        let hops = route(DistPair::MC_STAR, DistPair::VC_STAR, &shape()).unwrap();
        assert_eq!(hops, vec![Hop::new(DistPair::VC_STAR, Scope::SelfOnly, Pattern::Filter)]);
    }
}
