use super::backend::{Backend, Envelope};
use super::stats::{CollectiveOp, CommStats};
use crate::config::Config;
use crate::error::{DistError, Result};
use std::ops::Add;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Largest tag available to user point-to-point traffic. Tags above it are
/// reserved for the collectives.
pub const MAX_USER_TAG: u32 = (1 << 24) - 1;

const TAG_BROADCAST: u32 = 1 << 24;
const TAG_REDUCE_SCATTER: u32 = TAG_BROADCAST + 1;
const TAG_REDUCE_GATHER: u32 = TAG_BROADCAST + 2;
const TAG_ALL_GATHER: u32 = TAG_BROADCAST + 3;
const TAG_BARRIER: u32 = TAG_BROADCAST + 4;
const TAG_EXCHANGE: u32 = TAG_BROADCAST + 5;

struct Shared {
    backend: Arc<dyn Backend>,
    stats: CommStats,
    next_context: AtomicU32,
}

/// A communicator: an ordered subset of world ranks with its own message
/// context.
///
/// Ranks passed to and returned from a `Comm` are *member* indices
/// (`0..size()`), not world ranks. Cloning is cheap and yields a handle to
/// the same communicator.
#[derive(Clone)]
pub struct Comm {
    shared: Arc<Shared>,
    members: Arc<[usize]>,
    rank: usize,
    context: u32,
}

impl std::fmt::Debug for Comm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comm")
            .field("rank", &self.rank)
            .field("size", &self.members.len())
            .field("context", &self.context)
            .finish()
    }
}

impl Comm {
    /// The communicator over every rank of `backend`'s world.
    pub fn world(backend: Arc<dyn Backend>) -> Self {
        let size = backend.world_size();
        let rank = backend.rank();
        let recording = backend.config().trace_collectives;
        Comm {
            shared: Arc::new(Shared {
                backend,
                stats: CommStats::new(recording),
                next_context: AtomicU32::new(1),
            }),
            members: (0..size).collect(),
            rank,
            context: 0,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn world_rank(&self) -> usize {
        self.members[self.rank]
    }

    /// World rank of member `member`.
    pub fn world_rank_of(&self, member: usize) -> Option<usize> {
        self.members.get(member).copied()
    }

    pub fn context(&self) -> u32 {
        self.context
    }

    pub fn stats(&self) -> &CommStats {
        &self.shared.stats
    }

    pub fn config(&self) -> &Config {
        self.shared.backend.config()
    }

    /// Derives a communicator over `members` (world ranks, in member order)
    /// without communicating.
    ///
    /// Context ids come from a per-rank counter, so every rank must derive its
    /// communicators in the same order. The calling rank must be a member.
    pub fn subset(&self, members: Vec<usize>) -> Result<Comm> {
        let world_size = self.shared.backend.world_size();
        if let Some(&bad) = members.iter().find(|&&w| w >= world_size) {
            return Err(DistError::Configuration(format!(
                "rank {bad} is outside a world of {world_size} ranks"
            )));
        }
        let mut sorted = members.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != members.len() {
            return Err(DistError::Configuration(
                "communicator members must be distinct".to_string(),
            ));
        }
        let me = self.world_rank();
        let rank = members.iter().position(|&w| w == me).ok_or_else(|| {
            DistError::Configuration(format!("rank {me} is not a member of {members:?}"))
        })?;
        let context = self.shared.next_context.fetch_add(1, Ordering::Relaxed);
        Ok(Comm {
            shared: Arc::clone(&self.shared),
            members: members.into(),
            rank,
            context,
        })
    }

    /// Sends `data` to member `dest`. Never blocks.
    pub fn send<T: Send + 'static>(&self, dest: usize, tag: u32, data: Vec<T>) -> Result<()> {
        check_user_tag(tag)?;
        self.post(dest, tag, data)
    }

    /// Receives the next `Vec<T>` sent by member `source` with `tag`.
    pub fn recv<T: 'static>(&self, source: usize, tag: u32) -> Result<Vec<T>> {
        check_user_tag(tag)?;
        self.fetch(source, tag)
    }

    /// Binomial-tree broadcast of `data` from member `root`.
    ///
    /// On non-root members `data` is replaced by the root's contents.
    pub fn broadcast<T: Clone + Send + 'static>(&self, root: usize, data: &mut Vec<T>) -> Result<()> {
        self.check_member(root)?;
        self.record(CollectiveOp::Broadcast);
        let size = self.size();
        let relative = (self.rank + size - root) % size;

        let mut mask = 1;
        while mask < size {
            if relative & mask != 0 {
                let source = (relative - mask + root) % size;
                *data = self.fetch(source, TAG_BROADCAST)?;
                break;
            }
            mask <<= 1;
        }
        mask >>= 1;
        while mask > 0 {
            if relative + mask < size {
                let dest = (relative + mask + root) % size;
                self.post(dest, TAG_BROADCAST, data.clone())?;
            }
            mask >>= 1;
        }
        Ok(())
    }

    /// Element-wise sum across all members; every member ends with the result.
    pub fn all_reduce_sum<T>(&self, data: &mut [T]) -> Result<()>
    where
        T: Copy + Send + Add<Output = T> + 'static,
    {
        self.all_reduce_with(data, |a, b| a + b)
    }

    /// Element-wise reduction with `op` using the ring algorithm.
    ///
    /// The buffer is cut into `size` chunks. A scatter-reduce phase leaves
    /// each member with one fully reduced chunk after `size - 1` steps, and
    /// an all-gather phase circulates the reduced chunks for another
    /// `size - 1` steps. Every chunk is reduced along one fixed chain, so all
    /// members end with bitwise-identical results. Every member must pass a
    /// buffer of the same length.
    pub fn all_reduce_with<T, F>(&self, data: &mut [T], op: F) -> Result<()>
    where
        T: Copy + Send + 'static,
        F: Fn(T, T) -> T,
    {
        self.record(CollectiveOp::AllReduce);
        let size = self.size();
        if size == 1 {
            return Ok(());
        }

        let total = data.len();
        let chunk = total.div_ceil(size);
        let bounds = |idx: usize| {
            let start = (idx * chunk).min(total);
            (start, (start + chunk).min(total))
        };
        let right = (self.rank + 1) % size;
        let left = (self.rank + size - 1) % size;

        // Phase 1: scatter-reduce
        for step in 0..size - 1 {
            let send_idx = (self.rank + size - step) % size;
            let recv_idx = (self.rank + 2 * size - step - 1) % size;
            let (start, end) = bounds(send_idx);
            self.post(right, TAG_REDUCE_SCATTER, data[start..end].to_vec())?;

            let incoming: Vec<T> = self.fetch(left, TAG_REDUCE_SCATTER)?;
            let (start, end) = bounds(recv_idx);
            check_len(incoming.len(), end - start, left)?;
            for (slot, value) in data[start..end].iter_mut().zip(incoming) {
                *slot = op(*slot, value);
            }
        }

        // Phase 2: all-gather
        for step in 0..size - 1 {
            let send_idx = (self.rank + 1 + size - step) % size;
            let recv_idx = (self.rank + size - step) % size;
            let (start, end) = bounds(send_idx);
            self.post(right, TAG_REDUCE_GATHER, data[start..end].to_vec())?;

            let incoming: Vec<T> = self.fetch(left, TAG_REDUCE_GATHER)?;
            let (start, end) = bounds(recv_idx);
            check_len(incoming.len(), end - start, left)?;
            data[start..end].copy_from_slice(&incoming);
        }
        Ok(())
    }

    /// Ring all-gather of variable-length blocks; entry `r` of the result is
    /// member `r`'s contribution.
    pub fn all_gather<T: Clone + Send + 'static>(&self, local: &[T]) -> Result<Vec<Vec<T>>> {
        self.record(CollectiveOp::AllGather);
        self.ring_gather(local, TAG_ALL_GATHER)
    }

    /// Returns once every member has entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.record(CollectiveOp::Barrier);
        self.ring_gather(&[()], TAG_BARRIER).map(|_| ())
    }

    /// Sends each `(dest, payload)` pair, then receives exactly one message
    /// from every member listed in `sources`, returned in that order.
    ///
    /// Both sides must agree on who talks to whom; members with nothing to
    /// exchange still enter the collective.
    pub fn sparse_exchange<T: Send + 'static>(
        &self,
        sends: Vec<(usize, Vec<T>)>,
        sources: &[usize],
    ) -> Result<Vec<Vec<T>>> {
        self.record(CollectiveOp::Exchange);
        for (dest, payload) in sends {
            self.post(dest, TAG_EXCHANGE, payload)?;
        }
        sources
            .iter()
            .map(|&source| self.fetch(source, TAG_EXCHANGE))
            .collect()
    }

    fn ring_gather<T: Clone + Send + 'static>(&self, local: &[T], tag: u32) -> Result<Vec<Vec<T>>> {
        let size = self.size();
        let mut blocks: Vec<Vec<T>> = vec![Vec::new(); size];
        blocks[self.rank] = local.to_vec();
        let right = (self.rank + 1) % size;
        let left = (self.rank + size - 1) % size;
        for step in 0..size - 1 {
            let send_idx = (self.rank + size - step) % size;
            let recv_idx = (self.rank + 2 * size - step - 1) % size;
            self.post(right, tag, blocks[send_idx].clone())?;
            blocks[recv_idx] = self.fetch(left, tag)?;
        }
        Ok(blocks)
    }

    fn record(&self, op: CollectiveOp) {
        self.shared.stats.record_collective(self.context, op);
    }

    fn check_member(&self, member: usize) -> Result<usize> {
        self.world_rank_of(member).ok_or_else(|| {
            DistError::Communication(format!(
                "member {member} is outside a communicator of size {}",
                self.size()
            ))
        })
    }

    fn post<T: Send + 'static>(&self, dest: usize, tag: u32, data: Vec<T>) -> Result<()> {
        let world_dest = self.check_member(dest)?;
        self.shared.stats.record_message();
        self.shared.backend.send(
            world_dest,
            Envelope {
                source: self.world_rank(),
                context: self.context,
                tag,
                payload: Box::new(data),
            },
        )
    }

    fn fetch<T: 'static>(&self, source: usize, tag: u32) -> Result<Vec<T>> {
        let world_source = self.check_member(source)?;
        let envelope = self.shared.backend.recv(world_source, self.context, tag)?;
        envelope
            .payload
            .downcast::<Vec<T>>()
            .map(|boxed| *boxed)
            .map_err(|_| {
                DistError::Communication(format!(
                    "message from member {source} (tag {tag}) does not carry a Vec<{}>",
                    std::any::type_name::<T>()
                ))
            })
    }
}

fn check_user_tag(tag: u32) -> Result<()> {
    if tag > MAX_USER_TAG {
        return Err(DistError::Communication(format!(
            "tag {tag} is reserved for collectives"
        )));
    }
    Ok(())
}

fn check_len(got: usize, expected: usize, source: usize) -> Result<()> {
    if got != expected {
        return Err(DistError::Communication(format!(
            "member {source} sent {got} elements, expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::distributed::Universe;

    #[test]
    fn test_ring_all_reduce() {
        let results = Universe::new(4)
            .run(|world| {
                // Rank 0 has 1s, rank 1 has 2s, ... so the sum is 1 + 2 + 3 + 4 = 10.
                let mut data = vec![(world.rank() + 1) as f32; 8];
                world.all_reduce_sum(&mut data)?;
                Ok(data)
            })
            .unwrap();
        for data in results {
            assert_eq!(data, vec![10.0; 8]);
        }
    }

    #[test]
    fn test_all_reduce_shorter_than_world() {
        // Two elements over five ranks leaves some chunks empty.
        let results = Universe::new(5)
            .run(|world| {
                let mut data = vec![world.rank() as i64, 1];
                world.all_reduce_sum(&mut data)?;
                Ok(data)
            })
            .unwrap();
        for data in results {
            assert_eq!(data, vec![10, 5]);
        }
    }

    #[test]
    fn test_all_reduce_max() {
        let results = Universe::new(3)
            .run(|world| {
                let mut data = vec![world.rank() as i32 * 7 % 5, 4 - world.rank() as i32];
                world.all_reduce_with(&mut data, i32::max)?;
                Ok(data)
            })
            .unwrap();
        for data in results {
            // rank values: [0, 4], [2, 3], [4, 2]
            assert_eq!(data, vec![4, 4]);
        }
    }

    #[test]
    fn test_broadcast_from_every_root() {
        for size in 1..=6 {
            for root in 0..size {
                let results = Universe::new(size)
                    .run(|world| {
                        let mut data = if world.rank() == root {
                            vec![root as u32, 42]
                        } else {
                            Vec::new()
                        };
                        world.broadcast(root, &mut data)?;
                        Ok(data)
                    })
                    .unwrap();
                for data in results {
                    assert_eq!(data, vec![root as u32, 42]);
                }
            }
        }
    }

    #[test]
    fn test_all_gather_variable_lengths() {
        let results = Universe::new(4)
            .run(|world| world.all_gather(&vec![world.rank(); world.rank()]))
            .unwrap();
        for blocks in results {
            for (rank, block) in blocks.iter().enumerate() {
                assert_eq!(block, &vec![rank; rank]);
            }
        }
    }

    #[test]
    fn test_subset_isolates_traffic() {
        let results = Universe::new(4)
            .run(|world| {
                let me = world.rank();
                let evens_or_odds: Vec<usize> = (0..4).filter(|r| r % 2 == me % 2).collect();
                let sub = world.subset(evens_or_odds)?;
                // A world message sent first must not be consumed by the subset receive.
                if me < 2 {
                    world.send(me + 2, 5, vec![100 + me])?;
                }
                if sub.rank() == 0 {
                    sub.send(1, 5, vec![me])?;
                }
                let mut got = Vec::new();
                if sub.rank() == 1 {
                    got.extend(sub.recv::<usize>(0, 5)?);
                }
                if me >= 2 {
                    got.extend(world.recv::<usize>(me - 2, 5)?);
                }
                Ok(got)
            })
            .unwrap();
        assert_eq!(results[0], Vec::<usize>::new());
        assert_eq!(results[1], Vec::<usize>::new());
        assert_eq!(results[2], vec![0, 100]);
        assert_eq!(results[3], vec![1, 101]);
    }

    #[test]
    fn test_reserved_tag_rejected() {
        let err = Universe::new(1).run(|world| world.send(0, super::MAX_USER_TAG + 1, vec![1u8]));
        assert!(err.is_err());
    }
}
