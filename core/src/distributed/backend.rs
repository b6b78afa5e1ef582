use crate::config::Config;
use crate::error::Result;
use std::any::Any;
use std::fmt;

/// A message in flight between two ranks.
///
/// The payload is type-erased; the receiving [`Comm`](super::Comm) downcasts it
/// back to the `Vec<T>` the sender posted.
pub struct Envelope {
    /// World rank of the sender.
    pub source: usize,
    /// Communicator the message belongs to.
    pub context: u32,
    pub tag: u32,
    pub payload: Box<dyn Any + Send>,
}

impl Envelope {
    pub fn matches(&self, source: usize, context: u32, tag: u32) -> bool {
        self.source == source && self.context == context && self.tag == tag
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("source", &self.source)
            .field("context", &self.context)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Abstraction for a point-to-point transport.
///
/// This trait allows swapping the in-process channel transport for a real
/// network one without touching the collectives built on top of it.
/// Messages between one `(source, destination)` pair with the same context and
/// tag must be delivered in the order they were sent.
pub trait Backend: Send + Sync {
    /// Returns the world rank of the current process/thread.
    fn rank(&self) -> usize;

    /// Returns the total number of processes/threads.
    fn world_size(&self) -> usize;

    /// Posts `envelope` to world rank `dest` without waiting for it to be received.
    fn send(&self, dest: usize, envelope: Envelope) -> Result<()>;

    /// Blocks until a message matching `(source, context, tag)` arrives.
    ///
    /// Fails instead of blocking forever once the universe has been aborted.
    fn recv(&self, source: usize, context: u32, tag: u32) -> Result<Envelope>;

    /// Marks the whole universe as failed so every blocked receive returns.
    fn abort(&self);

    fn config(&self) -> &Config;
}
