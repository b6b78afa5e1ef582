use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectiveOp {
    Broadcast,
    AllReduce,
    AllGather,
    Barrier,
    /// Sparse all-to-all used by redistributions.
    Exchange,
}

/// One collective as seen by the calling rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceEvent {
    /// Context id of the communicator it ran on.
    pub context: u32,
    pub op: CollectiveOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub collectives: usize,
    pub messages: usize,
}

/// Per-rank communication counters, shared by every communicator derived
/// from the same world.
///
/// Counting is always on. The full trace is only kept when the universe was
/// configured with `trace_collectives`, since it grows with every collective.
#[derive(Debug, Default)]
pub struct CommStats {
    collectives: AtomicUsize,
    messages: AtomicUsize,
    recording: bool,
    trace: Mutex<Vec<TraceEvent>>,
}

impl CommStats {
    pub fn new(recording: bool) -> Self {
        Self {
            recording,
            ..Self::default()
        }
    }

    /// Collectives this rank has entered.
    pub fn collectives(&self) -> usize {
        self.collectives.load(Ordering::Relaxed)
    }

    /// Point-to-point messages this rank has sent.
    pub fn messages(&self) -> usize {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            collectives: self.collectives(),
            messages: self.messages(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// The ordered list of collectives entered so far (empty unless recording).
    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.lock().clone()
    }

    pub(crate) fn record_collective(&self, context: u32, op: CollectiveOp) {
        self.collectives.fetch_add(1, Ordering::Relaxed);
        if self.recording {
            self.trace.lock().push(TraceEvent { context, op });
        }
    }

    pub(crate) fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }
}
