use super::backend::{Backend, Envelope};
use crate::config::Config;
use crate::error::{DistError, Result};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// An in-process transport where every rank is a thread.
///
/// Each rank owns one `crossbeam` inbox and holds a sender into every other
/// rank's inbox, so sends never block. Messages that arrive before anyone asks
/// for them are parked in a pending queue and matched later on
/// `(source, context, tag)`.
pub struct ChannelBackend {
    rank: usize,
    world_size: usize,
    inbox: Receiver<Envelope>,
    peers: Vec<Sender<Envelope>>,
    pending: Mutex<VecDeque<Envelope>>,
    aborted: Arc<AtomicBool>,
    config: Arc<Config>,
}

impl ChannelBackend {
    /// Wires up a fully connected set of backends, one per rank, sharing one
    /// abort flag.
    pub fn mesh(world_size: usize, config: Config) -> Vec<ChannelBackend> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..world_size).map(|_| unbounded()).unzip();
        let aborted = Arc::new(AtomicBool::new(false));
        let config = Arc::new(config);
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelBackend {
                rank,
                world_size,
                inbox,
                peers: senders.clone(),
                pending: Mutex::new(VecDeque::new()),
                aborted: Arc::clone(&aborted),
                config: Arc::clone(&config),
            })
            .collect()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn take_pending(&self, source: usize, context: u32, tag: u32) -> Option<Envelope> {
        let mut pending = self.pending.lock();
        let pos = pending
            .iter()
            .position(|env| env.matches(source, context, tag))?;
        pending.remove(pos)
    }
}

impl Backend for ChannelBackend {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&self, dest: usize, envelope: Envelope) -> Result<()> {
        if self.is_aborted() {
            return Err(DistError::Aborted { rank: self.rank });
        }
        let peer = self.peers.get(dest).ok_or_else(|| {
            DistError::Communication(format!(
                "rank {dest} is outside a world of {} ranks",
                self.world_size
            ))
        })?;
        trace!(
            from = self.rank,
            to = dest,
            context = envelope.context,
            tag = envelope.tag,
            "send"
        );
        peer.send(envelope)
            .map_err(|_| DistError::Communication(format!("rank {dest} hung up")))
    }

    fn recv(&self, source: usize, context: u32, tag: u32) -> Result<Envelope> {
        if let Some(envelope) = self.take_pending(source, context, tag) {
            return Ok(envelope);
        }

        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let deadline = self
            .config
            .recv_timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        loop {
            match self.inbox.recv_timeout(poll) {
                Ok(envelope) if envelope.matches(source, context, tag) => return Ok(envelope),
                Ok(envelope) => self.pending.lock().push_back(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_aborted() {
                        return Err(DistError::Aborted { rank: self.rank });
                    }
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        warn!(
                            rank = self.rank,
                            source, context, tag, "receive timed out"
                        );
                        return Err(DistError::Communication(format!(
                            "rank {} timed out waiting for rank {source} (context {context}, tag {tag})",
                            self.rank
                        )));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DistError::Communication(format!(
                        "inbox of rank {} disconnected",
                        self.rank
                    )));
                }
            }
        }
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn envelope(source: usize, context: u32, tag: u32, value: i32) -> Envelope {
        Envelope {
            source,
            context,
            tag,
            payload: Box::new(vec![value]),
        }
    }

    fn payload(envelope: Envelope) -> i32 {
        envelope.payload.downcast::<Vec<i32>>().unwrap()[0]
    }

    #[test]
    fn test_out_of_order_messages_are_matched() {
        let mut backends = ChannelBackend::mesh(2, Config::default());
        let receiver = backends.pop().unwrap();
        let sender = backends.pop().unwrap();

        sender.send(1, envelope(0, 7, 1, 10)).unwrap();
        sender.send(1, envelope(0, 3, 1, 20)).unwrap();
        sender.send(1, envelope(0, 7, 1, 30)).unwrap();

        assert_eq!(payload(receiver.recv(0, 3, 1).unwrap()), 20);
        assert_eq!(payload(receiver.recv(0, 7, 1).unwrap()), 10);
        assert_eq!(payload(receiver.recv(0, 7, 1).unwrap()), 30);
    }

    #[test]
    fn test_abort_releases_blocked_receiver() {
        let mut backends = ChannelBackend::mesh(2, Config::default());
        let waiter = backends.pop().unwrap();
        let failer = backends.pop().unwrap();

        let handle = thread::spawn(move || waiter.recv(0, 0, 0));
        failer.abort();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(DistError::Aborted { rank: 1 })));
    }

    #[test]
    fn test_recv_timeout() {
        let config = Config {
            recv_timeout_ms: Some(20),
            poll_interval_ms: 5,
            ..Config::default()
        };
        let backends = ChannelBackend::mesh(1, config);
        let result = backends[0].recv(0, 0, 0);
        assert!(matches!(result, Err(DistError::Communication(_))));
    }
}
