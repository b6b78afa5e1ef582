use super::backend::Backend;
use super::comm::Comm;
use super::cpu_backend::ChannelBackend;
use crate::config::Config;
use crate::error::{DistError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info_span};

/// A set of ranks running the same closure, one thread per rank.
///
/// # Example
///
/// ```rust
/// use distla::distributed::Universe;
///
/// let sums = Universe::new(4)
///     .run(|world| {
///         let mut data = vec![world.rank() as f64];
///         world.all_reduce_sum(&mut data)?;
///         Ok(data[0])
///     })
///     .unwrap();
/// assert_eq!(sums, vec![6.0; 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Universe {
    size: usize,
    config: Config,
}

impl Universe {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `f` on every rank and returns the per-rank results in rank order.
    ///
    /// If any rank returns an error or panics, the universe is aborted: ranks
    /// blocked in a receive fail with [`DistError::Aborted`] instead of
    /// hanging. The error reported is the one that caused the abort.
    pub fn run<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(Comm) -> Result<R> + Sync,
        R: Send,
    {
        if self.size == 0 {
            return Err(DistError::Configuration(
                "a universe needs at least one rank".to_string(),
            ));
        }
        self.config.validate()?;

        let backends = ChannelBackend::mesh(self.size, self.config.clone());
        let f = &f;
        let outcomes: Vec<Result<R>> = std::thread::scope(|scope| {
            let handles: Vec<_> = backends
                .into_iter()
                .map(|backend| {
                    scope.spawn(move || {
                        let backend = Arc::new(backend);
                        let rank = backend.rank();
                        let _span = info_span!("rank", rank).entered();
                        let world = Comm::world(Arc::clone(&backend) as Arc<dyn Backend>);
                        let outcome = catch_unwind(AssertUnwindSafe(|| f(world)))
                            .unwrap_or_else(|payload| {
                                Err(DistError::Panicked {
                                    rank,
                                    message: panic_message(payload.as_ref()),
                                })
                            });
                        if let Err(err) = &outcome {
                            if !matches!(err, DistError::Aborted { .. }) {
                                error!(rank, %err, "rank failed, aborting universe");
                            }
                            backend.abort();
                        } else {
                            debug!(rank, "rank finished");
                        }
                        outcome
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(DistError::Panicked {
                            rank,
                            message: panic_message(payload.as_ref()),
                        })
                    })
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_abort = None;
        let mut root_cause = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(err @ DistError::Aborted { .. }) => {
                    first_abort.get_or_insert(err);
                }
                Err(err) => {
                    root_cause.get_or_insert(err);
                }
            }
        }
        match root_cause.or(first_abort) {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
