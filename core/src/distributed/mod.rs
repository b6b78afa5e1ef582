//! # Message Passing
//!
//! Every algorithm in this crate is written SPMD-style: the same closure runs on
//! every rank, each rank owns a slice of every matrix, and ranks cooperate only
//! by exchanging messages. This module is the plumbing underneath.
//!
//! ## Layers
//!
//! *   [`Backend`](backend::Backend): point-to-point transport. Messages carry a
//!     `(source, context, tag)` envelope and are matched on all three, so two
//!     communicators sharing ranks never see each other's traffic.
//! *   [`ChannelBackend`](cpu_backend::ChannelBackend): an in-process transport
//!     built on `crossbeam` channels, one thread per rank.
//! *   [`Comm`](comm::Comm): a communicator over an ordered subset of ranks,
//!     with the collectives the algorithms need (broadcast, ring all-reduce,
//!     ring all-gather, barrier and sparse exchange).
//! *   [`Universe`](universe::Universe): spawns the ranks, hands each its world
//!     communicator, and tears everything down if one rank fails.
//!
//! > [!NOTE]
//! > All collectives must be entered by every member of the communicator in the
//! > same order. The algorithms guarantee this by deciding control flow only from
//! > global quantities (shapes, block sizes, alignments), never from the size of a
//! > rank's local piece.

pub mod backend;
pub mod comm;
pub mod cpu_backend;
pub mod stats;
pub mod universe;

pub use backend::{Backend, Envelope};
pub use comm::Comm;
pub use cpu_backend::ChannelBackend;
pub use stats::{CollectiveOp, CommStats, StatsSnapshot, TraceEvent};
pub use universe::Universe;
