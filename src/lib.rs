//! The consensus integration layer: the glue binding a generic Raft state
//! machine to a durable write-ahead log, a replication fan-out to peers, a
//! synchronous-transaction limbo, and node-local election configuration.
//!
//! This crate does not implement the Raft algorithm itself (vote counting,
//! log replication decisions, timers); that lives behind the
//! [`RaftAlgorithm`](collab::RaftAlgorithm) trait, which callers supply. What
//! lives here is everything that happens *around* that algorithm: mapping its
//! callbacks onto durable writes and network broadcast, deriving its
//! candidacy configuration from an operator-selected election mode, fencing
//! leadership on quorum loss, and giving callers primitives to wait on term
//! outcomes.

pub mod collab;
pub mod config;
pub mod election;
pub mod error;
pub mod message;
pub mod metrics;
pub mod node;
pub mod pubsub;
pub mod quorum;
pub mod wait;
pub mod worker;
pub mod writer;

pub use async_trait::async_trait;

pub use crate::collab::Journal;
pub use crate::collab::Limbo;
pub use crate::collab::RaftAlgorithm;
pub use crate::collab::RaftSnapshot;
pub use crate::collab::Relay;
pub use crate::collab::ReplicaSet;
pub use crate::config::Config;
pub use crate::election::ElectionMode;
pub use crate::error::BridgeError;
pub use crate::error::FatalError;
pub use crate::message::RaftMessage;
pub use crate::message::RaftRequest;
pub use crate::message::RaftRole;
pub use crate::message::VClock;
pub use crate::metrics::ElectionEvent;
pub use crate::metrics::NodeStatus;
pub use crate::metrics::Wait;
pub use crate::node::RaftBridge;
pub use crate::node::RaftCallbacks;
pub use crate::pubsub::Subscription;

/// The identity of a node within the replica set.
pub type NodeId = u64;

/// A Raft election term. Monotonically increasing.
pub type Term = u64;

/// A trait implemented by every type in this crate which can summarize
/// itself for tracing, in the same spirit as the teacher's `MessageSummary`.
pub trait MessageSummary {
    fn summary(&self) -> String;
}
