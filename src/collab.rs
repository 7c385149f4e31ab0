//! Traits for the external collaborators this layer integrates but does not
//! implement (spec.md §6): the Raft algorithm core itself, the WAL journal,
//! the replica set / per-peer relay, and the synchronous-transaction limbo.
//!
//! These mirror the teacher's `RaftStorage`/`RaftNetwork` `#[async_trait]`
//! collaborator traits in shape: `anyhow::Result` for genuinely
//! implementation-defined failure, plain return values where the contract
//! says a call cannot fail from this layer's point of view.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::RaftMessage;
use crate::message::RaftRequest;
use crate::message::RaftRole;
use crate::NodeId;
use crate::Term;

/// An opaque guard for an observer registration on an external
/// collaborator. Dropping it detaches the callback. Collaborator
/// implementations are free to return any droppable type here; callers
/// only ever hold and eventually drop it.
pub type ObserverHandle = Box<dyn Any + Send + Sync>;

/// A read-only snapshot of the fields the Raft algorithm core tracks that
/// this layer needs but does not own (term, volatile_term, current role,
/// leader, and the two enable flags from RS in spec.md §3).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RaftSnapshot {
    pub term: Term,
    pub volatile_term: Term,
    pub state: RaftRole,
    pub leader: Option<NodeId>,
    pub is_enabled: bool,
    pub is_cfg_candidate: bool,
}

/// The generic Raft algorithm core: vote counting, log replication
/// decisions, and timers (explicitly out of scope for this crate, per
/// spec.md §1). `create`/`destroy` are not trait methods here — they are
/// the concrete implementation's own constructor and `Drop`, the same way
/// `RaftStorage` implementations are constructed outside the trait; this
/// layer only ever consumes an already-constructed `Arc<dyn RaftAlgorithm>`.
#[async_trait]
pub trait RaftAlgorithm: Send + Sync {
    /// Ingests a peer's Raft message, already decoded from the wire shape by
    /// the codec (C1). Returns the core's accept/reject result; the `Err`
    /// string is the core's own rejection reason and is the only case from
    /// this trait that propagates to a `process` caller (spec.md §7).
    fn process_msg(&self, message: &RaftMessage, source: NodeId) -> Result<(), String>;

    /// Replays a persisted record during recovery, already decoded from the
    /// wire shape by the codec (C1). Never fails (spec.md §4.10, `recover`).
    fn process_recovery(&self, message: &RaftMessage);

    /// Lets the core perform any yield-permitting work it deferred. Invoked
    /// once per async-worker iteration (spec.md §4.4).
    async fn process_async(&self);

    /// The subset of Raft state snapshotted into the local image.
    fn checkpoint_local(&self) -> RaftRequest;

    /// The subset of Raft state sent to a joining replica.
    fn checkpoint_remote(&self) -> RaftRequest;

    /// Sets whether this node is configured to actively seek leadership.
    fn cfg_is_candidate(&self, candidate: bool);

    /// Like `cfg_is_candidate`, but does not interrupt an ongoing election
    /// or leadership; takes effect once the current role ends (spec.md
    /// §4.5, "defer clearing").
    fn cfg_is_candidate_later(&self, candidate: bool);

    /// Enables or disables Raft participation entirely for this node.
    fn cfg_is_enabled(&self, enabled: bool);

    /// Pushes the election quorum size (healthy-quorum size).
    fn cfg_election_quorum(&self, quorum: usize);

    /// Pushes the cluster size used for quorum arithmetic.
    fn cfg_cluster_size(&self, size: usize);

    /// Resigns leadership. Does not necessarily advance the term; the node
    /// simply stops behaving as leader until an election resolves (spec.md
    /// §4.6).
    fn resign(&self);

    /// Registers `callback` to run whenever any visible Raft attribute
    /// changes. The returned handle must be dropped to detach.
    fn on_update(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle;

    /// A snapshot of the fields this layer reads off RS.
    fn snapshot(&self) -> RaftSnapshot;
}

/// The durable write-ahead log. Out of scope for this crate's own storage
/// format (spec.md §1); we consume only `submit`.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Submits a single log row and waits for the journal's commit
    /// notification. An `Err` return corresponds to a negative commit
    /// result or a submission error; both are fatal to the caller (spec.md
    /// §4.2, §7(a)).
    async fn submit(&self, row: RaftRequest) -> anyhow::Result<()>;
}

/// A per-peer outbound channel. Failures are absorbed by the relay itself;
/// the broadcaster never observes them (spec.md §4.3).
#[async_trait]
pub trait Relay: Send + Sync {
    async fn push_raft(&self, request: RaftRequest);
}

/// The replica-set health tracker: peer enumeration, per-peer relay lookup,
/// and quorum health observers (spec.md §6, "To replication").
pub trait ReplicaSet: Send + Sync {
    fn peers(&self) -> Vec<NodeId>;

    fn relay_for(&self, peer: NodeId) -> Option<Arc<dyn Relay>>;

    /// The size of a healthy quorum given the current registered peers.
    fn healthy_quorum(&self) -> usize;

    fn has_healthy_quorum(&self) -> bool;

    fn registered_count(&self) -> usize;

    fn on_quorum_gain(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle;

    fn on_quorum_loss(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle;

    fn on_health_change(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle;
}

/// The reason `Limbo::promote_qsync` failed to complete.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PromoteQsyncError {
    /// Transient: retried until success or task cancellation (spec.md §4.9,
    /// §7(c)).
    #[error("waiting for quorum")]
    WaitingForQuorum,

    /// Any other failure is logged and the post-promotion step exits
    /// (spec.md §4.9).
    #[error("{0}")]
    Other(String),
}

/// The ordered buffer of synchronous transactions awaiting quorum
/// confirmation.
#[async_trait]
pub trait Limbo: Send + Sync {
    /// Freezes the limbo: stop finalizing in-flight synchronous
    /// transactions.
    fn fence(&self);

    /// Resumes finalizing synchronous transactions.
    fn unfence(&self);

    /// The highest term that has ever owned the limbo's promotion.
    fn promote_greatest_term(&self) -> Term;

    /// Clears in-flight synchronous transactions belonging to prior terms
    /// and takes over the limbo on behalf of the new leader term.
    async fn promote_qsync(&self) -> Result<(), PromoteQsyncError>;
}
