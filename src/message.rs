//! The in-memory Raft message (`RaftMessage`) and its on-wire/on-disk
//! counterpart (`RaftRequest`), plus the codec between them (C1).

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::MessageSummary;
use crate::NodeId;
use crate::Term;

/// A node's role as seen by the integration layer. `RaftRole::Follower` is
/// also used for the "no role yet" case; unlike `ElectionMode` there is no
/// separate invalid sentinel here because the Raft core always reports one
/// of these four.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RaftRole {
    Follower,
    Candidate,
    Leader,
    /// Raft is disabled for this node; no role participation at all.
    Off,
}

impl Default for RaftRole {
    fn default() -> Self {
        RaftRole::Off
    }
}

/// An opaque vector clock. This layer never inspects its contents; it only
/// carries the pointer between the Raft core, the codec, and the journal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VClock(pub Vec<(NodeId, u64)>);

/// The in-memory Raft message (M in the data model): an immutable bundle of
/// the six semantic fields the Raft core hands this layer on every callback.
///
/// `vclock` is carried as a cheap-to-clone `Arc` rather than a borrowed
/// reference with an explicit lifetime, because a `RaftMessage` routinely
/// crosses `tokio::sync` channel and `.await` boundaries in this crate (the
/// durable writer submits it to the journal, the broadcaster hands it to
/// per-peer relays); a borrowed reference could not survive those hops. See
/// `DESIGN.md` for the full rationale.
#[derive(Clone, Debug, Default)]
pub struct RaftMessage {
    pub term: Term,
    pub vote: Option<NodeId>,
    pub leader_id: Option<NodeId>,
    pub is_leader_seen: bool,
    pub state: RaftRole,
    pub vclock: Option<Arc<VClock>>,
}

impl RaftMessage {
    /// A message is durable-writer-eligible only when its WAL-invisible
    /// fields are absent. Violating this is a programmer error (spec.md
    /// §4.2); callers of [`crate::writer::DurableWriter::write`] are expected
    /// to have constructed the message this way.
    pub fn is_wal_shaped(&self) -> bool {
        self.vclock.is_none() && self.state == RaftRole::Off
    }
}

/// The on-wire / on-disk serialization shape (R in the data model): the same
/// four persistable fields as `RaftMessage`, minus `vclock` and `state`,
/// which are never persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RaftRequest {
    pub term: Term,
    pub vote: Option<NodeId>,
    pub leader_id: Option<NodeId>,
    pub is_leader_seen: bool,
}

impl MessageSummary for RaftMessage {
    fn summary(&self) -> String {
        format!(
            "term={}, vote={:?}, leader_id={:?}, state={:?}",
            self.term, self.vote, self.leader_id, self.state
        )
    }
}

impl MessageSummary for RaftRequest {
    fn summary(&self) -> String {
        format!(
            "term={}, vote={:?}, leader_id={:?}",
            self.term, self.vote, self.leader_id
        )
    }
}

/// C1: structural 1:1 copy from the on-wire shape into the in-memory shape.
/// Performs no validation; that is the Raft core's responsibility.
impl From<&RaftRequest> for RaftMessage {
    fn from(r: &RaftRequest) -> Self {
        RaftMessage {
            term: r.term,
            vote: r.vote,
            leader_id: r.leader_id,
            is_leader_seen: r.is_leader_seen,
            state: RaftRole::Off,
            vclock: None,
        }
    }
}

/// C1: structural 1:1 copy from the in-memory shape into the on-wire shape.
/// Drops `vclock` and `state`, which are WAL-invisible.
impl From<&RaftMessage> for RaftRequest {
    fn from(m: &RaftMessage) -> Self {
        RaftRequest {
            term: m.term,
            vote: m.vote,
            leader_id: m.leader_id,
            is_leader_seen: m.is_leader_seen,
        }
    }
}
