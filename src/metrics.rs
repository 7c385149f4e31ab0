//! The node's read-only status snapshot and election-event payload (C8),
//! published over a `tokio::sync::watch` channel the same way the teacher
//! publishes `RaftMetrics` from `Raft::metrics()`.

use std::time::Duration;

use tokio::sync::watch;

use crate::message::RaftRole;
use crate::NodeId;
use crate::Term;

/// A read-only summary of the Raft instance's visible state, updated by the
/// update trigger (spec.md §4.8 step 1) "as soon as possible" so followers
/// can be marked read-only promptly.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeStatus {
    pub term: Term,
    pub volatile_term: Term,
    pub state: RaftRole,
    pub leader: Option<NodeId>,
    pub is_enabled: bool,
    pub is_cfg_candidate: bool,
}

impl NodeStatus {
    /// A node is writable only while it is an enabled leader; this is the
    /// condition the update trigger is racing to make true or false as soon
    /// as a state change is visible.
    pub fn is_writable(&self) -> bool {
        self.is_enabled && self.state == RaftRole::Leader
    }
}

impl From<&crate::collab::RaftSnapshot> for NodeStatus {
    fn from(snapshot: &crate::collab::RaftSnapshot) -> Self {
        NodeStatus {
            term: snapshot.term,
            volatile_term: snapshot.volatile_term,
            state: snapshot.state,
            leader: snapshot.leader,
            is_enabled: snapshot.is_enabled,
            is_cfg_candidate: snapshot.is_cfg_candidate,
        }
    }
}

/// The payload broadcast to subscribers on every visible Raft state change
/// (spec.md §4.8 step 2, "broadcast an election-status event to
/// subscribers" — the distilled spec does not name a payload shape; see
/// `SPEC_FULL.md` A2 for why this one was chosen).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElectionEvent {
    pub term: Term,
    pub state: RaftRole,
    pub leader: Option<NodeId>,
    pub is_cfg_candidate: bool,
}

impl From<&NodeStatus> for ElectionEvent {
    fn from(s: &NodeStatus) -> Self {
        ElectionEvent {
            term: s.term,
            state: s.state,
            leader: s.leader,
            is_cfg_candidate: s.is_cfg_candidate,
        }
    }
}

/// A waitable handle over a stream of [`NodeStatus`] snapshots, mirroring
/// the teacher's `Raft::wait()` / internal `Wait` helper: callers can poll
/// the current value or suspend until a predicate over it holds.
#[derive(Clone)]
pub struct Wait {
    rx: watch::Receiver<NodeStatus>,
}

/// Returned by [`Wait::until`] when the timeout elapses before the
/// predicate is satisfied.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("timed out waiting for node status condition")]
pub struct WaitTimeoutError;

impl Wait {
    pub(crate) fn new(rx: watch::Receiver<NodeStatus>) -> Self {
        Wait { rx }
    }

    /// Returns the most recently published status without suspending.
    pub fn current(&self) -> NodeStatus {
        self.rx.borrow().clone()
    }

    /// Suspends until `predicate` holds for a published status, or until
    /// `timeout` elapses (if given).
    pub async fn until(
        &mut self,
        timeout: Option<Duration>,
        mut predicate: impl FnMut(&NodeStatus) -> bool,
    ) -> Result<NodeStatus, WaitTimeoutError> {
        if predicate(&self.rx.borrow()) {
            return Ok(self.rx.borrow().clone());
        }
        let fut = async {
            loop {
                if self.rx.changed().await.is_err() {
                    // Publisher dropped; last-known value is final.
                    return self.rx.borrow().clone();
                }
                let snapshot = self.rx.borrow().clone();
                if predicate(&snapshot) {
                    return snapshot;
                }
            }
        };
        match timeout {
            Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| WaitTimeoutError),
            None => Ok(fut.await),
        }
    }
}
