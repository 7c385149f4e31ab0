//! Error types surfaced by this crate.
//!
//! Following the teacher's convention of one `thiserror` enum per fallible
//! surface rather than a single catch-all, `BridgeError` covers everything
//! that can be returned to a caller (spec.md §7, cases (d) and `process`'s
//! own rejection), while `FatalError` is never returned — it is logged at
//! the point of capture and turned into a process abort.

use thiserror::Error;

/// Errors returned to callers of the public surface.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BridgeError {
    /// A caller attempted an election-sensitive operation while Raft is
    /// disabled for this node.
    #[error("election is disabled on this node")]
    ElectionDisabled,

    /// A waiter's task was cancelled before its condition was satisfied.
    /// Named to avoid borrowing fiber terminology from the system this was
    /// distilled from; the underlying cause is the same.
    #[error("wait was cancelled")]
    WaitCancelled,

    /// The Raft core rejected an inbound message; the string is the core's
    /// own reason, passed through unexamined.
    #[error("raft core rejected the request: {0}")]
    RaftRejected(String),

    /// The global instance was used before `RaftBridge::init` or after
    /// `RaftBridge::teardown`.
    #[error("raft instance is not initialized")]
    NotInitialized,
}

/// Errors that this crate never returns. A `FatalError` is logged and the
/// process aborts; there is no supervising state machine here to shut down
/// into the way the teacher's core degrades to `State::Shutdown`; the
/// integration layer does not own enough of the process to recover safely
/// from the failures below (spec.md §7(a)/(b)).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FatalError {
    #[error("durable write to the journal failed: {0}")]
    JournalWrite(String),

    #[error("failed to create the async worker task: {0}")]
    WorkerCreation(String),
}

impl FatalError {
    /// Logs this error and aborts the process. Never returns.
    ///
    /// Called only from the durable writer and from first-use worker
    /// creation, matching the taxonomy in spec.md §7.
    pub fn abort(self) -> ! {
        tracing::error!(error = %self, "fatal error, halting process");
        std::process::abort()
    }
}
