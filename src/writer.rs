//! C2: the Durable Writer. Persists a Raft message to the WAL synchronously
//! w.r.t. the Raft state machine's progress expectations.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::collab::Journal;
use crate::message::RaftMessage;
use crate::message::RaftRequest;
use crate::worker::NonCancellableGuard;
use crate::MessageSummary;

/// C2. Invoked by the Raft core (via the `write` capability handed to it at
/// construction) whenever a message must be persisted before taking effect.
pub struct DurableWriter {
    journal: Arc<dyn Journal>,
    cancellable: Arc<AtomicBool>,
}

impl DurableWriter {
    pub fn new(journal: Arc<dyn Journal>, cancellable: Arc<AtomicBool>) -> Self {
        DurableWriter { journal, cancellable }
    }

    /// Encodes `message` into a log row, submits it, and waits for the
    /// journal's commit notification. The submitting task is marked
    /// non-cancellable for the entire submit-and-wait window so spurious
    /// cancellation cannot abandon an in-flight durable write.
    ///
    /// `message.vclock` must be `None` and `message.state` must be the "no
    /// role" sentinel (I1); violating this is a programmer error, asserted
    /// rather than returned as a recoverable `Result` (spec.md §7(e)).
    ///
    /// On any journal failure this aborts the process: a lost Raft term
    /// record can violate safety, and there is no recovery policy defined
    /// for a diverged view of history (spec.md §4.2, §7(a)).
    #[tracing::instrument(level = "debug", skip(self, message))]
    pub async fn write(&self, message: &RaftMessage) {
        assert!(
            message.is_wal_shaped(),
            "durable writer received a message with a non-nil vclock or state"
        );
        tracing::debug!(msg = %message.summary(), "submitting durable write");
        let row = RaftRequest::from(message);

        let _guard = NonCancellableGuard::enter(&self.cancellable);
        if let Err(err) = self.journal.submit(row).await {
            crate::error::FatalError::JournalWrite(err.to_string()).abort();
        }
        // `_guard` drops here, restoring cancellability before `write`
        // returns to its caller.
    }
}
