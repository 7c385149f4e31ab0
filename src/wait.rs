//! C7: Term Observers. Wait primitives for "term outcome resolved" and
//! "volatile term durably persisted".

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::Notify;

use crate::collab::RaftAlgorithm;
use crate::error::BridgeError;

/// C7. Holds the Raft algorithm handle and the configured timeout for
/// `wait_term_outcome` (spec.md §9, "Timeout on `wait_term_outcome`").
pub struct TermObservers {
    raft: Arc<dyn RaftAlgorithm>,
    term_wait_timeout: Option<Duration>,
}

impl TermObservers {
    pub fn new(raft: Arc<dyn RaftAlgorithm>, term_wait_timeout: Option<Duration>) -> Self {
        TermObservers { raft, term_wait_timeout }
    }

    /// Snapshots `volatile_term` at entry. Suspends until one of: the term
    /// advances past the snapshot (inconclusive, e.g. a split vote), Raft
    /// becomes disabled, or a leader is elected in this term. `cancel`
    /// resolving first returns [`BridgeError::WaitCancelled`]; the observer
    /// slot is attached on entry and detached on every exit path via the
    /// scoped `_subscription` guard (spec.md §4.7).
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    pub async fn wait_term_outcome(&self, mut cancel: oneshot::Receiver<()>) -> Result<(), BridgeError> {
        let entry_volatile_term = self.raft.snapshot().volatile_term;

        if let Some(resolved) = Self::term_outcome(&self.raft, entry_volatile_term) {
            return resolved;
        }

        let notify = Arc::new(Notify::new());
        let waker = notify.clone();
        let _subscription = self.raft.on_update(Box::new(move || waker.notify_one()));

        let body = async {
            loop {
                tokio::select! {
                    _ = notify.notified() => {
                        if let Some(resolved) = Self::term_outcome(&self.raft, entry_volatile_term) {
                            return resolved;
                        }
                    }
                    _ = &mut cancel => return Err(BridgeError::WaitCancelled),
                }
            }
        };

        match self.term_wait_timeout {
            Some(d) => match tokio::time::timeout(d, body).await {
                Ok(res) => res,
                Err(_) => Err(BridgeError::WaitCancelled),
            },
            None => body.await,
        }
    }

    fn term_outcome(raft: &Arc<dyn RaftAlgorithm>, entry_volatile_term: crate::Term) -> Option<Result<(), BridgeError>> {
        let snap = raft.snapshot();
        if !snap.is_enabled {
            return Some(Err(BridgeError::ElectionDisabled));
        }
        if snap.volatile_term > entry_volatile_term {
            return Some(Ok(()));
        }
        if snap.leader.is_some() {
            return Some(Ok(()));
        }
        None
    }

    /// If `term == volatile_term` already, returns immediately. Otherwise
    /// suspends until `term >= snapshot(volatile_term)`. `cancel` resolving
    /// first returns [`BridgeError::WaitCancelled`] (I8).
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    pub async fn wait_term_persisted(&self, mut cancel: oneshot::Receiver<()>) -> Result<(), BridgeError> {
        let snap = self.raft.snapshot();
        if snap.term >= snap.volatile_term {
            return Ok(());
        }
        let target = snap.volatile_term;

        let notify = Arc::new(Notify::new());
        let waker = notify.clone();
        let _subscription = self.raft.on_update(Box::new(move || waker.notify_one()));

        loop {
            tokio::select! {
                _ = notify.notified() => {
                    if self.raft.snapshot().term >= target {
                        return Ok(());
                    }
                }
                _ = &mut cancel => return Err(BridgeError::WaitCancelled),
            }
        }
    }
}
