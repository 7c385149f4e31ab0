//! C4: the Async Worker. A single cooperative task that drains deferred
//! Raft work and drives post-leader-promotion limbo cleanup without
//! blocking the state machine.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use futures::future::AbortHandle;
use futures::future::Abortable;
use tokio::sync::watch;
use tokio::sync::Notify;

use crate::collab::Limbo;
use crate::collab::PromoteQsyncError;
use crate::collab::RaftAlgorithm;
use crate::error::FatalError;
use crate::message::RaftRole;
use crate::metrics::NodeStatus;

tokio::task_local! {
    /// Present only inside the worker's own task. Used to refuse waking the
    /// worker from within its own frame (spec.md §9, "Cooperative worker").
    static IN_WORKER_TASK: ();
}

/// A scoped toggle of the worker's cancellability, restored on all exit
/// paths including unwinding, per spec.md §9 "Non-cancellable window".
pub(crate) struct NonCancellableGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> NonCancellableGuard<'a> {
    pub(crate) fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(false, Ordering::SeqCst);
        NonCancellableGuard { flag }
    }
}

impl<'a> Drop for NonCancellableGuard<'a> {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// C4. Created lazily on first [`AsyncWorker::schedule_async`] call; torn
/// down by dropping the handle without joining (spec.md §4.4, §5).
pub struct AsyncWorker {
    raft: Arc<dyn RaftAlgorithm>,
    limbo: Arc<dyn Limbo>,
    status_rx: watch::Receiver<NodeStatus>,
    has_work: Arc<AtomicBool>,
    cancellable: Arc<AtomicBool>,
    notify: Arc<Notify>,
    abort_handle: Mutex<Option<AbortHandle>>,
}

impl AsyncWorker {
    pub fn new(raft: Arc<dyn RaftAlgorithm>, limbo: Arc<dyn Limbo>, status_rx: watch::Receiver<NodeStatus>) -> Self {
        AsyncWorker {
            raft,
            limbo,
            status_rx,
            has_work: Arc::new(AtomicBool::new(false)),
            cancellable: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
            abort_handle: Mutex::new(None),
        }
    }

    /// The shared cancellability flag, consulted by [`crate::writer::DurableWriter`]
    /// to mask cancellation across a submit-and-wait window.
    pub(crate) fn cancellability(&self) -> Arc<AtomicBool> {
        self.cancellable.clone()
    }

    /// Sets `has_work = true` and wakes the worker, creating it on first
    /// call. Per spec.md §4.4: wakes only if the worker is currently
    /// cancellable, and never wakes it from within its own task (I4).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn schedule_async(self: &Arc<Self>) {
        {
            let mut handle = self.abort_handle.lock().expect("abort handle lock poisoned");
            if handle.is_none() {
                match self.spawn() {
                    Ok(h) => *handle = Some(h),
                    Err(e) => FatalError::WorkerCreation(e).abort(),
                }
            }
        }

        self.has_work.store(true, Ordering::SeqCst);

        if IN_WORKER_TASK.try_with(|_| ()).is_ok() {
            tracing::trace!("schedule_async called from within the worker task, not self-waking");
            return;
        }
        if self.cancellable.load(Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    fn spawn(self: &Arc<Self>) -> Result<AbortHandle, String> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| e.to_string())?;
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let worker = self.clone();
        runtime.spawn(Abortable::new(
            IN_WORKER_TASK.scope((), async move { worker.run().await }),
            abort_registration,
        ));
        Ok(abort_handle)
    }

    async fn run(self: Arc<Self>) {
        loop {
            self.has_work.store(false, Ordering::SeqCst);
            self.raft.process_async().await;
            self.run_post_promotion().await;
            if !self.has_work.load(Ordering::SeqCst) {
                self.notify.notified().await;
            }
        }
    }

    /// §4.9: when the state is leader, invoke `promote_qsync`, retrying
    /// indefinitely on `WaitingForQuorum` until success or cancellation
    /// (cancellation is delivered by aborting the whole worker task, which
    /// interrupts whichever `.await` this loop is suspended on).
    async fn run_post_promotion(&self) {
        if self.status_rx.borrow().state != RaftRole::Leader {
            return;
        }
        loop {
            match self.limbo.promote_qsync().await {
                Ok(()) => return,
                Err(PromoteQsyncError::WaitingForQuorum) => {
                    tracing::debug!("promote_qsync waiting for quorum, retrying");
                    continue;
                }
                Err(other) => {
                    tracing::error!(error = %other, "promote_qsync failed, leaving limbo as-is");
                    return;
                }
            }
        }
    }
}

impl Drop for AsyncWorker {
    /// Teardown: drop the abort handle without joining. The cooperative
    /// runtime is already stopping at this point (spec.md §4.4).
    fn drop(&mut self) {
        if let Some(handle) = self.abort_handle.lock().expect("abort handle lock poisoned").take() {
            handle.abort();
        }
    }
}
