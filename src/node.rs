//! C8 Lifecycle and C9 Public Surface: the process-wide `RaftBridge`
//! instance, the central update-trigger reactor (spec.md §4.8), and the
//! operations callers and the Raft core invoke on this layer.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::oneshot;
use tokio::sync::watch;
use tracing_futures::Instrument;

use crate::collab::Journal;
use crate::collab::Limbo;
use crate::collab::ObserverHandle;
use crate::collab::RaftAlgorithm;
use crate::collab::ReplicaSet;
use crate::config::Config;
use crate::election::ElectionMode;
use crate::election::ElectionModeController;
use crate::election::ModeCell;
use crate::error::BridgeError;
use crate::message::RaftMessage;
use crate::message::RaftRequest;
use crate::message::RaftRole;
use crate::metrics::ElectionEvent;
use crate::metrics::NodeStatus;
use crate::metrics::Wait;
use crate::pubsub::Subscribers;
use crate::pubsub::Subscription;
use crate::quorum::QuorumFencingController;
use crate::wait::TermObservers;
use crate::worker::AsyncWorker;
use crate::writer::DurableWriter;
use crate::MessageSummary;
use crate::NodeId;

struct Inner {
    raft: Arc<dyn RaftAlgorithm>,
    replicas: Arc<dyn ReplicaSet>,
    limbo: Arc<dyn Limbo>,
    writer: DurableWriter,
    worker: Arc<AsyncWorker>,
    election: ElectionModeController,
    quorum: Arc<QuorumFencingController>,
    term_observers: TermObservers,
    status_tx: watch::Sender<NodeStatus>,
    status_rx: watch::Receiver<NodeStatus>,
    on_broadcast: Subscribers<()>,
    on_election_event: Subscribers<ElectionEvent>,
    /// Keeps the update-trigger registration alive for the bridge's
    /// lifetime; dropped (detaching it) on teardown.
    update_subscription: StdMutex<Option<ObserverHandle>>,
}

/// The process-wide handle to this layer (spec.md §9, "Global singleton").
///
/// Cheap to clone, like the teacher's `Raft<D, R, N, S>`: every clone shares
/// the same underlying state. A single instance is created by
/// [`RaftBridge::init`] and published to the module-scoped [`GLOBAL`] slot;
/// [`RaftBridge::current`] is the sentinel-checked accessor that fails
/// loudly (`BridgeError::NotInitialized`) on use-before-init or
/// use-after-teardown, rather than panicking or silently no-oping.
#[derive(Clone)]
pub struct RaftBridge {
    inner: Arc<Inner>,
}

static GLOBAL: StdMutex<Option<RaftBridge>> = StdMutex::new(None);

/// The capability record the concrete `RaftAlgorithm` implementation holds
/// and invokes whenever it needs to persist a message, broadcast one, or
/// defer work off the state machine: `write` (C2), `broadcast` (C3), and
/// `schedule_async` (C4) (spec.md §6, "provided by this layer via a
/// v-table"; §9 "V-table callbacks").
///
/// The Raft algorithm core is an external collaborator out of scope for
/// this crate (spec.md §1): it is constructed by the caller, not by
/// `RaftBridge`. Wiring this record into that implementation — typically by
/// handing it to the implementation's own constructor, or to a setter if
/// the implementation needs to exist before the bridge does — is the
/// caller's responsibility. `RaftCallbacks` is cheap to clone; every clone
/// shares the same writer, broadcaster, and worker.
#[derive(Clone)]
pub struct RaftCallbacks {
    inner: Arc<Inner>,
}

impl RaftCallbacks {
    /// C2: persist `message` durably before the Raft core proceeds.
    pub async fn write(&self, message: &RaftMessage) {
        self.inner.writer.write(message).await;
    }

    /// C3: fan `request` out to every peer's relay, in replica-set order,
    /// then fire the `on_broadcast` observers (I2).
    #[tracing::instrument(level = "debug", skip(self, request), fields(msg = %request.summary()))]
    pub async fn broadcast(&self, request: &RaftRequest) {
        for peer in self.inner.replicas.peers() {
            if let Some(relay) = self.inner.replicas.relay_for(peer) {
                let span = tracing::debug_span!("CH");
                relay.push_raft(request.clone()).instrument(span).await;
            }
        }
        self.inner.on_broadcast.notify(&());
    }

    /// C4: defer work to the async worker, creating it on first call.
    pub fn schedule_async(&self) {
        self.inner.worker.schedule_async();
    }
}

/// C8: the central reactor, fired by the Raft core whenever any visible
/// attribute changes. Runs synchronously to completion and must not
/// suspend (spec.md §5); anything that could suspend is handed to the
/// worker in step 4.
fn on_update(inner: &Arc<Inner>) {
    let snapshot = inner.raft.snapshot();
    let status = NodeStatus::from(&snapshot);

    // 1. Update the read-only status summary as soon as possible.
    let _ = inner.status_tx.send(status.clone());

    // 2. Broadcast an election-status event to subscribers.
    inner.on_election_event.notify(&ElectionEvent::from(&status));

    // 3. A higher term than the limbo has ever promoted under invalidates
    //    any in-flight synchronous transaction finalization (I3).
    if snapshot.volatile_term > inner.limbo.promote_greatest_term() {
        inner.limbo.fence();
    }

    // 4. Becoming leader means the limbo needs clearing; that work can
    //    suspend (quorum retries), so it is handed to the worker.
    if snapshot.state == RaftRole::Leader {
        inner.worker.schedule_async();
    }
}

fn install_update_trigger(inner: &Arc<Inner>) -> ObserverHandle {
    let weak = Arc::downgrade(inner);
    inner.raft.on_update(Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            on_update(&inner);
        }
    }))
}

impl RaftBridge {
    /// Initializes the global Raft instance (spec.md §3, "Lifecycles"; §8
    /// C8). Installs the update trigger and applies `config`'s
    /// `initial_election_mode` through the same transition logic as
    /// [`RaftBridge::set_election_mode`].
    #[tracing::instrument(level = "debug", skip_all, fields(cluster = %config.cluster_name))]
    pub fn init(
        config: Arc<Config>,
        raft: Arc<dyn RaftAlgorithm>,
        journal: Arc<dyn Journal>,
        replicas: Arc<dyn ReplicaSet>,
        limbo: Arc<dyn Limbo>,
    ) -> RaftBridge {
        let (status_tx, status_rx) = watch::channel(NodeStatus::default());

        let worker = Arc::new(AsyncWorker::new(raft.clone(), limbo.clone(), status_rx.clone()));
        let writer = DurableWriter::new(journal, worker.cancellability());

        let mode = Arc::new(ModeCell::new(ElectionMode::Invalid));
        let quorum = Arc::new(QuorumFencingController::new(
            raft.clone(),
            limbo.clone(),
            mode.clone(),
            config.fencing_enabled,
        ));
        let election = ElectionModeController::new(raft.clone(), replicas.clone(), quorum.clone(), mode);
        let term_observers = TermObservers::new(raft.clone(), config.term_wait_timeout);

        let inner = Arc::new(Inner {
            raft,
            replicas,
            limbo,
            writer,
            worker,
            election,
            quorum,
            term_observers,
            status_tx,
            status_rx,
            on_broadcast: Subscribers::new(),
            on_election_event: Subscribers::new(),
            update_subscription: StdMutex::new(None),
        });

        let subscription = install_update_trigger(&inner);
        *inner
            .update_subscription
            .lock()
            .expect("update subscription lock poisoned") = Some(subscription);

        let bridge = RaftBridge { inner };
        bridge.inner.election.set_mode(config.initial_election_mode);

        *GLOBAL.lock().expect("raft bridge global lock poisoned") = Some(bridge.clone());
        bridge
    }

    /// Tears down the global Raft instance: drops the update-trigger
    /// subscription, drops the worker handle without joining it (the
    /// cooperative runtime is already stopping), and invalidates the
    /// sentinel so subsequent [`RaftBridge::current`] calls fail loudly
    /// (spec.md §3, §4.4).
    pub fn teardown() {
        let prev = GLOBAL.lock().expect("raft bridge global lock poisoned").take();
        drop(prev);
    }

    /// The sentinel-checked accessor for the module-scoped global instance.
    pub fn current() -> Result<RaftBridge, BridgeError> {
        GLOBAL
            .lock()
            .expect("raft bridge global lock poisoned")
            .clone()
            .ok_or(BridgeError::NotInitialized)
    }

    /// The capability record to wire into the concrete `RaftAlgorithm`
    /// implementation (see [`RaftCallbacks`]).
    pub fn callbacks(&self) -> RaftCallbacks {
        RaftCallbacks {
            inner: self.inner.clone(),
        }
    }

    /// The most recently published read-only status summary.
    pub fn status(&self) -> NodeStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// A waitable handle over the status stream (mirrors the teacher's
    /// `Raft::wait()`).
    pub fn wait(&self) -> Wait {
        Wait::new(self.inner.status_rx.clone())
    }

    /// Registers for the `on_broadcast` public event (spec.md §6): fires
    /// after every outbound Raft broadcast, payload is nil.
    pub fn on_broadcast<F>(&self, callback: F) -> Subscription<()>
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.inner.on_broadcast.register(callback)
    }

    /// Registers for the election-status event fired by the update trigger
    /// (spec.md §4.8 step 2; payload shape per `SPEC_FULL.md` A2).
    pub fn on_election_event<F>(&self, callback: F) -> Subscription<ElectionEvent>
    where
        F: Fn(&ElectionEvent) + Send + Sync + 'static,
    {
        self.inner.on_election_event.register(callback)
    }

    /// Replays a persisted Raft record during recovery: codec (C1) then
    /// `raft_process_recovery`. Never fails from here (spec.md §4.10).
    #[tracing::instrument(level = "debug", skip(self, request), fields(term = request.term))]
    pub fn recover(&self, request: &RaftRequest) {
        self.inner.raft.process_recovery(&RaftMessage::from(request));
    }

    /// The subset of Raft state that must be snapshotted in the local
    /// image.
    pub fn checkpoint_local(&self) -> RaftRequest {
        self.inner.raft.checkpoint_local()
    }

    /// The subset of Raft state sent to a joining replica.
    pub fn checkpoint_remote(&self) -> RaftRequest {
        self.inner.raft.checkpoint_remote()
    }

    /// Ingests a peer's Raft message: codec (C1) then `raft_process_msg`.
    /// Returns the core's accept/reject result (spec.md §4.10, §7, §2
    /// "inbound peer messages enter via C9 → C1 → Raft core").
    #[tracing::instrument(level = "debug", skip(self, request), fields(term = request.term, source))]
    pub fn process(&self, request: &RaftRequest, source: NodeId) -> Result<(), BridgeError> {
        self.inner
            .raft
            .process_msg(&RaftMessage::from(request), source)
            .map_err(BridgeError::RaftRejected)
    }

    /// §4.5. No-op if `mode` equals the current mode.
    pub fn set_election_mode(&self, mode: ElectionMode) {
        self.inner.election.set_mode(mode);
    }

    pub fn election_mode(&self) -> ElectionMode {
        self.inner.election.current_mode()
    }

    /// Updates the fencing policy. When disabling, immediately unfences the
    /// limbo (I6). When (re-)enabling while the replica set currently lacks
    /// a healthy quorum, re-evaluates fencing immediately rather than
    /// waiting for the next quorum-loss observer callback, which is the
    /// sense in which this "notifies the health subsystem to re-evaluate"
    /// (spec.md §4.10).
    pub fn set_election_fencing_enabled(&self, enabled: bool) {
        self.inner.quorum.set_fencing_enabled(enabled);
        if enabled && !self.inner.replicas.has_healthy_quorum() {
            self.inner.quorum.fence();
        }
    }

    pub fn election_fencing_enabled(&self) -> bool {
        self.inner.quorum.fencing_enabled()
    }

    /// Latches `fencing_paused = true`. Invoked by the replica-set
    /// collaborator whenever the replica set is extended (spec.md §4.6).
    pub fn election_fencing_pause(&self) {
        self.inner.quorum.pause_fencing();
    }

    /// Recomputes and pushes the election quorum (healthy-quorum size) and
    /// the cluster size (`max(registered, 1)`) to the Raft core.
    pub fn update_election_quorum(&self) {
        let quorum = self.inner.replicas.healthy_quorum();
        let cluster_size = self.inner.replicas.registered_count().max(1);
        self.inner.raft.cfg_election_quorum(quorum);
        self.inner.raft.cfg_cluster_size(cluster_size);
    }

    /// C7: suspends until the term outcome at entry resolves, Raft is
    /// disabled, or `cancel` resolves first.
    pub async fn wait_term_outcome(&self, cancel: oneshot::Receiver<()>) -> Result<(), BridgeError> {
        self.inner.term_observers.wait_term_outcome(cancel).await
    }

    /// C7: suspends until the term snapshotted at entry is durable, or
    /// `cancel` resolves first (I8).
    pub async fn wait_term_persisted(&self, cancel: oneshot::Receiver<()>) -> Result<(), BridgeError> {
        self.inner.term_observers.wait_term_persisted(cancel).await
    }
}
