//! Fixtures for the scenario tests: in-memory mocks of the external
//! collaborators (spec.md §6), in the spirit of the teacher's own
//! `RaftRouter` + `memstore::MemStore`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use async_trait::async_trait;
use raft_bridge::collab::Journal;
use raft_bridge::collab::Limbo;
use raft_bridge::collab::ObserverHandle;
use raft_bridge::collab::PromoteQsyncError;
use raft_bridge::collab::RaftAlgorithm;
use raft_bridge::collab::RaftSnapshot;
use raft_bridge::collab::Relay;
use raft_bridge::collab::ReplicaSet;
use raft_bridge::NodeId;
use raft_bridge::RaftMessage;
use raft_bridge::RaftRequest;
use raft_bridge::Term;

/// Initializes tracing for a test run, the same way the teacher's
/// `fixtures::init_tracing` does.
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::Layer::default().with_ansi(false);
    let subscriber = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A minimal multi-subscriber observer list keyed by id, used by both
/// [`MockRaft`] and [`MockReplicaSet`] to support more than one concurrent
/// `on_update`/`on_quorum_*` registration (the real contract allows several:
/// the central update trigger and any in-flight `wait_term_outcome`/
/// `wait_term_persisted` call each register their own).
#[derive(Default)]
struct ObserverList {
    next_id: AtomicU64,
    slots: Mutex<Vec<(u64, Box<dyn Fn() + Send + Sync>)>>,
}

impl ObserverList {
    fn register(self: &Arc<Self>, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.slots.lock().unwrap().push((id, callback));
        Box::new(ListSubscription {
            id,
            list: Arc::downgrade(self),
        })
    }

    fn fire(&self) {
        let guard = self.slots.lock().unwrap();
        for (_, cb) in guard.iter() {
            cb();
        }
    }

    fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

struct ListSubscription {
    id: u64,
    list: Weak<ObserverList>,
}

impl Drop for ListSubscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.slots.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Mocks the Raft algorithm core (spec.md §6, "consumed" interface).
#[derive(Default)]
pub struct MockRaft {
    snapshot: Mutex<RaftSnapshot>,
    update: Arc<ObserverList>,
    pub resign_count: AtomicU32,
    pub candidate: Mutex<Option<bool>>,
    pub candidate_later: Mutex<Option<bool>>,
    pub election_quorum: AtomicU32,
    pub cluster_size: AtomicU32,
    /// Messages handed to `process_msg`/`process_recovery`, already decoded
    /// by the codec (C1) — used to assert `RaftBridge::process`/`recover`
    /// go through `RaftMessage::from` rather than passing the wire shape
    /// straight through.
    pub processed: Mutex<Vec<(RaftMessage, NodeId)>>,
    pub recovered: Mutex<Vec<RaftMessage>>,
}

impl MockRaft {
    pub fn new(initial: RaftSnapshot) -> Arc<Self> {
        Arc::new(MockRaft {
            snapshot: Mutex::new(initial),
            ..Default::default()
        })
    }

    /// Mutates the snapshot and fires the update trigger, the way the real
    /// Raft core would after any visible attribute change.
    pub fn set_snapshot(&self, f: impl FnOnce(&mut RaftSnapshot)) {
        {
            let mut snap = self.snapshot.lock().unwrap();
            f(&mut snap);
        }
        self.update.fire();
    }

    pub fn on_update_count(&self) -> usize {
        self.update.len()
    }
}

#[async_trait]
impl RaftAlgorithm for MockRaft {
    fn process_msg(&self, message: &RaftMessage, source: NodeId) -> Result<(), String> {
        self.processed.lock().unwrap().push((message.clone(), source));
        Ok(())
    }

    fn process_recovery(&self, message: &RaftMessage) {
        self.recovered.lock().unwrap().push(message.clone());
    }

    async fn process_async(&self) {}

    fn checkpoint_local(&self) -> RaftRequest {
        RaftRequest::default()
    }

    fn checkpoint_remote(&self) -> RaftRequest {
        RaftRequest::default()
    }

    fn cfg_is_candidate(&self, candidate: bool) {
        *self.candidate.lock().unwrap() = Some(candidate);
    }

    fn cfg_is_candidate_later(&self, candidate: bool) {
        *self.candidate_later.lock().unwrap() = Some(candidate);
    }

    fn cfg_is_enabled(&self, _enabled: bool) {}

    fn cfg_election_quorum(&self, quorum: usize) {
        self.election_quorum.store(quorum as u32, Ordering::SeqCst);
    }

    fn cfg_cluster_size(&self, size: usize) {
        self.cluster_size.store(size as u32, Ordering::SeqCst);
    }

    fn resign(&self) {
        self.resign_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_update(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle {
        self.update.register(callback)
    }

    fn snapshot(&self) -> RaftSnapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

/// Mocks a journal that always commits successfully, recording every
/// submitted row.
#[derive(Default)]
pub struct MockJournal {
    pub submitted: Mutex<Vec<RaftRequest>>,
}

#[async_trait]
impl Journal for MockJournal {
    async fn submit(&self, row: RaftRequest) -> anyhow::Result<()> {
        self.submitted.lock().unwrap().push(row);
        Ok(())
    }
}

/// Mocks a per-peer relay, recording every pushed request.
#[derive(Default)]
pub struct MockRelay {
    pub pushed: Mutex<Vec<RaftRequest>>,
}

#[async_trait]
impl Relay for MockRelay {
    async fn push_raft(&self, request: RaftRequest) {
        self.pushed.lock().unwrap().push(request);
    }
}

/// Mocks the replica-set health tracker (spec.md §6, "To replication").
#[derive(Default)]
pub struct MockReplicaSet {
    relays: Mutex<HashMap<NodeId, Arc<MockRelay>>>,
    healthy: AtomicBool,
    gain: Arc<ObserverList>,
    loss: Arc<ObserverList>,
    health_change: Arc<ObserverList>,
}

impl MockReplicaSet {
    pub fn new(peers: &[NodeId]) -> Arc<Self> {
        let set = MockReplicaSet::default();
        *set.relays.lock().unwrap() = peers
            .iter()
            .map(|peer| (*peer, Arc::new(MockRelay::default())))
            .collect();
        Arc::new(set)
    }

    pub fn relay(&self, peer: NodeId) -> Arc<MockRelay> {
        self.relays.lock().unwrap().get(&peer).cloned().expect("unknown peer")
    }

    /// Flips the healthy-quorum flag, firing `on_quorum_gain`/`on_quorum_loss`
    /// only on an actual transition, plus `on_health_change` unconditionally
    /// (mirrors a real health tracker, which would not refire gain/loss for
    /// an unchanged value).
    pub fn set_healthy(&self, healthy: bool) {
        let previous = self.healthy.swap(healthy, Ordering::SeqCst);
        if previous != healthy {
            if healthy {
                self.gain.fire();
            } else {
                self.loss.fire();
            }
        }
        self.health_change.fire();
    }

    pub fn gain_observer_count(&self) -> usize {
        self.gain.len()
    }

    pub fn loss_observer_count(&self) -> usize {
        self.loss.len()
    }
}

impl ReplicaSet for MockReplicaSet {
    fn peers(&self) -> Vec<NodeId> {
        self.relays.lock().unwrap().keys().copied().collect()
    }

    fn relay_for(&self, peer: NodeId) -> Option<Arc<dyn Relay>> {
        self.relays.lock().unwrap().get(&peer).cloned().map(|r| r as Arc<dyn Relay>)
    }

    fn healthy_quorum(&self) -> usize {
        self.relays.lock().unwrap().len() / 2 + 1
    }

    fn has_healthy_quorum(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn registered_count(&self) -> usize {
        self.relays.lock().unwrap().len()
    }

    fn on_quorum_gain(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle {
        self.gain.register(callback)
    }

    fn on_quorum_loss(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle {
        self.loss.register(callback)
    }

    fn on_health_change(&self, callback: Box<dyn Fn() + Send + Sync>) -> ObserverHandle {
        self.health_change.register(callback)
    }
}

/// Mocks the synchronous-transaction limbo (spec.md §6, "To the limbo").
#[derive(Default)]
pub struct MockLimbo {
    fenced: AtomicBool,
    greatest_term: AtomicU64,
    /// Number of times `promote_qsync` should return `WaitingForQuorum`
    /// before it succeeds.
    pending_quorum_waits: AtomicU32,
    pub promote_calls: AtomicU32,
}

impl MockLimbo {
    pub fn new(greatest_term: Term) -> Arc<Self> {
        Arc::new(MockLimbo {
            greatest_term: AtomicU64::new(greatest_term),
            ..Default::default()
        })
    }

    pub fn with_pending_quorum_waits(self: Arc<Self>, count: u32) -> Arc<Self> {
        self.pending_quorum_waits.store(count, Ordering::SeqCst);
        self
    }

    pub fn is_fenced(&self) -> bool {
        self.fenced.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Limbo for MockLimbo {
    fn fence(&self) {
        self.fenced.store(true, Ordering::SeqCst);
    }

    fn unfence(&self) {
        self.fenced.store(false, Ordering::SeqCst);
    }

    fn promote_greatest_term(&self) -> Term {
        self.greatest_term.load(Ordering::SeqCst)
    }

    async fn promote_qsync(&self) -> Result<(), PromoteQsyncError> {
        self.promote_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.pending_quorum_waits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.pending_quorum_waits.fetch_sub(1, Ordering::SeqCst);
            return Err(PromoteQsyncError::WaitingForQuorum);
        }
        Ok(())
    }
}
