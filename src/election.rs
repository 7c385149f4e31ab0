//! C5: the Election-Mode Controller. Translates a user-selected
//! [`ElectionMode`] into Raft "is-candidate" / "is-enabled" configuration,
//! accounting for the node's current role.

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use crate::collab::ObserverHandle;
use crate::collab::RaftAlgorithm;
use crate::collab::ReplicaSet;
use crate::message::RaftRole;
use crate::quorum::QuorumFencingController;

/// A user-selected election mode (EM in the data model), plus the invalid
/// sentinel meaning "not yet configured". Transitions are imposed by the
/// user; see [`ElectionModeController::set_mode`] for the derivation of
/// Raft config from a mode and the current role.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElectionMode {
    Off,
    Voter,
    Manual,
    Candidate,
    /// Not yet configured.
    Invalid,
}

impl ElectionMode {
    fn to_u8(self) -> u8 {
        match self {
            ElectionMode::Off => 0,
            ElectionMode::Voter => 1,
            ElectionMode::Manual => 2,
            ElectionMode::Candidate => 3,
            ElectionMode::Invalid => 4,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ElectionMode::Off,
            1 => ElectionMode::Voter,
            2 => ElectionMode::Manual,
            3 => ElectionMode::Candidate,
            _ => ElectionMode::Invalid,
        }
    }

    /// Whether quorum observers may be installed while in this mode
    /// (spec.md §4.6, "observers must not be installed in these modes" for
    /// off/voter).
    pub(crate) fn installs_quorum_observers(self) -> bool {
        matches!(self, ElectionMode::Manual | ElectionMode::Candidate)
    }
}

/// Shared, lock-free storage for the current [`ElectionMode`], read by both
/// the election-mode controller and the quorum/fencing controller.
pub(crate) struct ModeCell(AtomicU8);

impl ModeCell {
    pub(crate) fn new(initial: ElectionMode) -> Self {
        ModeCell(AtomicU8::new(initial.to_u8()))
    }

    pub(crate) fn get(&self) -> ElectionMode {
        ElectionMode::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, mode: ElectionMode) {
        self.0.store(mode.to_u8(), Ordering::SeqCst);
    }
}

/// C5. Owns the quorum-observer registrations it installs on `replicas` and
/// routes them to the `quorum` controller, per spec.md §4.5-§4.6.
pub struct ElectionModeController {
    raft: Arc<dyn RaftAlgorithm>,
    replicas: Arc<dyn ReplicaSet>,
    quorum: Arc<QuorumFencingController>,
    mode: Arc<ModeCell>,
    observers: Mutex<Vec<ObserverHandle>>,
}

impl ElectionModeController {
    pub fn new(
        raft: Arc<dyn RaftAlgorithm>,
        replicas: Arc<dyn ReplicaSet>,
        quorum: Arc<QuorumFencingController>,
        mode: Arc<ModeCell>,
    ) -> Self {
        ElectionModeController {
            raft,
            replicas,
            quorum,
            mode,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn current_mode(&self) -> ElectionMode {
        self.mode.get()
    }

    /// §4.5. No-op if `new` equals the current mode.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn set_mode(&self, new: ElectionMode) {
        let current = self.mode.get();
        if current == new {
            return;
        }
        let was_candidate_or_leader = {
            let snap = self.raft.snapshot();
            matches!(snap.state, RaftRole::Candidate | RaftRole::Leader)
        };

        match new {
            ElectionMode::Off => {
                self.remove_quorum_observers();
                self.raft.cfg_is_candidate(false);
                self.raft.cfg_is_enabled(false);
            }
            ElectionMode::Voter => {
                self.remove_quorum_observers();
                self.raft.cfg_is_candidate(false);
                self.raft.cfg_is_enabled(true);
            }
            ElectionMode::Manual => {
                self.install_quorum_observers();
                if was_candidate_or_leader {
                    self.raft.cfg_is_candidate_later(false);
                } else {
                    self.raft.cfg_is_candidate(false);
                }
                self.raft.cfg_is_enabled(true);
            }
            ElectionMode::Candidate => {
                self.install_quorum_observers();
                if self.replicas.has_healthy_quorum() {
                    self.raft.cfg_is_candidate(true);
                }
                self.raft.cfg_is_enabled(true);
            }
            ElectionMode::Invalid => {
                // A caller re-selecting "not configured" is a programmer
                // error; there is no Raft config to derive from it.
                tracing::warn!("set_mode(Invalid) is a no-op beyond updating the stored mode");
                self.remove_quorum_observers();
            }
        }

        self.mode.set(new);
    }

    fn install_quorum_observers(&self) {
        let mut observers = self.observers.lock().expect("observers lock poisoned");
        if !observers.is_empty() {
            return;
        }
        let quorum = self.quorum.clone();
        let gain_handle = self.replicas.on_quorum_gain(Box::new(move || {
            quorum.notify_have_quorum(true);
        }));
        let quorum = self.quorum.clone();
        let loss_handle = self.replicas.on_quorum_loss(Box::new(move || {
            quorum.notify_have_quorum(false);
        }));
        observers.push(gain_handle);
        observers.push(loss_handle);
    }

    fn remove_quorum_observers(&self) {
        self.observers.lock().expect("observers lock poisoned").clear();
    }
}
