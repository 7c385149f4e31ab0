//! C6: the Quorum/Fencing Controller. Reacts to quorum gain/loss by
//! enabling candidacy or fencing the leader, and manages the
//! "fencing paused" latch used during replica-set bootstrap.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::collab::Limbo;
use crate::collab::RaftAlgorithm;
use crate::election::ElectionMode;
use crate::election::ModeCell;
use crate::message::RaftRole;

/// C6. Both quorum-gain and quorum-loss observer entry points are routed
/// here, into [`QuorumFencingController::notify_have_quorum`] (spec.md
/// §4.6).
pub struct QuorumFencingController {
    raft: Arc<dyn RaftAlgorithm>,
    limbo: Arc<dyn Limbo>,
    mode: Arc<ModeCell>,
    /// User policy; defaults to true.
    fencing_enabled: AtomicBool,
    /// Latched true on replica-set growth, cleared on first quorum gain
    /// observed after the latch.
    fencing_paused: AtomicBool,
}

impl QuorumFencingController {
    pub fn new(
        raft: Arc<dyn RaftAlgorithm>,
        limbo: Arc<dyn Limbo>,
        mode: Arc<ModeCell>,
        fencing_enabled: bool,
    ) -> Self {
        QuorumFencingController {
            raft,
            limbo,
            mode,
            fencing_enabled: AtomicBool::new(fencing_enabled),
            fencing_paused: AtomicBool::new(false),
        }
    }

    /// The single handler both `on_quorum_gain` and `on_quorum_loss` route
    /// to, distinguished by `has_quorum`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn notify_have_quorum(&self, has_quorum: bool) {
        match self.mode.get() {
            ElectionMode::Manual => {
                // Quorum loss may still trigger fencing, but candidacy is
                // never touched in manual mode: the user controls it.
                if has_quorum {
                    self.resume_fencing_if_latched();
                } else {
                    self.fence();
                }
            }
            ElectionMode::Candidate => {
                if has_quorum {
                    self.resume_fencing_if_latched();
                    self.raft.cfg_is_candidate(true);
                } else {
                    let snap = self.raft.snapshot();
                    if matches!(snap.state, RaftRole::Candidate | RaftRole::Leader) {
                        self.fence();
                        self.raft.cfg_is_candidate_later(false);
                    } else {
                        self.raft.cfg_is_candidate(false);
                    }
                }
            }
            mode @ (ElectionMode::Off | ElectionMode::Voter) => {
                panic!(
                    "notify_have_quorum fired in {:?} mode: quorum observers must never be installed in off/voter mode",
                    mode
                );
            }
            ElectionMode::Invalid => {
                tracing::error!("notify_have_quorum fired before an election mode was configured");
            }
        }
    }

    /// Resigns leadership and freezes the limbo, but only when Raft is
    /// enabled, this node is leader, fencing is enabled, and fencing is not
    /// paused (spec.md §4.6). A no-op otherwise, including — per I7 —
    /// whenever `fencing_paused` is true, regardless of any other input.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn fence(&self) {
        if self.fencing_paused.load(Ordering::SeqCst) {
            return;
        }
        if !self.fencing_enabled.load(Ordering::SeqCst) {
            return;
        }
        let snap = self.raft.snapshot();
        if !snap.is_enabled || snap.state != RaftRole::Leader {
            return;
        }
        self.raft.resign();
        self.limbo.fence();
    }

    pub fn unfence(&self) {
        self.limbo.unfence();
    }

    /// Updates the fencing policy; when disabling, immediately unfences the
    /// limbo (spec.md §4.10, `set_election_fencing_enabled`). I6.
    pub fn set_fencing_enabled(&self, enabled: bool) {
        self.fencing_enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.unfence();
        }
    }

    pub fn fencing_enabled(&self) -> bool {
        self.fencing_enabled.load(Ordering::SeqCst)
    }

    /// Latches `fencing_paused = true`, invoked by the replica-set
    /// collaborator whenever the replica set is extended.
    pub fn pause_fencing(&self) {
        self.fencing_paused.store(true, Ordering::SeqCst);
    }

    pub fn fencing_paused(&self) -> bool {
        self.fencing_paused.load(Ordering::SeqCst)
    }

    fn resume_fencing_if_latched(&self) {
        self.fencing_paused.store(false, Ordering::SeqCst);
    }
}
