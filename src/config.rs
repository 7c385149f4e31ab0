//! Runtime configuration, built and validated the way the teacher's own
//! `Config` is: a plain builder followed by an explicit `validate` step,
//! then wrapped in an `Arc` and threaded through every component.

use std::sync::Arc;
use std::time::Duration;

use crate::election::ElectionMode;

/// Configuration knobs for a [`crate::RaftBridge`] instance.
#[derive(Clone, Debug)]
pub struct Config {
    /// Identifies the cluster in logs; has no protocol meaning.
    pub cluster_name: String,

    /// Upper bound on how long [`crate::wait::wait_term_outcome`] may
    /// suspend before returning a timeout. `None` (the default) preserves
    /// the source's documented-risky unbounded behavior: an all-voter
    /// cluster that never elects a leader will hang callers forever
    /// (spec.md §9, "Timeout on `wait_term_outcome`").
    pub term_wait_timeout: Option<Duration>,

    /// The election mode in effect immediately after `RaftBridge::init`,
    /// before any call to `set_election_mode`. Defaults to
    /// `ElectionMode::Invalid`, the "not yet configured" sentinel.
    pub initial_election_mode: ElectionMode,

    /// Whether leader fencing on quorum loss is enabled by default.
    pub fencing_enabled: bool,
}

/// Builder for [`Config`]. Mirrors the teacher's `Config::build(name)`.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    cluster_name: String,
    term_wait_timeout: Option<Duration>,
    initial_election_mode: ElectionMode,
    fencing_enabled: bool,
}

/// Errors surfaced by [`ConfigBuilder::validate`].
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("cluster_name must not be empty")]
    EmptyClusterName,
}

impl Config {
    /// Starts a new builder, mirroring `Config::build(cluster_name)`.
    pub fn build(cluster_name: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            cluster_name: cluster_name.into(),
            term_wait_timeout: None,
            initial_election_mode: ElectionMode::Invalid,
            fencing_enabled: true,
        }
    }
}

impl ConfigBuilder {
    pub fn term_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.term_wait_timeout = timeout;
        self
    }

    pub fn initial_election_mode(mut self, mode: ElectionMode) -> Self {
        self.initial_election_mode = mode;
        self
    }

    pub fn fencing_enabled(mut self, enabled: bool) -> Self {
        self.fencing_enabled = enabled;
        self
    }

    /// Validates and finalizes the configuration.
    pub fn validate(self) -> Result<Arc<Config>, ConfigError> {
        if self.cluster_name.trim().is_empty() {
            return Err(ConfigError::EmptyClusterName);
        }
        Ok(Arc::new(Config {
            cluster_name: self.cluster_name,
            term_wait_timeout: self.term_wait_timeout,
            initial_election_mode: self.initial_election_mode,
            fencing_enabled: self.fencing_enabled,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_cluster_name() {
        let err = Config::build("   ").validate().unwrap_err();
        assert_eq!(err, ConfigError::EmptyClusterName);
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::build("test-cluster").validate().unwrap();
        assert_eq!(cfg.term_wait_timeout, None);
        assert_eq!(cfg.initial_election_mode, ElectionMode::Invalid);
        assert!(cfg.fencing_enabled);
    }
}
