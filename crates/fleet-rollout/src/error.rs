//! Rollout error taxonomy.
//!
//! Tagged kinds replace exception-hierarchy control flow: the
//! orchestrator matches on variants to decide between skip, yield, and
//! abort. Only two recoveries exist anywhere — "already succeeded →
//! skip" and "stale lock → override" (the latter inside the state
//! store); every other failure aborts the current fleet's rollout.

use thiserror::Error;

use fleet_core::ConfigError;
use fleet_state::StateError;

/// Result type alias for rollout operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Errors that can occur while orchestrating a rollout.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// Fatal, pre-flight. Nothing has been mutated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fleet or cluster shape is invalid. Fatal before any upgrade.
    #[error("validation error: {0}")]
    Validation(String),

    /// A strategy step failed. Always recorded as `Failed` in the
    /// state store before propagating.
    #[error("upgrade failed for {cluster}: {reason}")]
    UpgradeFailed { cluster: String, reason: String },

    /// State store failure, including `LockHeld` (recoverable at the
    /// caller: the cluster belongs to whoever holds the lock).
    #[error(transparent)]
    State(#[from] StateError),

    /// A wave worker task panicked.
    #[error("upgrade task failed to complete: {0}")]
    Join(String),
}

impl RolloutError {
    /// Shorthand for a strategy step failure.
    pub fn upgrade_failed(cluster: &fleet_core::Cluster, reason: impl Into<String>) -> Self {
        RolloutError::UpgradeFailed {
            cluster: cluster.identifier(),
            reason: reason.into(),
        }
    }

    /// True iff this error means another attempt owns the cluster.
    pub fn is_lock_held(&self) -> bool {
        matches!(self, RolloutError::State(StateError::LockHeld { .. }))
    }
}
