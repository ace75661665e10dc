//! Error types for the upgrade ledger.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("no upgrade record for {0}")]
    NotFound(String),

    /// The cluster has an in-progress upgrade younger than the lock
    /// timeout. Recoverable at the caller: yield the cluster to the
    /// current holder, do not mark failure.
    #[error("cluster {key} is locked by an upgrade in progress (age {age_secs}s)")]
    LockHeld { key: String, age_secs: u64 },
}
