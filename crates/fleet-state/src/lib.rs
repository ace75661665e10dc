//! fleet-state — durable upgrade ledger for the fleet rollout control
//! plane.
//!
//! Backed by [redb](https://docs.rs/redb). One record per cluster per
//! tenant/env doubles as the cluster's upgrade lock: a record in
//! `in_progress` younger than the lock timeout means another attempt
//! owns the cluster. There is no explicit unlock; the lock releases
//! when the status leaves `in_progress` or the timeout elapses.
//!
//! redb serializes write transactions, so each lock acquisition is a
//! single atomic read-then-write on the record key. Two concurrent
//! acquisitions for the same key cannot both observe "no record".
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::{UpgradeRecord, UpgradeStatus};
