//! StateStore — redb-backed upgrade ledger.
//!
//! Lock acquisition, idempotence checks, and outcome bookkeeping all
//! go through the single record per cluster. Every mutation runs in
//! one redb write transaction, which redb serializes, so concurrent
//! acquisitions for the same key linearize on the store rather than
//! on caller discipline.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::{debug, info, warn};

use fleet_core::Cluster;

use crate::error::{StateError, StateResult};
use crate::tables::UPGRADES;
use crate::types::{UpgradeRecord, UpgradeStatus};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe upgrade ledger backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    lock_timeout: Duration,
}

impl StateStore {
    /// Open (or create) a persistent ledger at the given path.
    pub fn open(path: &Path, lock_timeout: Duration) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            lock_timeout,
        };
        store.ensure_tables()?;
        debug!(?path, timeout_secs = lock_timeout.as_secs(), "upgrade ledger opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory ledger (for testing).
    pub fn open_in_memory(lock_timeout: Duration) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            lock_timeout,
        };
        store.ensure_tables()?;
        debug!("in-memory upgrade ledger opened");
        Ok(store)
    }

    /// Create the upgrades table if it doesn't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(UPGRADES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// True iff the cluster already has a `Success` record for its
    /// target version. Makes re-runs idempotent: such a cluster is
    /// skipped entirely, including its lock attempt.
    pub fn already_succeeded(&self, cluster: &Cluster) -> StateResult<bool> {
        Ok(self
            .get_record(cluster)?
            .is_some_and(|r| r.status == UpgradeStatus::Success && r.target_version == cluster.version))
    }

    /// Acquire the upgrade lock for a cluster by writing a fresh
    /// `in_progress` record.
    ///
    /// Fails with [`StateError::LockHeld`] if an `in_progress` record
    /// younger than the lock timeout exists. An older `in_progress`
    /// record is a stale lock and is overwritten: a liveness trade-off
    /// that favors forward progress after a crash over strict mutual
    /// exclusion against a merely-slow holder. Terminal records
    /// (`success`, `failed`) are always overwritten.
    pub fn acquire_lock(&self, cluster: &Cluster) -> StateResult<()> {
        self.acquire_lock_at(cluster, epoch_secs())
    }

    fn acquire_lock_at(&self, cluster: &Cluster, now: u64) -> StateResult<()> {
        let key = UpgradeRecord::key_for(cluster);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(UPGRADES).map_err(map_err!(Table))?;

            let existing = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(
                    serde_json::from_slice::<UpgradeRecord>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };

            if let Some(record) = existing {
                if record.status == UpgradeStatus::InProgress {
                    let age = now.saturating_sub(record.started_at);
                    if age < self.lock_timeout.as_secs() {
                        // Transaction is dropped without commit; nothing written.
                        return Err(StateError::LockHeld { key, age_secs: age });
                    }
                    warn!(%key, age_secs = age, "stale lock detected, overriding");
                }
            }

            let record = UpgradeRecord::begin(cluster, now);
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%key, version = %cluster.version, "lock acquired");
        Ok(())
    }

    /// Record a successful upgrade. Must be called only by the holder
    /// of the lock just acquired for this attempt; releases the lock.
    pub fn mark_success(&self, cluster: &Cluster) -> StateResult<()> {
        info!(cluster = %cluster.identifier(), "marking upgrade as success");
        self.finish(cluster, |record, now| {
            record.status = UpgradeStatus::Success;
            record.completed_at = Some(now);
            record.error = None;
        })
    }

    /// Record a failed upgrade with its error message; releases the lock.
    pub fn mark_failure(&self, cluster: &Cluster, error_message: &str) -> StateResult<()> {
        info!(cluster = %cluster.identifier(), error = error_message, "marking upgrade as failed");
        self.finish(cluster, |record, now| {
            record.status = UpgradeStatus::Failed;
            record.completed_at = Some(now);
            record.error = Some(error_message.to_string());
        })
    }

    /// Read-modify-write the cluster's record in one write transaction.
    fn finish(
        &self,
        cluster: &Cluster,
        apply: impl FnOnce(&mut UpgradeRecord, u64),
    ) -> StateResult<()> {
        let key = UpgradeRecord::key_for(cluster);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(UPGRADES).map_err(map_err!(Table))?;

            let mut record = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => serde_json::from_slice::<UpgradeRecord>(guard.value())
                    .map_err(map_err!(Deserialize))?,
                None => return Err(StateError::NotFound(key)),
            };

            apply(&mut record, epoch_secs());

            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a cluster's upgrade record, if any.
    pub fn get_record(&self, cluster: &Cluster) -> StateResult<Option<UpgradeRecord>> {
        let key = UpgradeRecord::key_for(cluster);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(UPGRADES).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: UpgradeRecord = serde_json::from_slice(guard.value())
                    .map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// Current time as epoch seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
