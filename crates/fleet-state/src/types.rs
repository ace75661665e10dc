//! Persisted record types for the upgrade ledger.

use serde::{Deserialize, Serialize};

use fleet_core::Cluster;

/// Lifecycle status of a cluster upgrade attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStatus {
    /// An attempt holds the lock for this cluster.
    InProgress,
    Success,
    Failed,
}

/// Durable per-cluster upgrade record.
///
/// The sole source of truth for both "is this cluster locked" and
/// "was this cluster already upgraded to version X". Records are never
/// deleted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRecord {
    /// Partition component: `{tenant}#{env}`.
    pub tenant_env: String,
    pub cluster_name: String,
    pub status: UpgradeStatus,
    pub target_version: String,
    /// Epoch seconds when the lock was acquired.
    pub started_at: u64,
    /// Epoch seconds when the attempt reached a terminal status.
    pub completed_at: Option<u64>,
    /// Present only when `status` is `Failed`.
    pub error: Option<String>,
}

impl UpgradeRecord {
    /// Fresh in-progress record for a new upgrade attempt.
    pub fn begin(cluster: &Cluster, now: u64) -> Self {
        UpgradeRecord {
            tenant_env: cluster.state_partition(),
            cluster_name: cluster.name.clone(),
            status: UpgradeStatus::InProgress,
            target_version: cluster.version.clone(),
            started_at: now,
            completed_at: None,
            error: None,
        }
    }

    /// Build the composite key for the upgrades table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.tenant_env, self.cluster_name)
    }

    /// The table key for a cluster's record.
    pub fn key_for(cluster: &Cluster) -> String {
        format!("{}/{}", cluster.state_partition(), cluster.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Environment;

    #[test]
    fn begin_sets_lock_fields() {
        let cluster = Cluster {
            name: "api-1".to_string(),
            fleet: "payments".to_string(),
            version: "1.29".to_string(),
            is_canary: false,
            tenant: "acme".to_string(),
            env: Environment::Prod,
            region: "us-east-1".to_string(),
        };

        let record = UpgradeRecord::begin(&cluster, 1_700_000_000);
        assert_eq!(record.status, UpgradeStatus::InProgress);
        assert_eq!(record.target_version, "1.29");
        assert_eq!(record.started_at, 1_700_000_000);
        assert_eq!(record.completed_at, None);
        assert_eq!(record.error, None);
        assert_eq!(record.table_key(), "acme#prod/api-1");
        assert_eq!(UpgradeRecord::key_for(&cluster), "acme#prod/api-1");
    }
}
