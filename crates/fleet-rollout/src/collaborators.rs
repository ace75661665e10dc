//! Contracts for the external systems the rollout depends on.
//!
//! The control plane only knows these interfaces; the concrete clients
//! (CI job runner, GitOps CLI, traffic mechanisms) live in
//! `fleet-adapters` and are injected as trait objects. Adapter errors
//! surface as `anyhow::Error` and are classified by the strategy layer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use fleet_core::{Cluster, Environment};

/// Job action requested from the CI runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Plan,
    Destroy,
}

impl JobAction {
    fn as_str(self) -> &'static str {
        match self {
            JobAction::Plan => "plan",
            JobAction::Destroy => "destroy",
        }
    }
}

/// Parameter set for a CI job, rendered to the runner's upper-case
/// key/value convention by [`JobParams::to_wire`].
#[derive(Debug, Clone)]
pub struct JobParams {
    pub action: JobAction,
    pub service: String,
    pub tenant: String,
    pub env: Environment,
    pub region: String,
    /// Cluster the job operates on. For blue-green provisioning this
    /// is the green cluster's name, not the blue original.
    pub cluster: String,
    pub upgrade_type: Option<String>,
    pub confirm_destroy: bool,
    pub version: String,
}

impl JobParams {
    /// Plan-action parameters for a cluster of the given name.
    pub fn plan(cluster: &Cluster, job_cluster: &str) -> Self {
        JobParams {
            action: JobAction::Plan,
            service: "eks".to_string(),
            tenant: cluster.tenant.clone(),
            env: cluster.env,
            region: cluster.region.clone(),
            cluster: job_cluster.to_string(),
            upgrade_type: None,
            confirm_destroy: false,
            version: cluster.version.clone(),
        }
    }

    /// Destroy-action parameters for a cluster of the given name.
    pub fn destroy(cluster: &Cluster, job_cluster: &str) -> Self {
        JobParams {
            action: JobAction::Destroy,
            confirm_destroy: true,
            ..JobParams::plan(cluster, job_cluster)
        }
    }

    /// Render to the wire form expected by the job runner.
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("ACTION".to_string(), self.action.as_str().to_string());
        params.insert("SERVICE".to_string(), self.service.clone());
        params.insert("TENANT".to_string(), self.tenant.clone());
        params.insert("ENV".to_string(), self.env.to_string());
        params.insert("REGION".to_string(), self.region.clone());
        params.insert("CLUSTER".to_string(), self.cluster.clone());
        if let Some(upgrade_type) = &self.upgrade_type {
            params.insert("UPGRADE_TYPE".to_string(), upgrade_type.clone());
        }
        if self.confirm_destroy {
            params.insert("CONFIRM_DESTROY".to_string(), "YES".to_string());
        }
        params.insert("VERSION".to_string(), self.version.clone());
        params
    }
}

/// Opaque handle to a triggered job, used to poll for completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

/// Terminal result of a CI job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// Terminal non-success status reported by the runner.
    Failure(String),
}

/// CI job runner contract.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Trigger a job and return a handle to poll.
    async fn trigger_job(&self, name: &str, params: &JobParams) -> anyhow::Result<JobHandle>;

    /// Poll until the job reaches a terminal state. The strategy layer
    /// bounds this call with the configured poll deadline.
    async fn wait_for_completion(&self, handle: &JobHandle) -> anyhow::Result<JobOutcome>;
}

/// GitOps sync tool contract.
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Register a cluster with the GitOps system under the given labels.
    async fn register_cluster(&self, name: &str, labels: &[(String, String)]) -> anyhow::Result<()>;

    /// Trigger a sync of all applications targeting the cluster.
    /// Idempotent; prunes resources no longer in git.
    async fn sync_cluster(&self, name: &str) -> anyhow::Result<()>;

    /// Block until the cluster's applications report healthy. Returns
    /// false if the tool observed a terminal unhealthy state.
    async fn wait_for_apps_healthy(&self, name: &str) -> anyhow::Result<bool>;
}

/// Traffic cutover contract for blue-green upgrades.
#[async_trait]
pub trait TrafficSwitch: Send + Sync {
    /// Move live traffic from the blue cluster to its green replacement.
    async fn switch_to_green(&self, cluster: &Cluster) -> anyhow::Result<()>;

    /// Move traffic back to blue (manual rollback path).
    async fn switch_to_blue(&self, cluster: &Cluster) -> anyhow::Result<()>;
}

/// The collaborator bundle injected into strategies and the orchestrator.
pub struct Collaborators {
    pub jobs: Arc<dyn JobRunner>,
    pub gitops: Arc<dyn GitOps>,
    /// Absent means blue-green cutover is a logged no-op.
    pub traffic: Option<Arc<dyn TrafficSwitch>>,
    /// Upper bound on any single job await or health wait. A stuck
    /// external system fails the upgrade instead of hanging its worker.
    pub poll_deadline: Duration,
}

impl Collaborators {
    pub fn new(jobs: Arc<dyn JobRunner>, gitops: Arc<dyn GitOps>) -> Self {
        Collaborators {
            jobs,
            gitops,
            traffic: None,
            poll_deadline: Duration::from_secs(1800),
        }
    }

    pub fn with_traffic(mut self, traffic: Arc<dyn TrafficSwitch>) -> Self {
        self.traffic = Some(traffic);
        self
    }

    pub fn with_poll_deadline(mut self, deadline: Duration) -> Self {
        self.poll_deadline = deadline;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Environment;

    fn test_cluster() -> Cluster {
        Cluster {
            name: "api-1".to_string(),
            fleet: "payments".to_string(),
            version: "1.29".to_string(),
            is_canary: false,
            tenant: "acme".to_string(),
            env: Environment::Prod,
            region: "us-east-1".to_string(),
        }
    }

    #[test]
    fn plan_params_wire_form() {
        let cluster = test_cluster();
        let mut params = JobParams::plan(&cluster, &cluster.name);
        params.upgrade_type = Some("control-plane".to_string());

        let wire = params.to_wire();
        assert_eq!(wire["ACTION"], "plan");
        assert_eq!(wire["SERVICE"], "eks");
        assert_eq!(wire["TENANT"], "acme");
        assert_eq!(wire["ENV"], "prod");
        assert_eq!(wire["REGION"], "us-east-1");
        assert_eq!(wire["CLUSTER"], "api-1");
        assert_eq!(wire["UPGRADE_TYPE"], "control-plane");
        assert_eq!(wire["VERSION"], "1.29");
        assert!(!wire.contains_key("CONFIRM_DESTROY"));
    }

    #[test]
    fn destroy_params_confirm_flag() {
        let cluster = test_cluster();
        let wire = JobParams::destroy(&cluster, &cluster.name).to_wire();
        assert_eq!(wire["ACTION"], "destroy");
        assert_eq!(wire["CONFIRM_DESTROY"], "YES");
        assert!(!wire.contains_key("UPGRADE_TYPE"));
    }
}
