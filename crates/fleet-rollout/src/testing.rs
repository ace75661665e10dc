//! Mock collaborators shared by strategy and orchestrator tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;

use fleet_core::{Cluster, Environment};

use crate::collaborators::{GitOps, JobHandle, JobOutcome, JobParams, JobRunner, TrafficSwitch};

pub(crate) fn test_cluster(name: &str, env: Environment, is_canary: bool) -> Cluster {
    Cluster {
        name: name.to_string(),
        fleet: "payments".to_string(),
        version: "1.29".to_string(),
        is_canary,
        tenant: "acme".to_string(),
        env,
        region: "us-east-1".to_string(),
    }
}

/// Records every triggered job; completion can be failed per cluster
/// or made to hang forever.
#[derive(Default)]
pub(crate) struct MockJobRunner {
    pub calls: Mutex<Vec<BTreeMap<String, String>>>,
    fail_clusters: Mutex<HashSet<String>>,
    hang: bool,
}

impl MockJobRunner {
    pub fn hanging() -> Self {
        MockJobRunner {
            hang: true,
            ..Default::default()
        }
    }

    /// Jobs targeting this cluster finish with a failure status.
    pub fn fail_cluster(&self, name: &str) {
        self.fail_clusters.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl JobRunner for MockJobRunner {
    async fn trigger_job(&self, name: &str, params: &JobParams) -> anyhow::Result<JobHandle> {
        let wire = params.to_wire();
        let handle = JobHandle(format!("{name}/{}/{}", wire["ACTION"], wire["CLUSTER"]));
        self.calls.lock().unwrap().push(wire);
        Ok(handle)
    }

    async fn wait_for_completion(&self, handle: &JobHandle) -> anyhow::Result<JobOutcome> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        let cluster = handle.0.rsplit('/').next().unwrap_or_default();
        if self.fail_clusters.lock().unwrap().contains(cluster) {
            return Ok(JobOutcome::Failure("FAILURE".to_string()));
        }
        Ok(JobOutcome::Success)
    }
}

/// Records registrations and syncs; health is configurable.
pub(crate) struct MockGitOps {
    pub registered: Mutex<Vec<String>>,
    pub synced: Mutex<Vec<String>>,
    healthy: bool,
}

impl Default for MockGitOps {
    fn default() -> Self {
        MockGitOps {
            registered: Mutex::new(Vec::new()),
            synced: Mutex::new(Vec::new()),
            healthy: true,
        }
    }
}

impl MockGitOps {
    pub fn unhealthy() -> Self {
        MockGitOps {
            healthy: false,
            ..Default::default()
        }
    }
}

#[async_trait]
impl GitOps for MockGitOps {
    async fn register_cluster(&self, name: &str, _labels: &[(String, String)]) -> anyhow::Result<()> {
        self.registered.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn sync_cluster(&self, name: &str) -> anyhow::Result<()> {
        self.synced.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn wait_for_apps_healthy(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(self.healthy)
    }
}

/// Records cutovers; can be made to refuse the switch.
#[derive(Default)]
pub(crate) struct MockTraffic {
    pub to_green: Mutex<Vec<String>>,
    pub to_blue: Mutex<Vec<String>>,
    fail: bool,
}

impl MockTraffic {
    pub fn failing() -> Self {
        MockTraffic {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TrafficSwitch for MockTraffic {
    async fn switch_to_green(&self, cluster: &Cluster) -> anyhow::Result<()> {
        if self.fail {
            bail!("load balancer refused the switch");
        }
        self.to_green.lock().unwrap().push(cluster.identifier());
        Ok(())
    }

    async fn switch_to_blue(&self, cluster: &Cluster) -> anyhow::Result<()> {
        self.to_blue.lock().unwrap().push(cluster.identifier());
        Ok(())
    }
}
