//! Argo CD CLI wrapper.
//!
//! Shells out to the `argocd` binary: `app sync` with pruning for the
//! cluster's applications, `cluster add` for green-cluster
//! registration, and `app wait --health` for the health gate.

use async_trait::async_trait;
use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::{info, warn};

use fleet_rollout::GitOps;

/// CLI timeout passed to argocd for sync and wait operations.
const CLI_TIMEOUT_SECS: u32 = 300;

/// GitOps client that drives the `argocd` CLI.
pub struct ArgoCdCli {
    bin: String,
}

impl Default for ArgoCdCli {
    fn default() -> Self {
        ArgoCdCli {
            bin: "argocd".to_string(),
        }
    }
}

impl ArgoCdCli {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<std::process::Output> {
        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run {} {}", self.bin, args.join(" ")))?;
        Ok(output)
    }
}

fn sync_args(cluster_name: &str) -> Vec<String> {
    vec![
        "app".to_string(),
        "sync".to_string(),
        "--selector".to_string(),
        format!("cluster={cluster_name}"),
        // Remove resources no longer in git.
        "--prune".to_string(),
        "--timeout".to_string(),
        CLI_TIMEOUT_SECS.to_string(),
    ]
}

fn register_args(cluster_name: &str, labels: &[(String, String)]) -> Vec<String> {
    let mut args = vec![
        "cluster".to_string(),
        "add".to_string(),
        cluster_name.to_string(),
        "--yes".to_string(),
    ];
    for (key, value) in labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }
    args
}

fn wait_args(cluster_name: &str) -> Vec<String> {
    vec![
        "app".to_string(),
        "wait".to_string(),
        "--selector".to_string(),
        format!("cluster={cluster_name}"),
        "--health".to_string(),
        "--timeout".to_string(),
        CLI_TIMEOUT_SECS.to_string(),
    ]
}

#[async_trait]
impl GitOps for ArgoCdCli {
    async fn register_cluster(&self, name: &str, labels: &[(String, String)]) -> anyhow::Result<()> {
        info!(cluster = name, "registering cluster with Argo CD");
        let output = self.run(&register_args(name, labels)).await?;
        if !output.status.success() {
            bail!(
                "argocd cluster add failed for {name}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn sync_cluster(&self, name: &str) -> anyhow::Result<()> {
        info!(cluster = name, "syncing all apps");
        let output = self.run(&sync_args(name)).await?;
        if !output.status.success() {
            bail!(
                "argocd sync failed for {name}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        info!(cluster = name, "sync triggered");
        Ok(())
    }

    async fn wait_for_apps_healthy(&self, name: &str) -> anyhow::Result<bool> {
        info!(cluster = name, "waiting for apps to become healthy");
        let output = self.run(&wait_args(name)).await?;
        if !output.status.success() {
            warn!(
                cluster = name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "apps did not reach healthy state"
            );
            return Ok(false);
        }
        Ok(true)
    }
}
