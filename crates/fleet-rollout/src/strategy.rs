//! Per-cluster upgrade state machines.
//!
//! Two variants, selected by a pure function of environment: `dev`
//! upgrades in place, everything else goes blue-green. Each variant is
//! a linear sequence of steps; a failing step aborts the remainder.
//! Every external await (job completion, app health) runs under the
//! collaborator bundle's poll deadline, so a stuck external system
//! fails the upgrade rather than hanging its wave worker.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use fleet_core::{Cluster, Environment};

use crate::collaborators::{Collaborators, JobOutcome, JobParams};
use crate::error::{RolloutError, RolloutResult};

/// CI job that plans/applies and destroys cluster infrastructure.
pub const CONTROL_PLANE_JOB: &str = "terraform-cicd";

/// Settle period for the post-upgrade validation placeholder.
const VALIDATION_SETTLE: Duration = Duration::from_secs(30);

/// How a single cluster's version change is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStrategy {
    /// Mutate the existing cluster's control plane.
    InPlace,
    /// Provision a green replacement, cut traffic over, retire blue.
    BlueGreen,
}

impl UpgradeStrategy {
    /// Select the strategy for an environment. Dev clusters are cheap
    /// to rebuild, so they upgrade in place; everything else gets the
    /// safer provision-then-cutover path.
    pub fn for_env(env: Environment) -> Self {
        match env {
            Environment::Dev => UpgradeStrategy::InPlace,
            Environment::Prod | Environment::Test => UpgradeStrategy::BlueGreen,
        }
    }

    /// Execute the version change for one cluster.
    pub async fn upgrade(&self, cluster: &Cluster, ctx: &Collaborators) -> RolloutResult<()> {
        match self {
            UpgradeStrategy::InPlace => in_place(cluster, ctx).await,
            UpgradeStrategy::BlueGreen => blue_green(cluster, ctx).await,
        }
    }
}

/// In-place: control-plane job, then app sync, then validation.
async fn in_place(cluster: &Cluster, ctx: &Collaborators) -> RolloutResult<()> {
    info!(cluster = %cluster.identifier(), version = %cluster.version, "starting in-place upgrade");

    let mut params = JobParams::plan(cluster, &cluster.name);
    params.upgrade_type = Some("control-plane".to_string());
    run_job(ctx, cluster, params, "control-plane upgrade").await?;

    sync_and_wait(ctx, cluster, &cluster.name).await?;
    validate_cluster(cluster, &cluster.name).await?;

    info!(cluster = %cluster.identifier(), "in-place upgrade completed");
    Ok(())
}

/// Blue-green: provision green, register and sync it, validate, cut
/// traffic over, tear down blue.
///
/// Teardown is never attempted when cutover failed; the working blue
/// environment must survive an incomplete switch.
async fn blue_green(cluster: &Cluster, ctx: &Collaborators) -> RolloutResult<()> {
    let green = cluster.green_name();
    info!(
        cluster = %cluster.identifier(),
        green = %green,
        version = %cluster.version,
        "starting blue-green upgrade"
    );

    run_job(ctx, cluster, JobParams::plan(cluster, &green), "green provisioning").await?;

    let labels = vec![
        ("cluster".to_string(), green.clone()),
        ("fleet".to_string(), cluster.fleet.clone()),
    ];
    ctx.gitops
        .register_cluster(&green, &labels)
        .await
        .map_err(|e| RolloutError::upgrade_failed(cluster, format!("green registration: {e}")))?;
    sync_and_wait(ctx, cluster, &green).await?;

    validate_cluster(cluster, &green).await?;

    match &ctx.traffic {
        Some(traffic) => {
            traffic
                .switch_to_green(cluster)
                .await
                .map_err(|e| RolloutError::upgrade_failed(cluster, format!("traffic cutover: {e}")))?;
            info!(cluster = %cluster.identifier(), "traffic switched to green");
        }
        None => {
            warn!(
                cluster = %cluster.identifier(),
                "no traffic switch mechanism configured, skipping cutover"
            );
        }
    }

    run_job(ctx, cluster, JobParams::destroy(cluster, &cluster.name), "blue teardown").await?;

    info!(cluster = %cluster.identifier(), "blue-green upgrade completed");
    Ok(())
}

/// Trigger a job and await its terminal state under the poll deadline.
async fn run_job(
    ctx: &Collaborators,
    cluster: &Cluster,
    params: JobParams,
    step: &str,
) -> RolloutResult<()> {
    let handle = ctx
        .jobs
        .trigger_job(CONTROL_PLANE_JOB, &params)
        .await
        .map_err(|e| RolloutError::upgrade_failed(cluster, format!("{step}: failed to trigger job: {e}")))?;

    info!(cluster = %cluster.identifier(), step, handle = %handle.0, "waiting for job completion");

    let outcome = timeout(ctx.poll_deadline, ctx.jobs.wait_for_completion(&handle))
        .await
        .map_err(|_| {
            RolloutError::upgrade_failed(
                cluster,
                format!(
                    "{step}: job did not reach a terminal state within {}s",
                    ctx.poll_deadline.as_secs()
                ),
            )
        })?
        .map_err(|e| RolloutError::upgrade_failed(cluster, format!("{step}: {e}")))?;

    match outcome {
        JobOutcome::Success => Ok(()),
        JobOutcome::Failure(status) => Err(RolloutError::upgrade_failed(
            cluster,
            format!("{step}: job finished with status {status}"),
        )),
    }
}

/// Sync the target cluster's applications and await health.
async fn sync_and_wait(ctx: &Collaborators, cluster: &Cluster, target: &str) -> RolloutResult<()> {
    ctx.gitops
        .sync_cluster(target)
        .await
        .map_err(|e| RolloutError::upgrade_failed(cluster, format!("app sync on {target}: {e}")))?;

    let healthy = timeout(ctx.poll_deadline, ctx.gitops.wait_for_apps_healthy(target))
        .await
        .map_err(|_| {
            RolloutError::upgrade_failed(
                cluster,
                format!(
                    "apps on {target} did not report health within {}s",
                    ctx.poll_deadline.as_secs()
                ),
            )
        })?
        .map_err(|e| RolloutError::upgrade_failed(cluster, format!("health wait on {target}: {e}")))?;

    if !healthy {
        return Err(RolloutError::upgrade_failed(
            cluster,
            format!("apps on {target} did not become healthy"),
        ));
    }
    Ok(())
}

/// Post-upgrade cluster validation.
///
/// Placeholder: waits out a settle period. A real check probes node
/// readiness, system pod health, and API-server reachability.
async fn validate_cluster(cluster: &Cluster, target: &str) -> RolloutResult<()> {
    info!(cluster = %cluster.identifier(), target, "validating cluster health");
    tokio::time::sleep(VALIDATION_SETTLE).await;
    info!(cluster = %cluster.identifier(), target, "cluster validation passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{MockGitOps, MockJobRunner, MockTraffic, test_cluster};

    fn ctx(jobs: Arc<MockJobRunner>, gitops: Arc<MockGitOps>) -> Collaborators {
        Collaborators::new(jobs, gitops)
    }

    #[test]
    fn selection_by_environment() {
        assert_eq!(UpgradeStrategy::for_env(Environment::Dev), UpgradeStrategy::InPlace);
        assert_eq!(UpgradeStrategy::for_env(Environment::Test), UpgradeStrategy::BlueGreen);
        assert_eq!(UpgradeStrategy::for_env(Environment::Prod), UpgradeStrategy::BlueGreen);
    }

    #[tokio::test(start_paused = true)]
    async fn in_place_runs_job_then_sync() {
        let jobs = Arc::new(MockJobRunner::default());
        let gitops = Arc::new(MockGitOps::default());
        let cluster = test_cluster("api-1", Environment::Dev, false);

        UpgradeStrategy::InPlace
            .upgrade(&cluster, &ctx(jobs.clone(), gitops.clone()))
            .await
            .unwrap();

        let calls = jobs.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["ACTION"], "plan");
        assert_eq!(calls[0]["CLUSTER"], "api-1");
        assert_eq!(calls[0]["UPGRADE_TYPE"], "control-plane");

        assert_eq!(*gitops.synced.lock().unwrap(), vec!["api-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn in_place_job_failure_skips_sync() {
        let jobs = Arc::new(MockJobRunner::default());
        jobs.fail_cluster("api-1");
        let gitops = Arc::new(MockGitOps::default());
        let cluster = test_cluster("api-1", Environment::Dev, false);

        let err = UpgradeStrategy::InPlace
            .upgrade(&cluster, &ctx(jobs, gitops.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::UpgradeFailed { .. }));
        assert!(gitops.synced.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn in_place_unhealthy_apps_fail() {
        let jobs = Arc::new(MockJobRunner::default());
        let gitops = Arc::new(MockGitOps::unhealthy());
        let cluster = test_cluster("api-1", Environment::Dev, false);

        let err = UpgradeStrategy::InPlace
            .upgrade(&cluster, &ctx(jobs, gitops))
            .await
            .unwrap_err();

        match err {
            RolloutError::UpgradeFailed { reason, .. } => {
                assert!(reason.contains("did not become healthy"), "{reason}")
            }
            other => panic!("expected UpgradeFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blue_green_full_sequence() {
        let jobs = Arc::new(MockJobRunner::default());
        let gitops = Arc::new(MockGitOps::default());
        let traffic = Arc::new(MockTraffic::default());
        let cluster = test_cluster("api-1", Environment::Prod, false);

        let ctx = ctx(jobs.clone(), gitops.clone()).with_traffic(traffic.clone());
        UpgradeStrategy::BlueGreen.upgrade(&cluster, &ctx).await.unwrap();

        let calls = jobs.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // Provision targets the green cluster.
        assert_eq!(calls[0]["ACTION"], "plan");
        assert_eq!(calls[0]["CLUSTER"], "api-1-green-v1-29");
        // Teardown targets the blue original, with the confirm flag.
        assert_eq!(calls[1]["ACTION"], "destroy");
        assert_eq!(calls[1]["CLUSTER"], "api-1");
        assert_eq!(calls[1]["CONFIRM_DESTROY"], "YES");

        assert_eq!(*gitops.registered.lock().unwrap(), vec!["api-1-green-v1-29"]);
        assert_eq!(*gitops.synced.lock().unwrap(), vec!["api-1-green-v1-29"]);
        assert_eq!(*traffic.to_green.lock().unwrap(), vec!["acme-prod-api-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn blue_green_cutover_failure_guards_teardown() {
        let jobs = Arc::new(MockJobRunner::default());
        let gitops = Arc::new(MockGitOps::default());
        let traffic = Arc::new(MockTraffic::failing());
        let cluster = test_cluster("api-1", Environment::Prod, false);

        let ctx = ctx(jobs.clone(), gitops).with_traffic(traffic);
        let err = UpgradeStrategy::BlueGreen.upgrade(&cluster, &ctx).await.unwrap_err();

        match err {
            RolloutError::UpgradeFailed { reason, .. } => {
                assert!(reason.contains("traffic cutover"), "{reason}")
            }
            other => panic!("expected UpgradeFailed, got {other:?}"),
        }

        // The blue cluster must survive: no destroy job triggered.
        let calls = jobs.calls.lock().unwrap();
        assert!(calls.iter().all(|c| c["ACTION"] != "destroy"));
    }

    #[tokio::test(start_paused = true)]
    async fn blue_green_without_traffic_switch_still_tears_down() {
        let jobs = Arc::new(MockJobRunner::default());
        let gitops = Arc::new(MockGitOps::default());
        let cluster = test_cluster("api-1", Environment::Prod, false);

        // No traffic mechanism: cutover is a logged no-op, not an error.
        UpgradeStrategy::BlueGreen
            .upgrade(&cluster, &ctx(jobs.clone(), gitops))
            .await
            .unwrap();

        let calls = jobs.calls.lock().unwrap();
        assert_eq!(calls.last().unwrap()["ACTION"], "destroy");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_job_converts_to_upgrade_failed() {
        let jobs = Arc::new(MockJobRunner::hanging());
        let gitops = Arc::new(MockGitOps::default());
        let cluster = test_cluster("api-1", Environment::Dev, false);

        let ctx = ctx(jobs, gitops).with_poll_deadline(Duration::from_secs(60));
        let err = UpgradeStrategy::InPlace.upgrade(&cluster, &ctx).await.unwrap_err();

        match err {
            RolloutError::UpgradeFailed { reason, .. } => {
                assert!(reason.contains("terminal state within 60s"), "{reason}")
            }
            other => panic!("expected UpgradeFailed, got {other:?}"),
        }
    }
}
