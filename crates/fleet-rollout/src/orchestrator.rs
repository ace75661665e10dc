//! FleetOrchestrator — the top-level rollout control loop.
//!
//! Per fleet, in configuration order: verify the single-canary
//! invariant, upgrade the canary alone, bake, then run the remaining
//! clusters in contiguous waves with bounded parallelism. A wave is a
//! hard join point: every cluster submitted to it runs to completion
//! even when a sibling fails, and only then does the orchestrator stop.
//! Blast radius is therefore one wave, not one cluster and not the
//! whole fleet.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use fleet_core::{Cluster, ConfigError, FleetConfig, RolloutPlan};
use fleet_state::{StateError, StateStore};

use crate::collaborators::Collaborators;
use crate::error::{RolloutError, RolloutResult};
use crate::strategy::UpgradeStrategy;

/// Top-level rollout driver for one tenant/env.
pub struct FleetOrchestrator {
    plan: RolloutPlan,
    state: StateStore,
    collaborators: Arc<Collaborators>,
    clusters: Vec<Cluster>,
}

impl FleetOrchestrator {
    /// Build an orchestrator from a validated configuration document.
    pub fn new(
        config: &FleetConfig,
        state: StateStore,
        collaborators: Arc<Collaborators>,
    ) -> RolloutResult<Self> {
        let clusters = build_clusters(config)?;
        Ok(FleetOrchestrator {
            plan: RolloutPlan::for_env(config.env),
            state,
            collaborators,
            clusters,
        })
    }

    /// The clusters this rollout will touch, in configuration order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Run the rollout across all fleets, in configuration order.
    ///
    /// A failing fleet stops the run; later fleets are not attempted.
    pub async fn run(&self) -> RolloutResult<()> {
        let fleets = group_by_fleet(&self.clusters);
        info!(fleets = fleets.len(), "starting fleet upgrade orchestration");

        for (fleet_name, fleet_clusters) in fleets {
            info!(fleet = %fleet_name, clusters = fleet_clusters.len(), "processing fleet");
            self.run_fleet(&fleet_name, &fleet_clusters).await?;
        }
        Ok(())
    }

    /// Canary, bake, then waves for one fleet.
    async fn run_fleet(&self, fleet_name: &str, clusters: &[Cluster]) -> RolloutResult<()> {
        let (canaries, regular): (Vec<&Cluster>, Vec<&Cluster>) =
            clusters.iter().partition(|c| c.is_canary);

        if canaries.len() != 1 {
            return Err(RolloutError::Validation(format!(
                "fleet '{fleet_name}' must have exactly one canary cluster, found {}",
                canaries.len()
            )));
        }
        let canary = canaries[0];

        info!(fleet = %fleet_name, canary = %canary.name, "starting canary upgrade");
        upgrade_one(canary, &self.state, &self.collaborators).await?;
        self.bake("canary").await;

        let waves = chunk_waves(&regular, self.plan.wave_percent);
        info!(
            fleet = %fleet_name,
            clusters = regular.len(),
            waves = waves.len(),
            "canary passed, rolling out waves"
        );

        for (i, wave) in waves.iter().enumerate() {
            let wave_number = i + 1;
            info!(
                fleet = %fleet_name,
                wave = wave_number,
                size = wave.len(),
                max_parallel = self.plan.max_parallel,
                "starting wave"
            );

            self.run_wave(wave).await.map_err(|e| {
                error!(fleet = %fleet_name, wave = wave_number, "wave failed, stopping further rollout");
                e
            })?;

            self.bake(&format!("wave {wave_number}")).await;
        }

        info!(fleet = %fleet_name, "fleet completed successfully");
        Ok(())
    }

    /// Run one wave's clusters concurrently, bounded by `max_parallel`.
    ///
    /// All tasks are awaited before any error surfaces — the join
    /// point, not a cancellation point. The first error (in submission
    /// order) is returned.
    async fn run_wave(&self, wave: &[&Cluster]) -> RolloutResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.plan.max_parallel));
        let mut handles = Vec::with_capacity(wave.len());

        for cluster in wave {
            let cluster = (*cluster).clone();
            let state = self.state.clone();
            let ctx = self.collaborators.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| RolloutError::Join(e.to_string()))?;
                    upgrade_one(&cluster, &state, &ctx).await
                }
                .await;
                (cluster, result)
            }));
        }

        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok((_, Ok(()))) => {}
                Ok((cluster, Err(e))) => {
                    error!(cluster = %cluster.identifier(), error = %e, "cluster upgrade failed");
                    first_error.get_or_insert(e);
                }
                Err(join_err) => {
                    error!(error = %join_err, "upgrade task did not complete");
                    first_error.get_or_insert(RolloutError::Join(join_err.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fixed cooldown between stages. Pure pause; no work is skipped.
    async fn bake(&self, stage: &str) {
        info!(stage, seconds = self.plan.bake_seconds, "baking");
        tokio::time::sleep(Duration::from_secs(self.plan.bake_seconds)).await;
        info!(stage, "bake complete");
    }
}

/// Upgrade a single cluster: skip if already at the target version,
/// otherwise lock, run the strategy, and record the outcome.
///
/// A held lock propagates *without* a failure mark — the cluster
/// belongs to whoever holds it, and the outcome is theirs to record.
async fn upgrade_one(
    cluster: &Cluster,
    state: &StateStore,
    ctx: &Collaborators,
) -> RolloutResult<()> {
    if state.already_succeeded(cluster)? {
        info!(cluster = %cluster.identifier(), version = %cluster.version, "already upgraded, skipping");
        return Ok(());
    }

    if let Err(e) = state.acquire_lock(cluster) {
        if let StateError::LockHeld { age_secs, .. } = &e {
            warn!(
                cluster = %cluster.identifier(),
                age_secs,
                "lock not acquired, another attempt owns this cluster"
            );
        }
        return Err(e.into());
    }

    let strategy = UpgradeStrategy::for_env(cluster.env);
    match strategy.upgrade(cluster, ctx).await {
        Ok(()) => {
            state.mark_success(cluster)?;
            Ok(())
        }
        Err(e) => {
            if let Err(mark_err) = state.mark_failure(cluster, &e.to_string()) {
                error!(
                    cluster = %cluster.identifier(),
                    error = %mark_err,
                    "failed to record upgrade failure"
                );
            }
            Err(e)
        }
    }
}

/// Materialize cluster entities from the configuration document.
pub fn build_clusters(config: &FleetConfig) -> RolloutResult<Vec<Cluster>> {
    config.validate()?;
    let Some(eks) = config.services.eks.as_ref() else {
        return Err(ConfigError::Invalid("EKS service block is missing".to_string()).into());
    };

    let mut clusters = Vec::with_capacity(eks.config.len());
    for (name, entry) in &eks.config {
        let fleet = entry
            .fleet
            .clone()
            .ok_or_else(|| ConfigError::Invalid(format!("cluster {name} missing fleet")))?;
        let version = entry
            .version
            .clone()
            .ok_or_else(|| ConfigError::Invalid(format!("cluster {name} missing version")))?;

        clusters.push(Cluster {
            name: name.clone(),
            fleet,
            version,
            is_canary: entry.is_canary,
            tenant: config.tenant.clone(),
            env: config.env,
            region: config.region.clone(),
        });
    }

    info!(total = clusters.len(), "clusters loaded from configuration");
    Ok(clusters)
}

/// Group clusters by fleet, preserving configuration order of both
/// fleets and members.
pub fn group_by_fleet(clusters: &[Cluster]) -> IndexMap<String, Vec<Cluster>> {
    let mut fleets: IndexMap<String, Vec<Cluster>> = IndexMap::new();
    for cluster in clusters {
        fleets
            .entry(cluster.fleet.clone())
            .or_default()
            .push(cluster.clone());
    }
    fleets
}

/// Partition clusters into contiguous waves of size
/// `max(1, total * wave_percent / 100)`, order preserved.
fn chunk_waves<'a>(clusters: &[&'a Cluster], wave_percent: u32) -> Vec<Vec<&'a Cluster>> {
    if clusters.is_empty() {
        return Vec::new();
    }
    let total = clusters.len();
    let wave_size = std::cmp::max(1, total * wave_percent as usize / 100);
    clusters.chunks(wave_size).map(<[&Cluster]>::to_vec).collect()
}
