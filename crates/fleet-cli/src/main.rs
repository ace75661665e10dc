//! fleetctl — roll out a control-plane version across a fleet.
//!
//! # Usage
//!
//! ```text
//! fleetctl config.yaml
//! ```
//!
//! Exit code 0 on full success; 1 on any configuration, validation,
//! lock, or upgrade failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use fleet_adapters::{ArgoCdCli, JenkinsRunner, traffic_switch_from_config};
use fleet_core::{FleetConfig, RolloutPlan};
use fleet_rollout::{Collaborators, FleetOrchestrator};
use fleet_state::StateStore;

#[derive(Parser)]
#[command(name = "fleetctl", about = "Fleet control-plane rollout orchestrator", version)]
struct Cli {
    /// Path to the fleet configuration document.
    config: PathBuf,

    /// Path to the upgrade ledger database.
    #[arg(long, default_value = "fleet-upgrades.redb")]
    state_path: PathBuf,

    /// Deadline in seconds for any single external job or health wait.
    #[arg(long, default_value = "1800")]
    poll_deadline: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fleet=debug")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "fleet rollout failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = FleetConfig::from_file(&cli.config)?;
    info!(
        tenant = %config.tenant,
        env = %config.env,
        "initializing fleet orchestrator"
    );

    let plan = RolloutPlan::for_env(config.env);
    let state = StateStore::open(
        &cli.state_path,
        Duration::from_secs(plan.lock_timeout_secs),
    )?;

    let collaborators = build_collaborators(&config, cli.poll_deadline)?;
    let orchestrator = FleetOrchestrator::new(&config, state, Arc::new(collaborators))?;
    orchestrator.run().await?;

    info!("fleet orchestration completed successfully");
    Ok(())
}

fn build_collaborators(config: &FleetConfig, poll_deadline: u64) -> anyhow::Result<Collaborators> {
    let jenkins = config
        .jenkins
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("configuration is missing the jenkins section"))?;

    let jobs = Arc::new(JenkinsRunner::new(jenkins)?);
    let gitops = Arc::new(ArgoCdCli::new());

    let mut collaborators = Collaborators::new(jobs, gitops)
        .with_poll_deadline(Duration::from_secs(poll_deadline));

    if let Some(traffic) = &config.traffic {
        collaborators = collaborators.with_traffic(traffic_switch_from_config(traffic)?);
    }

    Ok(collaborators)
}
