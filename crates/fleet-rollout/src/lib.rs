//! fleet-rollout — the rollout control plane.
//!
//! Drives a canary-first, wave-based upgrade across fleets of managed
//! clusters. The canary upgrades alone and bakes; the remaining
//! clusters proceed in contiguous waves with bounded parallelism and a
//! hard join point between waves: every cluster submitted to a wave
//! runs to completion, and only then does a failure stop the rollout.
//!
//! # Components
//!
//! - **`collaborators`** — contracts for the CI job runner, GitOps
//!   sync tool, and traffic switch mechanism
//! - **`strategy`** — per-cluster upgrade state machines
//!   (in-place, blue-green)
//! - **`orchestrator`** — fleet grouping, canary/wave/bake sequencing,
//!   lock handling

pub mod collaborators;
pub mod error;
pub mod orchestrator;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use collaborators::{Collaborators, GitOps, JobHandle, JobOutcome, JobParams, JobRunner, TrafficSwitch};
pub use error::{RolloutError, RolloutResult};
pub use orchestrator::FleetOrchestrator;
pub use strategy::UpgradeStrategy;
