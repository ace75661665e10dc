//! fleet-adapters — concrete clients behind the rollout collaborator
//! contracts.
//!
//! The control plane in `fleet-rollout` only knows the `JobRunner`,
//! `GitOps`, and `TrafficSwitch` traits; this crate supplies the real
//! implementations:
//!
//! - **`jenkins`** — Jenkins-compatible HTTP job runner
//! - **`argocd`** — Argo CD CLI wrapper for app sync and registration
//! - **`traffic`** — blue-green cutover mechanisms

pub mod argocd;
pub mod jenkins;
pub mod traffic;

pub use argocd::ArgoCdCli;
pub use jenkins::JenkinsRunner;
pub use traffic::{TargetGroupSwitch, WeightedDnsSwitch, traffic_switch_from_config};
