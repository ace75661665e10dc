//! fleet-core — domain types and configuration for the fleet rollout
//! control plane.
//!
//! A *fleet* is a named group of managed clusters upgraded together:
//! one canary first, then the rest in waves. This crate holds the
//! immutable value objects the orchestrator operates on:
//!
//! - **`config`** — the YAML configuration document and its validation
//! - **`types`** — `Cluster`, `Environment`, and the per-environment
//!   `RolloutPlan`

pub mod config;
pub mod types;

pub use config::{ConfigError, FleetConfig, TrafficMechanism};
pub use types::{Cluster, Environment, RolloutPlan};
