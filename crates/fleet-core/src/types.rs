//! Domain types for the fleet rollout control plane.
//!
//! `Cluster` is an immutable value object materialized from the
//! configuration document; the orchestrator never mutates one after
//! construction. `RolloutPlan` is the ephemeral per-run parameter set
//! derived from the target environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment environment for a tenant. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    Test,
    Dev,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Prod => "prod",
            Environment::Test => "test",
            Environment::Dev => "dev",
        };
        f.write_str(s)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" => Ok(Environment::Prod),
            "test" => Ok(Environment::Test),
            "dev" => Ok(Environment::Dev),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// A managed cluster targeted by the rollout.
///
/// Identified by `{tenant}-{env}-{name}`; the state store partitions
/// records by `{tenant}#{env}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    /// Grouping key: clusters sharing a fleet are upgraded as a unit.
    pub fleet: String,
    /// Target control-plane version for this rollout.
    pub version: String,
    /// Exactly one cluster per fleet carries the canary flag.
    pub is_canary: bool,
    pub tenant: String,
    pub env: Environment,
    pub region: String,
}

impl Cluster {
    /// Globally unique identifier: `{tenant}-{env}-{name}`.
    pub fn identifier(&self) -> String {
        format!("{}-{}-{}", self.tenant, self.env, self.name)
    }

    /// Partition component of the upgrade record key: `{tenant}#{env}`.
    pub fn state_partition(&self) -> String {
        format!("{}#{}", self.tenant, self.env)
    }

    /// Name of the parallel "green" cluster provisioned by the
    /// blue-green strategy, e.g. `api-1-green-v1-29`.
    pub fn green_name(&self) -> String {
        format!("{}-green-v{}", self.name, self.version.replace('.', "-"))
    }
}

/// Per-environment rollout parameters, derived once per run. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutPlan {
    /// Percentage of a fleet's non-canary clusters per wave.
    pub wave_percent: u32,
    /// Cooldown after the canary and after each wave.
    pub bake_seconds: u64,
    /// Age at which an in-progress upgrade record is considered a
    /// stale lock and may be overridden.
    pub lock_timeout_secs: u64,
    /// Upper bound on concurrent cluster upgrades within a wave.
    pub max_parallel: usize,
}

impl RolloutPlan {
    /// Select the rollout parameters for an environment.
    ///
    /// Lock timeouts are 30/15/5 minutes for prod/test/dev: generous
    /// enough to outlast a slow control-plane upgrade, short enough
    /// that a crashed run does not wedge the fleet.
    pub fn for_env(env: Environment) -> Self {
        match env {
            Environment::Prod => RolloutPlan {
                wave_percent: 10,
                bake_seconds: 30,
                lock_timeout_secs: 1800,
                max_parallel: 2,
            },
            Environment::Test => RolloutPlan {
                wave_percent: 25,
                bake_seconds: 10,
                lock_timeout_secs: 900,
                max_parallel: 3,
            },
            Environment::Dev => RolloutPlan {
                wave_percent: 50,
                bake_seconds: 5,
                lock_timeout_secs: 300,
                max_parallel: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn identifier_format() {
        assert_eq!(test_cluster().identifier(), "acme-prod-api-1");
    }

    #[test]
    fn state_partition_format() {
        assert_eq!(test_cluster().state_partition(), "acme#prod");
    }

    #[test]
    fn green_name_replaces_dots() {
        assert_eq!(test_cluster().green_name(), "api-1-green-v1-29");
    }

    #[test]
    fn environment_round_trips() {
        for (s, env) in [
            ("prod", Environment::Prod),
            ("test", Environment::Test),
            ("dev", Environment::Dev),
        ] {
            assert_eq!(s.parse::<Environment>().unwrap(), env);
            assert_eq!(env.to_string(), s);
        }
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn plan_per_environment() {
        let prod = RolloutPlan::for_env(Environment::Prod);
        assert_eq!(prod.wave_percent, 10);
        assert_eq!(prod.max_parallel, 2);
        assert_eq!(prod.lock_timeout_secs, 1800);

        let dev = RolloutPlan::for_env(Environment::Dev);
        assert_eq!(dev.wave_percent, 50);
        assert_eq!(dev.max_parallel, 5);
        assert_eq!(dev.lock_timeout_secs, 300);
    }
}
