//! Fleet configuration document parser.
//!
//! The document is YAML, keyed by tenant/env/region with an `eks`
//! service block listing the clusters to roll out. Cluster entries are
//! kept in document order; wave membership depends on it.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::types::Environment;

/// Errors raised while loading or validating the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub tenant: String,
    pub env: Environment,
    pub region: String,
    pub account_id: String,
    pub services: ServicesConfig,
    /// CI job runner endpoint. Required to run an actual rollout.
    pub jenkins: Option<JenkinsConfig>,
    /// Traffic switching mechanism for blue-green cutover. When absent,
    /// cutover is a logged no-op.
    pub traffic: Option<TrafficConfig>,
}

/// Per-service blocks. Only `eks` is understood today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub eks: Option<EksService>,
}

/// The EKS service block: an enable flag plus one entry per cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EksService {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub config: IndexMap<String, ClusterEntry>,
}

/// One cluster entry under `services.eks.config`.
///
/// `fleet` and `version` are required in a valid document but modeled
/// as `Option` so the orchestrator can report which cluster is missing
/// which field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub fleet: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub is_canary: bool,
}

/// CI job runner (Jenkins-compatible) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsConfig {
    pub url: String,
    pub user: String,
    pub token: String,
}

/// Traffic switch configuration for blue-green cutover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub mechanism: TrafficMechanism,
    /// Hosted zone for weighted-DNS cutover.
    pub hosted_zone: Option<String>,
    /// Target group for load-balancer cutover.
    pub target_group: Option<String>,
}

/// Supported traffic cutover mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficMechanism {
    WeightedDns,
    TargetGroup,
}

impl FleetConfig {
    /// Load and validate a configuration document from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(?path, "loading configuration file");
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        info!(
            tenant = %config.tenant,
            env = %config.env,
            region = %config.region,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Structural validation beyond what serde enforces.
    ///
    /// Fatal before any orchestration begins; nothing has been mutated
    /// when this fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let eks = self
            .services
            .eks
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("EKS service block is missing".to_string()))?;

        if !eks.enabled {
            return Err(ConfigError::Invalid(
                "EKS service is not enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
tenant: acme
env: prod
region: us-east-1
account_id: "123456789012"
services:
  eks:
    enabled: true
    config:
      api-1:
        fleet: payments
        version: "1.29"
        is_canary: true
      api-2:
        fleet: payments
        version: "1.29"
"#;

    #[test]
    fn parses_valid_document() {
        let config: FleetConfig = serde_yaml::from_str(VALID).unwrap();
        config.validate().unwrap();

        assert_eq!(config.tenant, "acme");
        assert_eq!(config.env, Environment::Prod);

        let eks = config.services.eks.unwrap();
        assert_eq!(eks.config.len(), 2);
        assert!(eks.config["api-1"].is_canary);
        assert!(!eks.config["api-2"].is_canary);
    }

    #[test]
    fn preserves_cluster_document_order() {
        let mut doc = String::from(
            "tenant: t\nenv: dev\nregion: r\naccount_id: \"1\"\nservices:\n  eks:\n    enabled: true\n    config:\n",
        );
        for i in [9, 3, 7, 1] {
            doc.push_str(&format!(
                "      c-{i}:\n        fleet: f\n        version: \"1.30\"\n"
            ));
        }
        let config: FleetConfig = serde_yaml::from_str(&doc).unwrap();
        let names: Vec<_> = config.services.eks.unwrap().config.into_keys().collect();
        assert_eq!(names, vec!["c-9", "c-3", "c-7", "c-1"]);
    }

    #[test]
    fn rejects_disabled_eks() {
        let doc = VALID.replace("enabled: true", "enabled: false");
        let config: FleetConfig = serde_yaml::from_str(&doc).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_missing_top_level_field() {
        let doc = VALID.replace("region: us-east-1\n", "");
        assert!(serde_yaml::from_str::<FleetConfig>(&doc).is_err());
    }

    #[test]
    fn rejects_unknown_environment() {
        let doc = VALID.replace("env: prod", "env: staging");
        assert!(serde_yaml::from_str::<FleetConfig>(&doc).is_err());
    }

    #[test]
    fn parses_traffic_mechanism() {
        let doc = format!("{VALID}traffic:\n  mechanism: weighted_dns\n  hosted_zone: example.com\n");
        let config: FleetConfig = serde_yaml::from_str(&doc).unwrap();
        let traffic = config.traffic.unwrap();
        assert_eq!(traffic.mechanism, TrafficMechanism::WeightedDns);
        assert_eq!(traffic.hosted_zone.as_deref(), Some("example.com"));
    }
}
