//! Jenkins-compatible HTTP job runner.
//!
//! Triggering returns the queue-item URL from the `Location` header;
//! waiting polls the queue item until the build starts, then polls the
//! build until it reports a terminal `result`. Poll loops here are
//! unbounded by design — the strategy layer wraps the wait in the
//! configured deadline.

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use fleet_core::config::JenkinsConfig;
use fleet_rollout::{JobHandle, JobOutcome, JobParams, JobRunner};

/// Interval between queue-item polls while waiting for a build to start.
const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Interval between build polls while waiting for a terminal result.
const BUILD_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Job runner backed by a Jenkins-compatible REST API.
pub struct JenkinsRunner {
    client: Client,
    base_url: String,
    user: String,
    token: String,
}

impl JenkinsRunner {
    pub fn new(config: &JenkinsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        Ok(JenkinsRunner {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            token: config.token.clone(),
        })
    }

    /// Jenkins reports its internal service URL in queue and build
    /// links; rewrite it to the externally reachable base.
    fn rewrite_internal(&self, url: &str) -> String {
        url.replace("http://jenkins:8080", &self.base_url)
    }

    async fn get_json(&self, url: &str) -> anyhow::Result<serde_json::Value> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        response
            .json()
            .await
            .with_context(|| format!("invalid JSON from {url}"))
    }
}

#[async_trait]
impl JobRunner for JenkinsRunner {
    async fn trigger_job(&self, name: &str, params: &JobParams) -> anyhow::Result<JobHandle> {
        let url = format!("{}/job/{name}/buildWithParameters", self.base_url);
        info!(job = name, cluster = %params.cluster, "triggering job");

        let response = self
            .client
            .post(&url)
            .query(&params.to_wire())
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("failed to trigger job {name}: {status}");
        }

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .context("trigger response missing Location header")?;

        Ok(JobHandle(self.rewrite_internal(location)))
    }

    async fn wait_for_completion(&self, handle: &JobHandle) -> anyhow::Result<JobOutcome> {
        let queue_url = handle.0.trim_end_matches('/');
        debug!(queue = queue_url, "waiting for build to start");

        // The queue item grows an `executable` once the build starts.
        let build_url = loop {
            let item = self.get_json(&format!("{queue_url}/api/json")).await?;
            if let Some(url) = item
                .get("executable")
                .and_then(|e| e.get("url"))
                .and_then(|u| u.as_str())
            {
                break self.rewrite_internal(url);
            }
            tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
        };

        let build_url = build_url.trim_end_matches('/');
        debug!(build = build_url, "monitoring build");

        loop {
            let build = self.get_json(&format!("{build_url}/api/json")).await?;
            if let Some(result) = build.get("result").and_then(|r| r.as_str()) {
                info!(build = build_url, result, "build finished");
                return Ok(match result {
                    "SUCCESS" => JobOutcome::Success,
                    other => JobOutcome::Failure(other.to_string()),
                });
            }
            tokio::time::sleep(BUILD_POLL_INTERVAL).await;
        }
    }
}
