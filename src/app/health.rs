use super::Supervisor;
use crate::config::HealthConfig;
use crate::error::{Result, SupervisorError};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a single readiness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub ready: bool,
    /// HTTP status, if a response arrived
    pub status: Option<u16>,
}

/// Polls the web server's readiness endpoint a bounded number of times
pub struct HealthMonitor {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    attempts: u32,
}

impl HealthMonitor {
    pub fn new(config: &HealthConfig, port: u16) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.interval())
            .build()
            .map_err(|e| SupervisorError::system(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url(port),
            interval: config.interval(),
            attempts: config.attempts,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn probe(&self) -> HealthCheckResult {
        match self.client.get(&self.url).send().await {
            Ok(response) => HealthCheckResult {
                ready: response.status() == StatusCode::OK,
                status: Some(response.status().as_u16()),
            },
            Err(e) => {
                debug!("Readiness probe to {} failed: {}", self.url, e);
                HealthCheckResult {
                    ready: false,
                    status: None,
                }
            }
        }
    }

    /// Poll until the endpoint answers 200, the attempts run out, or
    /// `token` is cancelled. Returns whether readiness was observed.
    pub async fn wait_until_ready(&self, token: CancellationToken) -> bool {
        for attempt in 1..=self.attempts {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!("Readiness polling cancelled");
                    return false;
                }
                result = self.probe() => result,
            };

            if result.ready {
                info!("Web server is ready ({} after {} attempt(s))", self.url, attempt);
                return true;
            }
            debug!(
                "Readiness attempt {}/{}: status {:?}",
                attempt, self.attempts, result.status
            );

            if attempt < self.attempts {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Readiness polling cancelled");
                        return false;
                    }
                    _ = sleep(self.interval) => {}
                }
            }
        }

        warn!(
            "Web server not ready after {} attempts at {}; services keep running",
            self.attempts, self.url
        );
        false
    }
}

impl Supervisor {
    /// Start readiness polling in the background; never blocks the caller
    pub(super) fn spawn_health_monitor(&mut self, port: u16) {
        let monitor = match HealthMonitor::new(&self.config.health, port) {
            Ok(monitor) => monitor,
            Err(e) => {
                warn!("Readiness monitoring disabled: {}", e);
                return;
            }
        };

        let token = self.cancellation_token.child_token();
        self.health_task = Some(tokio::spawn(async move {
            monitor.wait_until_ready(token).await
        }));
    }
}
