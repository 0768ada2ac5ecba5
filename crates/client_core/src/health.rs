use std::time::Duration;

use anyhow::Result;
use reqwest::{header::ACCEPT, Client};
use shared::{domain::HealthStatus, protocol::HealthResponse};
use tracing::{debug, warn};
use url::Url;

use crate::config::ServiceConfig;

/// Bounded `GET /health` against the classification service. Never fails:
/// timeouts, transport errors and non-2xx answers all read as unavailable.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    http: Client,
    url: Url,
    deadline: Duration,
}

impl HealthProbe {
    pub fn new(http: Client, config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            http,
            url: config.health_url()?,
            deadline: config.health_timeout,
        })
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn probe(&self) -> HealthStatus {
        match tokio::time::timeout(self.deadline, self.fetch()).await {
            Ok(Ok(status)) => {
                debug!(
                    url = %self.url,
                    model_ready = status.model_ready,
                    model_location = %status.model_location,
                    "health: service available"
                );
                status
            }
            Ok(Err(err)) => {
                warn!(url = %self.url, error = %err, "health: probe failed");
                HealthStatus::unavailable()
            }
            Err(_) => {
                warn!(
                    url = %self.url,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "health: probe timed out"
                );
                HealthStatus::unavailable()
            }
        }
    }

    async fn fetch(&self) -> Result<HealthStatus, reqwest::Error> {
        let response = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        // Any 2xx means the service answered, even if the body is not the
        // documented shape.
        let parsed = serde_json::from_slice::<HealthResponse>(&body).unwrap_or_else(|err| {
            debug!(url = %self.url, error = %err, "health: unrecognized body");
            HealthResponse::default()
        });

        Ok(HealthStatus {
            available: true,
            model_ready: parsed.model_loaded.unwrap_or_default(),
            model_location: parsed.model_path.unwrap_or_default(),
            service_status: parsed.status,
        })
    }
}

#[cfg(test)]
#[path = "tests/health_tests.rs"]
mod tests;
