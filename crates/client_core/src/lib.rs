use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{ClassificationResult, HealthStatus},
    error::ClassificationError,
};

pub mod classify;
pub mod config;
pub mod fallback;
pub mod health;
pub mod orchestrator;
pub mod ranking;
pub mod validation;

pub use classify::ClassificationClient;
pub use config::{FallbackPolicy, OrchestratorConfig, ServiceConfig, SubmitMode};
pub use fallback::FallbackSimulator;
pub use health::HealthProbe;
pub use orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorEvent, OrchestratorSnapshot, OrchestratorState,
    Phase,
};
pub use validation::{FileDescriptor, UploadedImage, MAX_IMAGE_BYTES};

const USER_AGENT: &str = concat!("batik-client/", env!("CARGO_PKG_VERSION"));

/// The remote side of classification as the orchestrator sees it.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn health(&self) -> HealthStatus;
    async fn classify(
        &self,
        image: &UploadedImage,
    ) -> std::result::Result<ClassificationResult, ClassificationError>;
}

/// Stand-in used when no service is configured.
pub struct MissingInferenceService;

#[async_trait]
impl InferenceService for MissingInferenceService {
    async fn health(&self) -> HealthStatus {
        HealthStatus::unavailable()
    }

    async fn classify(
        &self,
        _image: &UploadedImage,
    ) -> std::result::Result<ClassificationResult, ClassificationError> {
        Err(ClassificationError::network(
            "classification service is not configured",
        ))
    }
}

pub struct RemoteInferenceService {
    probe: HealthProbe,
    client: ClassificationClient,
}

impl RemoteInferenceService {
    pub fn new(config: &ServiceConfig) -> Result<Arc<Self>> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")?;
        Self::with_http(http, config)
    }

    pub fn with_http(http: Client, config: &ServiceConfig) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            probe: HealthProbe::new(http.clone(), config)?,
            client: ClassificationClient::new(http, config)?,
        }))
    }
}

#[async_trait]
impl InferenceService for RemoteInferenceService {
    async fn health(&self) -> HealthStatus {
        self.probe.probe().await
    }

    async fn classify(
        &self,
        image: &UploadedImage,
    ) -> std::result::Result<ClassificationResult, ClassificationError> {
        self.client.classify(image).await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
