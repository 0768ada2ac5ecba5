//! Lifecycle state machine that front ends observe.
//!
//! Every transition that makes earlier work obsolete (new selection, reset,
//! new dispatch) advances the [`Generation`]. A classification outcome is only
//! applied when the generation captured at dispatch is still current, so a
//! late response can never overwrite a newer selection.

use std::{path::Path, sync::Arc};

use serde::Serialize;
use shared::{
    domain::{ClassificationResult, Generation, HealthStatus},
    error::ClassificationError,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    config::{FallbackPolicy, OrchestratorConfig},
    fallback::FallbackSimulator,
    validation::UploadedImage,
    InferenceService,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ImageReady,
    Classifying,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    ImageReady {
        image: UploadedImage,
    },
    Classifying {
        image: UploadedImage,
    },
    Ready {
        image: UploadedImage,
        result: ClassificationResult,
    },
    Failed {
        image: UploadedImage,
        error: ClassificationError,
    },
}

impl OrchestratorState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::ImageReady { .. } => Phase::ImageReady,
            Self::Classifying { .. } => Phase::Classifying,
            Self::Ready { .. } => Phase::Ready,
            Self::Failed { .. } => Phase::Failed,
        }
    }

    pub fn image(&self) -> Option<&UploadedImage> {
        match self {
            Self::Idle => None,
            Self::ImageReady { image }
            | Self::Classifying { image }
            | Self::Ready { image, .. }
            | Self::Failed { image, .. } => Some(image),
        }
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Ready { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ClassificationError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Classifying { .. })
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(ClassificationError::user_message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorSnapshot {
    pub state: OrchestratorState,
    pub generation: Generation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
}

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    StateChanged(OrchestratorSnapshot),
    HealthUpdated(HealthStatus),
    StaleOutcomeDiscarded {
        dispatched: Generation,
        current: Generation,
    },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no image selected")]
    NoImageSelected,
    #[error("a classification request is already in flight (generation {0})")]
    RequestInFlight(Generation),
    #[error("classification was superseded by a newer selection or reset")]
    Superseded,
    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

struct OrchestratorInner {
    state: OrchestratorState,
    generation: Generation,
    health: Option<HealthStatus>,
}

impl OrchestratorInner {
    fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            state: self.state.clone(),
            generation: self.generation,
            health: self.health.clone(),
        }
    }
}

pub struct Orchestrator {
    service: Arc<dyn InferenceService>,
    simulator: FallbackSimulator,
    config: OrchestratorConfig,
    inner: Mutex<OrchestratorInner>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn InferenceService>, config: OrchestratorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            service,
            simulator: FallbackSimulator::default(),
            config,
            inner: Mutex::new(OrchestratorInner {
                state: OrchestratorState::Idle,
                generation: Generation::default(),
                health: None,
            }),
            events,
        }
    }

    pub fn with_simulator(mut self, simulator: FallbackSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> OrchestratorSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Makes `image` the active image from any state, discarding any prior
    /// result or error and orphaning an in-flight request.
    pub async fn select_image(&self, image: UploadedImage) -> Generation {
        let mut inner = self.inner.lock().await;
        inner.generation = inner.generation.next();
        info!(
            generation = inner.generation.0,
            file = image.file_name(),
            mime_type = image.mime_type(),
            size_bytes = image.size_bytes(),
            "orchestrator: image selected"
        );
        inner.state = OrchestratorState::ImageReady { image };
        self.publish(&inner);
        inner.generation
    }

    /// Loads `path` and selects it. A file that fails validation leaves the
    /// current state untouched.
    pub async fn select_file(&self, path: impl AsRef<Path>) -> Result<Generation, OrchestratorError> {
        let path = path.as_ref();
        let image = UploadedImage::load(path).await.inspect_err(|err| {
            warn!(file = %path.display(), error = %err, "orchestrator: selection rejected");
        })?;
        Ok(self.select_image(image).await)
    }

    pub async fn reset(&self) -> Generation {
        let mut inner = self.inner.lock().await;
        inner.generation = inner.generation.next();
        inner.state = OrchestratorState::Idle;
        debug!(generation = inner.generation.0, "orchestrator: reset");
        self.publish(&inner);
        inner.generation
    }

    /// Probes the service and records the answer for observers. Advisory only.
    pub async fn refresh_health(&self) -> HealthStatus {
        let status = self.service.health().await;
        self.inner.lock().await.health = Some(status.clone());
        let _ = self
            .events
            .send(OrchestratorEvent::HealthUpdated(status.clone()));
        status
    }

    /// Classifies the active image. Allowed from `ImageReady`, `Ready` and
    /// `Failed`; rejected while another request is in flight.
    pub async fn classify(&self) -> Result<ClassificationResult, OrchestratorError> {
        let (image, generation) = self.begin_classification().await?;

        if self.config.probe_before_submit {
            let health = self.refresh_health().await;
            if !health.available {
                info!(
                    generation = generation.0,
                    "orchestrator: health probe reports service unavailable, submitting anyway"
                );
            }
            if !self.is_current(generation).await {
                return self.discard(generation).await;
            }
        }

        let outcome = match self.service.classify(&image).await {
            Err(err @ ClassificationError::Network { .. })
                if self.config.fallback == FallbackPolicy::Simulate =>
            {
                warn!(
                    generation = generation.0,
                    error = %err,
                    "orchestrator: service unreachable, substituting simulated result"
                );
                Ok(self.simulator.simulate())
            }
            other => other,
        };

        self.complete(generation, outcome).await
    }

    async fn begin_classification(&self) -> Result<(UploadedImage, Generation), OrchestratorError> {
        let mut inner = self.inner.lock().await;
        let image = match &inner.state {
            OrchestratorState::Idle => return Err(OrchestratorError::NoImageSelected),
            OrchestratorState::Classifying { .. } => {
                return Err(OrchestratorError::RequestInFlight(inner.generation))
            }
            OrchestratorState::ImageReady { image }
            | OrchestratorState::Ready { image, .. }
            | OrchestratorState::Failed { image, .. } => image.clone(),
        };
        inner.generation = inner.generation.next();
        inner.state = OrchestratorState::Classifying {
            image: image.clone(),
        };
        info!(
            generation = inner.generation.0,
            file = image.file_name(),
            "orchestrator: classification dispatched"
        );
        self.publish(&inner);
        Ok((image, inner.generation))
    }

    async fn complete(
        &self,
        generation: Generation,
        outcome: Result<ClassificationResult, ClassificationError>,
    ) -> Result<ClassificationResult, OrchestratorError> {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return Err(self.stale(&inner, generation));
        }
        let image = match std::mem::replace(&mut inner.state, OrchestratorState::Idle) {
            OrchestratorState::Classifying { image } => image,
            other => {
                inner.state = other;
                return Err(self.stale(&inner, generation));
            }
        };

        match outcome {
            Ok(result) => {
                info!(
                    generation = generation.0,
                    primary = result.primary().map(|p| p.label.as_str()).unwrap_or_default(),
                    confidence = result.confidence(),
                    simulated = result.is_simulated(),
                    "orchestrator: result ready"
                );
                inner.state = OrchestratorState::Ready {
                    image,
                    result: result.clone(),
                };
                self.publish(&inner);
                Ok(result)
            }
            Err(error) => {
                warn!(
                    generation = generation.0,
                    kind = ?error.kind(),
                    error = %error,
                    "orchestrator: classification failed"
                );
                inner.state = OrchestratorState::Failed {
                    image,
                    error: error.clone(),
                };
                self.publish(&inner);
                Err(error.into())
            }
        }
    }

    async fn is_current(&self, generation: Generation) -> bool {
        self.inner.lock().await.generation == generation
    }

    async fn discard(
        &self,
        generation: Generation,
    ) -> Result<ClassificationResult, OrchestratorError> {
        let inner = self.inner.lock().await;
        Err(self.stale(&inner, generation))
    }

    fn stale(&self, inner: &OrchestratorInner, dispatched: Generation) -> OrchestratorError {
        debug!(
            dispatched = dispatched.0,
            current = inner.generation.0,
            "orchestrator: discarding stale classification outcome"
        );
        let _ = self.events.send(OrchestratorEvent::StaleOutcomeDiscarded {
            dispatched,
            current: inner.generation,
        });
        OrchestratorError::Superseded
    }

    fn publish(&self, inner: &OrchestratorInner) {
        let _ = self
            .events
            .send(OrchestratorEvent::StateChanged(inner.snapshot()));
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
