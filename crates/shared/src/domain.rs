use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! counter_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

counter_newtype!(Generation);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Remote,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub probability: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Ranked predictions for one image. The first entry is the primary
/// prediction; the remaining entries are alternatives in descending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predictions: Vec<Prediction>,
    pub provenance: Provenance,
    pub produced_at: DateTime<Utc>,
}

impl ClassificationResult {
    pub fn new(predictions: Vec<Prediction>, provenance: Provenance) -> Self {
        Self {
            predictions,
            provenance,
            produced_at: Utc::now(),
        }
    }

    pub fn primary(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn confidence(&self) -> f64 {
        self.primary().map(|p| p.probability).unwrap_or_default()
    }

    pub fn alternatives(&self) -> &[Prediction] {
        self.predictions.get(1..).unwrap_or_default()
    }

    pub fn is_simulated(&self) -> bool {
        self.provenance == Provenance::Simulated
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub model_ready: bool,
    pub model_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_status: Option<String>,
}

impl HealthStatus {
    pub fn unavailable() -> Self {
        Self::default()
    }
}
