use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// `multipart/form-data` upload to the classify path.
    #[default]
    Multipart,
    /// JSON body `{ "image": "<base64>" }` to the base64 path.
    Base64Json,
}

impl FromStr for SubmitMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "multipart" => Ok(Self::Multipart),
            "base64" | "base64_json" | "json" => Ok(Self::Base64Json),
            other => Err(anyhow!("unknown submit mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub classify_path: String,
    pub base64_path: String,
    pub health_path: String,
    pub upload_field: String,
    pub submit_mode: SubmitMode,
    pub health_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim();
        let parsed = Url::parse(base_url)
            .with_context(|| format!("invalid classification service url '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "classification service url must use http or https, got '{}'",
                parsed.scheme()
            );
        }
        Ok(Self {
            base_url: parsed,
            classify_path: "predict".into(),
            base64_path: "classify-base64".into(),
            health_path: "health".into(),
            upload_field: "image".into(),
            submit_mode: SubmitMode::Multipart,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        })
    }

    pub fn classify_url(&self) -> Result<Url> {
        self.endpoint(&self.classify_path)
    }

    pub fn base64_url(&self) -> Result<Url> {
        self.endpoint(&self.base64_path)
    }

    pub fn health_url(&self) -> Result<Url> {
        self.endpoint(&self.health_path)
    }

    /// Joins `path` below the base URL, keeping any path prefix the base has.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid endpoint path '{path}'"))
    }
}

/// What the orchestrator does when the service cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Surface the network failure.
    #[default]
    Disabled,
    /// Substitute a result from the fallback simulator, tagged `simulated`.
    Simulate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub fallback: FallbackPolicy,
    pub probe_before_submit: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::Disabled,
            probe_before_submit: true,
        }
    }
}
