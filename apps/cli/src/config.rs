use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use client_core::{
    config::DEFAULT_BASE_URL, FallbackPolicy, OrchestratorConfig, ServiceConfig, SubmitMode,
};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "batik.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` runs without a service; classification then relies on fallback.
    pub api_base_url: Option<String>,
    pub classify_path: String,
    pub upload_field: String,
    pub submit_mode: SubmitMode,
    pub fallback: FallbackPolicy,
    pub probe_before_submit: bool,
    pub health_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: Some(DEFAULT_BASE_URL.into()),
            classify_path: "predict".into(),
            upload_field: "image".into(),
            submit_mode: SubmitMode::Multipart,
            fallback: FallbackPolicy::Disabled,
            probe_before_submit: true,
            health_timeout_ms: 3000,
        }
    }
}

impl Settings {
    /// `Ok(None)` when no service URL is configured.
    pub fn service_config(&self) -> Result<Option<ServiceConfig>> {
        let Some(base_url) = self.api_base_url.as_deref() else {
            return Ok(None);
        };
        let mut config = ServiceConfig::new(base_url)?;
        config.classify_path = self.classify_path.clone();
        config.upload_field = self.upload_field.clone();
        config.submit_mode = self.submit_mode;
        config.health_timeout = Duration::from_millis(self.health_timeout_ms);
        Ok(Some(config))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            fallback: self.fallback,
            probe_before_submit: self.probe_before_submit,
        }
    }
}

/// Defaults, then the TOML file, then `BATIK_*` environment variables.
/// An explicitly named file must exist; the default file is optional.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let raw = match config_path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
    };
    if let Some(raw) = raw {
        let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
            .context("config file must be a flat table of string values")?;
        apply_file(&mut settings, &file_cfg)?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) -> Result<()> {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = non_empty(v);
    }
    if let Some(v) = file_cfg.get("classify_path") {
        settings.classify_path = v.clone();
    }
    if let Some(v) = file_cfg.get("upload_field") {
        settings.upload_field = v.clone();
    }
    if let Some(v) = file_cfg.get("submit_mode") {
        settings.submit_mode = v.parse()?;
    }
    if let Some(v) = file_cfg.get("fallback") {
        settings.fallback = parse_fallback(v);
    }
    if let Some(v) = file_cfg.get("probe_before_submit") {
        settings.probe_before_submit = parse_flag(v);
    }
    if let Some(v) = file_cfg.get("health_timeout_ms") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.health_timeout_ms = parsed,
            Err(_) => warn!(value = %v, "config: ignoring invalid health_timeout_ms"),
        }
    }
    Ok(())
}

pub(crate) fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("BATIK_API_BASE_URL") {
        settings.api_base_url = non_empty(&v);
    }
    if let Some(v) = lookup("BATIK_UPLOAD_FIELD") {
        settings.upload_field = v;
    }
    if let Some(v) = lookup("BATIK_CLASSIFY_PATH") {
        settings.classify_path = v;
    }
    if let Some(v) = lookup("BATIK_SUBMIT_MODE") {
        settings.submit_mode = v
            .parse()
            .context("BATIK_SUBMIT_MODE must be 'multipart' or 'base64'")?;
    }
    if let Some(v) = lookup("BATIK_FALLBACK") {
        settings.fallback = parse_fallback(&v);
    }
    Ok(())
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_fallback(raw: &str) -> FallbackPolicy {
    if parse_flag(raw) || raw.trim().eq_ignore_ascii_case("simulate") {
        FallbackPolicy::Simulate
    } else {
        FallbackPolicy::Disabled
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
