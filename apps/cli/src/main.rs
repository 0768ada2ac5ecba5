use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    FallbackPolicy, InferenceService, MissingInferenceService, Orchestrator, OrchestratorError,
    OrchestratorSnapshot, RemoteInferenceService, SubmitMode,
};
use shared::domain::{ClassificationResult, HealthStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

/// Classify a batik photograph with a remote inference service.
#[derive(Parser, Debug)]
#[command(name = "batik-classify", version)]
struct Args {
    /// TOML file of string settings (defaults to ./batik.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base URL of the classification service.
    #[arg(long)]
    server_url: Option<String>,
    /// Substitute a simulated result when the service cannot be reached.
    #[arg(long)]
    fallback: bool,
    /// Send the image as base64 JSON instead of a multipart upload.
    #[arg(long)]
    base64: bool,
    /// Skip the health probe before submitting.
    #[arg(long)]
    no_probe: bool,
    /// Print the final snapshot as JSON.
    #[arg(long)]
    json: bool,
    /// Only probe the service and report its health.
    #[arg(long)]
    health_only: bool,
    /// Image file to classify.
    #[arg(required_unless_present = "health_only")]
    image: Option<PathBuf>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.server_url {
            settings.api_base_url = Some(url.clone());
        }
        if self.fallback {
            settings.fallback = FallbackPolicy::Simulate;
        }
        if self.base64 {
            settings.submit_mode = SubmitMode::Base64Json;
        }
        if self.no_probe {
            settings.probe_before_submit = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);

    let service: Arc<dyn InferenceService> = match settings.service_config()? {
        Some(config) => {
            info!(base_url = %config.base_url, "cli: using classification service");
            RemoteInferenceService::new(&config)?
        }
        None => {
            warn!("cli: no classification service configured");
            Arc::new(MissingInferenceService)
        }
    };
    let orchestrator = Orchestrator::new(service, settings.orchestrator_config());

    if args.health_only {
        let health = orchestrator.refresh_health().await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&health)?);
        } else {
            print_health(&health);
        }
        return Ok(if health.available {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let image = args.image.as_deref().context("an image path is required")?;
    let outcome = match orchestrator.select_file(image).await {
        Ok(_) => orchestrator.classify().await,
        Err(err) => Err(err),
    };
    let snapshot = orchestrator.snapshot().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        match &outcome {
            Ok(result) => print_result(&snapshot, result),
            Err(err) => print_failure(&snapshot, err),
        }
    }

    Ok(if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_health(health: &HealthStatus) {
    if !health.available {
        println!("Service unavailable");
        return;
    }
    let model = if health.model_ready {
        "model loaded"
    } else {
        "model not loaded"
    };
    println!("Service available ({model})");
    if !health.model_location.is_empty() {
        println!("Model: {}", health.model_location);
    }
    if let Some(status) = &health.service_status {
        println!("Status: {status}");
    }
}

fn print_result(snapshot: &OrchestratorSnapshot, result: &ClassificationResult) {
    if let Some(health) = &snapshot.health {
        if !health.available {
            println!("Warning: health probe reported the service as unavailable");
        }
    }
    if let Some(image) = snapshot.state.image() {
        println!("{} ({}, {} bytes)", image.file_name(), image.mime_type(), image.size_bytes());
    }
    if result.is_simulated() {
        println!("Simulated result: the classification service could not be reached");
    }
    if let Some(primary) = result.primary() {
        println!(
            "Prediction: {} ({:.1}%)",
            primary.label,
            primary.probability * 100.0
        );
    }
    if !result.alternatives().is_empty() {
        println!("Alternatives:");
        for alternative in result.alternatives() {
            println!(
                "  {:<16} {:>5.1}%",
                alternative.label,
                alternative.probability * 100.0
            );
        }
    }
}

fn print_failure(snapshot: &OrchestratorSnapshot, err: &OrchestratorError) {
    let message = match err {
        OrchestratorError::Classification(err) => err.user_message(),
        other => other.to_string(),
    };
    eprintln!("Classification failed: {message}");
    if let Some(health) = &snapshot.health {
        if !health.available {
            eprintln!("The classification service did not answer its health check.");
        }
    }
}
