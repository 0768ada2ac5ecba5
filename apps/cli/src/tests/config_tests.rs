use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn write_config(tag: &str, contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("batik_cli_{tag}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("batik.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn defaults_point_at_local_service() {
    let settings = Settings::default();
    let config = settings.service_config().expect("valid").expect("configured");
    assert_eq!(
        config.classify_url().expect("url").as_str(),
        "http://localhost:8000/predict"
    );
    assert_eq!(config.upload_field, "image");
    assert_eq!(config.health_timeout, Duration::from_secs(3));
    assert_eq!(settings.orchestrator_config(), OrchestratorConfig::default());
}

#[test]
fn file_values_override_defaults() {
    let path = write_config(
        "file",
        r#"
api_base_url = "http://models.internal:9000/v2"
classify_path = "classify"
upload_field = "file"
submit_mode = "base64"
fallback = "simulate"
probe_before_submit = "false"
health_timeout_ms = "1500"
"#,
    );

    let mut settings = Settings::default();
    let raw = fs::read_to_string(&path).expect("read");
    let file_cfg = toml::from_str::<HashMap<String, String>>(&raw).expect("toml");
    apply_file(&mut settings, &file_cfg).expect("apply");

    assert_eq!(
        settings.api_base_url.as_deref(),
        Some("http://models.internal:9000/v2")
    );
    assert_eq!(settings.submit_mode, SubmitMode::Base64Json);
    assert_eq!(settings.fallback, FallbackPolicy::Simulate);
    assert!(!settings.probe_before_submit);

    let config = settings.service_config().expect("valid").expect("configured");
    assert_eq!(
        config.classify_url().expect("url").as_str(),
        "http://models.internal:9000/v2/classify"
    );
    assert_eq!(config.upload_field, "file");
    assert_eq!(config.health_timeout, Duration::from_millis(1500));

    fs::remove_dir_all(path.parent().expect("parent")).ok();
}

#[test]
fn explicit_config_file_must_exist() {
    let missing = env::temp_dir().join("batik_cli_definitely_missing/batik.toml");
    assert!(load_settings(Some(missing.as_path())).is_err());
}

#[test]
fn non_string_values_are_rejected() {
    let path = write_config("typed", "health_timeout_ms = 1500\n");
    let err = load_settings(Some(path.as_path())).expect_err("flat string table");
    assert!(err.to_string().contains("flat table"));
    fs::remove_dir_all(path.parent().expect("parent")).ok();
}

#[test]
fn environment_overrides_file() {
    let mut settings = Settings {
        api_base_url: Some("http://from-file:8000".into()),
        ..Settings::default()
    };
    let env: HashMap<&str, &str> = [
        ("BATIK_API_BASE_URL", "https://classifier.example.org"),
        ("BATIK_UPLOAD_FIELD", "upload"),
        ("BATIK_SUBMIT_MODE", "multipart"),
        ("BATIK_FALLBACK", "1"),
    ]
    .into_iter()
    .collect();
    apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string())).expect("apply");

    assert_eq!(
        settings.api_base_url.as_deref(),
        Some("https://classifier.example.org")
    );
    assert_eq!(settings.upload_field, "upload");
    assert_eq!(settings.fallback, FallbackPolicy::Simulate);
}

#[test]
fn empty_base_url_disables_the_service() {
    let mut settings = Settings::default();
    apply_env(&mut settings, |key| {
        (key == "BATIK_API_BASE_URL").then(|| "  ".to_string())
    })
    .expect("apply");
    assert_eq!(settings.api_base_url, None);
    assert!(settings.service_config().expect("valid").is_none());
}

#[test]
fn invalid_submit_mode_is_an_error() {
    let mut settings = Settings::default();
    let err = apply_env(&mut settings, |key| {
        (key == "BATIK_SUBMIT_MODE").then(|| "carrier-pigeon".to_string())
    })
    .expect_err("rejected");
    assert!(err.to_string().contains("BATIK_SUBMIT_MODE"));
}

#[test]
fn non_http_base_url_is_rejected() {
    let settings = Settings {
        api_base_url: Some("ftp://models.local".into()),
        ..Settings::default()
    };
    assert!(settings.service_config().is_err());
}
