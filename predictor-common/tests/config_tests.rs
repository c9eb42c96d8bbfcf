//! Unit tests for configuration resolution and graceful degradation
//!
//! Tests cover:
//! - Priority order CLI → ENV → TOML → default
//! - Missing or malformed TOML files fall back to defaults
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.

use predictor_common::config::{
    load_toml_config, load_toml_config_or_default, ConfigOverrides, ServiceConfig, TomlConfig,
    DEFAULT_API_URL, DEFAULT_PORT, ENV_API_URL, ENV_LOG_FILE, ENV_PORT,
};
use predictor_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_API_URL);
    env::remove_var(ENV_PORT);
    env::remove_var(ENV_LOG_FILE);
    env::remove_var("PREDICTOR_BIND");
}

#[test]
#[serial]
fn test_defaults_without_any_source() {
    clear_env();

    let config = ServiceConfig::resolve(ConfigOverrides::default(), &TomlConfig::default()).unwrap();

    assert_eq!(config.api_url, DEFAULT_API_URL);
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.bind_address, "0.0.0.0");
    assert!(config.collector_file.is_none());
    assert_eq!(config.listen_address(), "0.0.0.0:5002");
}

#[test]
#[serial]
fn test_toml_overrides_defaults() {
    clear_env();

    let toml = TomlConfig {
        api_url: Some("http://scoring:8080/predict".into()),
        port: Some(6000),
        ..Default::default()
    };
    let config = ServiceConfig::resolve(ConfigOverrides::default(), &toml).unwrap();

    assert_eq!(config.api_url, "http://scoring:8080/predict");
    assert_eq!(config.port, 6000);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var(ENV_API_URL, "http://env-host/predict");
    env::set_var(ENV_PORT, "7001");

    let toml = TomlConfig {
        api_url: Some("http://toml-host/predict".into()),
        port: Some(6000),
        ..Default::default()
    };
    let config = ServiceConfig::resolve(ConfigOverrides::default(), &toml).unwrap();

    assert_eq!(config.api_url, "http://env-host/predict");
    assert_eq!(config.port, 7001);

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(ENV_API_URL, "http://env-host/predict");
    env::set_var(ENV_LOG_FILE, "/tmp/env-collector.jsonl");

    let overrides = ConfigOverrides {
        api_url: Some("https://cli-host/predict".into()),
        collector_file: Some(PathBuf::from("/tmp/cli-collector.jsonl")),
        ..Default::default()
    };
    let config = ServiceConfig::resolve(overrides, &TomlConfig::default()).unwrap();

    assert_eq!(config.api_url, "https://cli-host/predict");
    assert_eq!(
        config.collector_file,
        Some(PathBuf::from("/tmp/cli-collector.jsonl"))
    );

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_rejected() {
    clear_env();
    env::set_var(ENV_PORT, "not-a-port");

    let result = ServiceConfig::resolve(ConfigOverrides::default(), &TomlConfig::default());
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn test_non_http_api_url_rejected() {
    clear_env();

    let overrides = ConfigOverrides {
        api_url: Some("ftp://scoring/predict".into()),
        ..Default::default()
    };
    let result = ServiceConfig::resolve(overrides, &TomlConfig::default());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_toml_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
api_url = "http://scoring:9000/predict"
port = 5100

[logging]
collector_file = "/var/log/predictor/collector.jsonl"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.api_url.as_deref(), Some("http://scoring:9000/predict"));
    assert_eq!(config.port, Some(5100));
    assert_eq!(
        config.logging.collector_file,
        Some(PathBuf::from("/var/log/predictor/collector.jsonl"))
    );
}

#[test]
fn test_missing_toml_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config_or_default(Some(&dir.path().join("absent.toml")));
    assert!(config.api_url.is_none());
    assert!(config.port.is_none());
}

#[test]
fn test_malformed_toml_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"five thousand\"").unwrap();

    assert!(load_toml_config(&path).is_err());
    let config = load_toml_config_or_default(Some(&path));
    assert!(config.port.is_none());
}
