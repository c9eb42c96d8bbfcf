//! Configuration loading and resolution
//!
//! Every setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service starts on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/predict";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5002;

pub const ENV_API_URL: &str = "PREDICTOR_API_URL";
pub const ENV_BIND_ADDRESS: &str = "PREDICTOR_BIND";
pub const ENV_PORT: &str = "PREDICTOR_PORT";
pub const ENV_LOG_FILE: &str = "PREDICTOR_LOG_FILE";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    pub api_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[logging]` table of `config.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// JSON-lines file receiving collector entries
    pub collector_file: Option<PathBuf>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub collector_file: Option<PathBuf>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub api_url: String,
    pub bind_address: String,
    pub port: u16,
    pub collector_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve every setting from CLI overrides, environment, TOML and defaults
    pub fn resolve(overrides: ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let api_url = overrides
            .api_url
            .or_else(|| env_value(ENV_API_URL))
            .or_else(|| toml.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Scoring API URL must start with http:// or https://, got '{}'",
                api_url
            )));
        }

        let bind_address = overrides
            .bind_address
            .or_else(|| env_value(ENV_BIND_ADDRESS))
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match env_value(ENV_PORT) {
                Some(raw) => raw.parse::<u16>().map_err(|_| {
                    Error::Config(format!("{} is not a valid port: '{}'", ENV_PORT, raw))
                })?,
                None => toml.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let collector_file = overrides
            .collector_file
            .or_else(|| env_value(ENV_LOG_FILE).map(PathBuf::from))
            .or_else(|| toml.logging.collector_file.clone());

        Ok(Self {
            api_url,
            bind_address,
            port,
            collector_file,
        })
    }

    /// `host:port` string for the TCP listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Platform config file location: `<config_dir>/predictor/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("predictor").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML config, falling back to defaults when it is missing or invalid
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            warn!("Could not determine config directory; using defaults");
            return TomlConfig::default();
        }
    };

    if !path.exists() {
        info!("No config file at {}; using defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}
