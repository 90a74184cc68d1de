//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity the station state starts with before the device reports
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    #[serde(default = "default_station_id")]
    pub id: String,

    #[serde(default = "default_station_name")]
    pub name: String,
}

fn default_station_id() -> String {
    "ESP32_001".to_string()
}

fn default_station_name() -> String {
    "VoltWay Station".to_string()
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: default_station_id(),
            name: default_station_name(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development
    Pretty,
    /// One JSON object per line, for production
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!("unknown log format '{}'", other))),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("voltway").join("config.toml")),
            Some(PathBuf::from("/etc/voltway/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // API overrides; PORT is honoured for platform deployments
        if let Some(host) = lookup("VOLTWAY_HOST") {
            self.api.host = host;
        }
        for key in ["PORT", "VOLTWAY_PORT"] {
            if let Some(port) = lookup(key) {
                match port.parse() {
                    Ok(p) => self.api.port = p,
                    Err(_) => tracing::warn!(key, value = %port, "Ignoring invalid port"),
                }
            }
        }

        // Station overrides
        if let Some(id) = lookup("VOLTWAY_STATION_ID") {
            self.station.id = id;
        }
        if let Some(name) = lookup("VOLTWAY_STATION_NAME") {
            self.station.name = name;
        }

        // Hub overrides
        if let Some(value) = lookup("VOLTWAY_MAX_CONNECTIONS") {
            if let Ok(n) = value.parse() {
                self.hub.max_connections = n;
            }
        }
        if let Some(value) = lookup("VOLTWAY_QUEUE_CAPACITY") {
            if let Ok(n) = value.parse() {
                self.hub.queue_capacity = n;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("VOLTWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("VOLTWAY_LOG_FORMAT") {
            match format.parse() {
                Ok(f) => self.logging.format = f,
                Err(e) => tracing::warn!("Ignoring VOLTWAY_LOG_FORMAT: {}", e),
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# VoltWay Configuration
#
# Environment variables override these settings:
# - PORT / VOLTWAY_PORT
# - VOLTWAY_HOST
# - VOLTWAY_STATION_ID
# - VOLTWAY_STATION_NAME
# - VOLTWAY_MAX_CONNECTIONS
# - VOLTWAY_QUEUE_CAPACITY
# - VOLTWAY_LOG_LEVEL
# - VOLTWAY_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 3000

# Allowed CORS origins (empty = any origin)
cors_origins = []

# Maximum request body size (bytes)
max_body_bytes = 65536

[station]
# Identity reported before the device sends its first update
id = "ESP32_001"
name = "VoltWay Station"

[hub]
# Maximum concurrent dashboard connections
max_connections = 1000

# Per-dashboard outbound queue; a dashboard that falls this far behind is disconnected
queue_capacity = 64

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
