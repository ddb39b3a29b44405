//! LAPPS Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Sentence pipeline pool configuration
    pub pool: PoolConfig,

    /// Named entity recognizer configuration
    pub ner: NerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            self.server.port = parse_env("API_PORT", port)?;
        }

        // Sentence pipeline pool
        if let Ok(size) = std::env::var("SPLITTER_POOL_SIZE") {
            self.pool.size = parse_env("SPLITTER_POOL_SIZE", size)?;
        }
        if let Ok(secs) = std::env::var("SPLITTER_TIMEOUT_SECS") {
            self.pool.acquire_timeout_secs = parse_env("SPLITTER_TIMEOUT_SECS", secs)?;
        }

        // Named entity models
        if let Ok(root) = std::env::var("NER_MODEL_ROOT") {
            self.ner.model_root = PathBuf::from(root);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            self.logging.json_format = parse_env("LOG_JSON", json)?;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Sentence pipeline pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of pipeline instances created at startup
    pub size: usize,

    /// How long a request may wait for a free pipeline before it is
    /// rejected as busy
    pub acquire_timeout_secs: u64,
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 3,
            acquire_timeout_secs: 5,
        }
    }
}

/// Named entity recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Directory holding classifier model files, one file per classifier name
    pub model_root: PathBuf,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            model_root: PathBuf::from("/usr/share/lapps/ner"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pool.size, 3);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [pool]
            size = 1

            [ner]
            model_root = "/opt/models"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.size, 1);
        assert_eq!(config.pool.acquire_timeout_secs, 5);
        assert_eq!(config.ner.model_root, PathBuf::from("/opt/models"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9090").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_from_missing_file() {
        let err = AppConfig::from_file("/nonexistent/lapps.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool\nsize = ").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_parse_env_value() {
        let port: u16 = parse_env("API_PORT", "8081".to_string()).unwrap();
        assert_eq!(port, 8081);

        let err = parse_env::<u16>("API_PORT", "eighty".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for API_PORT: eighty");
    }
}
