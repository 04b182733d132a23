//! Server configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `LLAMADECK_*` environment variables (`LLAMADECK_SERVER__PORT`,
//! `LLAMADECK_DAEMON__BASE_URL`, ...), then the conventional `PORT` variable.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use llamadeck_relay::{CommandConfig, DaemonConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LLAMADECK";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values were read but are not usable
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the browser frontend
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Daemon HTTP API
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Daemon command-line tool
    #[serde(default)]
    pub commands: CommandConfig,
}

impl RelayConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("llamadeck")
            .join("config.toml")
    }

    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path(), false)
    }

    /// Load from `path` and the environment.
    ///
    /// A missing file is an error only when `required` is set.
    pub fn load_from(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let mut config: RelayConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PORT is not a valid port: {}", port)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Port must be greater than 0".to_string(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Validation("Host cannot be empty".to_string()));
        }
        self.daemon
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        self.commands
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(())
    }

    /// Parsed log level, INFO for unknown names
    pub fn log_level(&self) -> tracing::Level {
        match self.server.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.static_dir, PathBuf::from("public"));
        assert_eq!(config.daemon.base_url, "http://localhost:11434");
        assert_eq!(config.commands.program, "ollama");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "0.0.0.0"
log_level = "debug"

[daemon]
base_url = "http://gpu-box:11434"
request_timeout_secs = 10

[commands]
program = "/usr/local/bin/ollama"
"#
        )
        .unwrap();

        let config = RelayConfig::load_from(file.path(), true).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
        assert_eq!(config.daemon.base_url, "http://gpu-box:11434");
        assert_eq!(config.daemon.request_timeout_secs, 10);
        assert_eq!(config.commands.program, "/usr/local/bin/ollama");
        assert_eq!(config.commands.pull_args, vec!["pull"]);
    }

    #[test]
    fn test_missing_file_only_fails_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(RelayConfig::load_from(&missing, true).is_err());

        let config = RelayConfig::load_from(&missing, false).unwrap();
        assert_eq!(config.commands.program, "ollama");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.daemon.base_url = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = RelayConfig::default();
        config.commands.program = String::new();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let mut config = RelayConfig::default();
        config.server.log_level = "loud".to_string();
        assert_eq!(config.log_level(), tracing::Level::INFO);
    }
}
