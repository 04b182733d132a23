//! Daemon connection and command configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{error::RelayError, Result};

/// How to reach the Ollama HTTP API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Base URL for the Ollama API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout for non-streaming requests (list, show) in seconds.
    /// Streaming chat calls are not bounded by it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Pool idle timeout in seconds
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,

    /// TCP keep-alive interval in seconds
    #[serde(default = "default_tcp_keepalive_secs")]
    pub tcp_keepalive_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            tcp_keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

impl DaemonConfig {
    /// Config pointing at a specific daemon URL, other fields default
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    pub fn tcp_keepalive(&self) -> Duration {
        Duration::from_secs(self.tcp_keepalive_secs)
    }

    /// Base URL without a trailing slash
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(RelayError::Config(
                "Ollama base URL is required".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(RelayError::Config(format!(
                "Ollama base URL must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(RelayError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// How to invoke the daemon's command-line tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandConfig {
    /// Executable name or path
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the model name when pulling
    #[serde(default = "default_pull_args")]
    pub pull_args: Vec<String>,

    /// Arguments placed before the model name when removing
    #[serde(default = "default_remove_args")]
    pub remove_args: Vec<String>,

    /// Timeout for the remove command in seconds
    #[serde(default = "default_remove_timeout_secs")]
    pub remove_timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            pull_args: default_pull_args(),
            remove_args: default_remove_args(),
            remove_timeout_secs: default_remove_timeout_secs(),
        }
    }
}

impl CommandConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(RelayError::Config(
                "Command program cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn remove_timeout(&self) -> Duration {
        Duration::from_secs(self.remove_timeout_secs)
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_tcp_keepalive_secs() -> u64 {
    60
}

fn default_program() -> String {
    "ollama".to_string()
}

fn default_pull_args() -> Vec<String> {
    vec!["pull".to_string()]
}

fn default_remove_args() -> Vec<String> {
    vec!["rm".to_string()]
}

fn default_remove_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_daemon_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_root_strips_trailing_slash() {
        let config = DaemonConfig::with_base_url("http://127.0.0.1:11434/");
        assert_eq!(config.api_root(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = DaemonConfig::with_base_url("");
        match config.validate() {
            Err(RelayError::Config(msg)) => assert!(msg.contains("base URL is required")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let config = DaemonConfig::with_base_url("localhost:11434");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: CommandConfig = serde_json::from_str(r#"{"program": "/usr/local/bin/ollama"}"#).unwrap();
        assert_eq!(config.program, "/usr/local/bin/ollama");
        assert_eq!(config.pull_args, vec!["pull"]);
        assert_eq!(config.remove_args, vec!["rm"]);
    }

    #[test]
    fn test_empty_program_rejected() {
        let config = CommandConfig {
            program: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
