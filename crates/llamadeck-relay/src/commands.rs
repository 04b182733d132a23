//! Daemon command-line operations
//!
//! Pulls and removals go through the daemon's CLI. Arguments are passed to the
//! program directly; no shell is involved.

use llamadeck_process::{ProcessConfig, ProcessManager};
use serde::Serialize;
use tracing::{info, warn};

use crate::{config::CommandConfig, error::RelayError, Result};

/// Environment variable the daemon CLI reads to find its server
pub const DAEMON_HOST_ENV: &str = "OLLAMA_HOST";

/// Output of a successful model removal
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelRemoval {
    pub stdout: String,
    pub stderr: String,
}

/// Builds and runs daemon CLI commands
#[derive(Debug, Clone)]
pub struct DaemonCommands {
    config: CommandConfig,
    processes: ProcessManager,
    daemon_host: Option<String>,
}

impl DaemonCommands {
    pub fn new(config: CommandConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            processes: ProcessManager::new(),
            daemon_host: None,
        })
    }

    /// Point the CLI at the same daemon the HTTP client talks to
    pub fn with_daemon_host(mut self, base_url: &str) -> Self {
        self.daemon_host = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    /// Command line for pulling `model`, with piped stdout and stderr
    pub fn pull_config(&self, model: &str) -> Result<ProcessConfig> {
        validate_model_name(model)?;
        Ok(self.command(&self.config.pull_args, model))
    }

    /// Run the remove command for `model` and wait for it
    pub async fn remove(&self, model: &str) -> Result<ModelRemoval> {
        validate_model_name(model)?;

        let config = self
            .command(&self.config.remove_args, model)
            .timeout(self.config.remove_timeout());

        let output = self.processes.run(config).await?;
        if !output.success() {
            warn!(
                model = %model,
                status = %output.status,
                stderr = %output.stderr.trim(),
                "Model removal failed"
            );
            let detail = match output.stderr.trim() {
                "" => format!("exited with {}", output.status),
                stderr => stderr.to_string(),
            };
            return Err(RelayError::CommandFailed(format!(
                "Failed to delete model {}: {}",
                model, detail
            )));
        }

        info!(model = %model, "Model removed");
        Ok(ModelRemoval {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn command(&self, args: &[String], model: &str) -> ProcessConfig {
        let config = ProcessConfig::new(&self.config.program)
            .args(args.iter().cloned())
            .arg(model);
        match &self.daemon_host {
            Some(host) => config.env(DAEMON_HOST_ENV, host.as_str()),
            None => config,
        }
    }
}

/// Reject names that could be read as flags or split into several arguments
pub fn validate_model_name(model: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(RelayError::InvalidRequest(
            "Model name is required".to_string(),
        ));
    }
    if model.starts_with('-') {
        return Err(RelayError::InvalidRequest(format!(
            "Model name cannot start with '-': {}",
            model
        )));
    }
    if model.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RelayError::InvalidRequest(format!(
            "Model name cannot contain whitespace: {:?}",
            model
        )));
    }
    Ok(())
}
