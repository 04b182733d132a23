//! Process manager - lifecycle orchestration

use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    child::ManagedChild,
    config::ProcessConfig,
    error::{ProcessError, Result},
};

/// Captured result of a process that ran to completion
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Captured stdout, lossily decoded
    pub stdout: String,
    /// Captured stderr, lossily decoded
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Manages process lifecycle
#[derive(Debug, Clone, Copy)]
pub struct ProcessManager;

impl ProcessManager {
    /// Create new process manager
    pub fn new() -> Self {
        Self
    }

    /// Spawn a managed process
    ///
    /// On Unix the child is placed in its own process group so that
    /// [`ManagedChild::kill_tree`] reaches every descendant.
    ///
    /// # Examples
    /// ```no_run
    /// use llamadeck_process::{ProcessManager, ProcessConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let manager = ProcessManager::new();
    /// let config = ProcessConfig::new("echo").args(["hello"]);
    /// let child = manager.spawn(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn spawn(&self, config: ProcessConfig) -> Result<ManagedChild> {
        if config.command.trim().is_empty() {
            return Err(ProcessError::InvalidConfig(
                "command cannot be empty".to_string(),
            ));
        }

        debug!(
            command = %config.command,
            args = ?config.args,
            "Spawning process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let pid = child.id().ok_or_else(|| {
            ProcessError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Failed to get process ID",
            ))
        })?;

        info!(pid = %pid, command = %config.display(), "Process spawned");

        Ok(ManagedChild::new(child, config))
    }

    /// Spawn a process and wait for it to finish, capturing its output
    pub async fn run(&self, config: ProcessConfig) -> Result<ProcessOutput> {
        let child = self.spawn(config).await?;
        child.output().await
    }

    /// Gracefully shutdown a process
    pub async fn shutdown(&self, mut child: ManagedChild) -> Result<()> {
        child.shutdown().await
    }

    /// Kill a process tree (process and all descendants)
    pub async fn kill_tree(&self, mut child: ManagedChild) -> Result<()> {
        child.kill_tree().await
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
