//! Managed child process wrapper

use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::{
    config::ProcessConfig,
    error::{ProcessError, Result},
    manager::ProcessOutput,
};

/// Grace period between SIGTERM and SIGKILL
const SIGKILL_TIMEOUT_MS: u64 = 200;

/// How long `shutdown` waits for the process to exit after kill
const SHUTDOWN_WAIT_SECS: u64 = 5;

/// Wrapper around tokio::process::Child with lifecycle management
pub struct ManagedChild {
    child: Child,
    config: ProcessConfig,
    pid: u32,
}

impl ManagedChild {
    pub(crate) fn new(child: Child, config: ProcessConfig) -> Self {
        let pid = child.id().unwrap_or(0);
        Self { child, config, pid }
    }

    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get process configuration
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Check if process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for process to exit
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        match self.config.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.child.wait())
                .await
                .map_err(|_| ProcessError::Timeout {
                    seconds: timeout.as_secs(),
                })?
                .map_err(Into::into),
            None => self.child.wait().await.map_err(Into::into),
        }
    }

    /// Wait for the process to exit and collect whatever it wrote
    pub async fn output(self) -> Result<ProcessOutput> {
        let timeout = self.config.timeout;
        let pending = self.child.wait_with_output();

        let output = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| ProcessError::Timeout {
                    seconds: timeout.as_secs(),
                })??,
            None => pending.await?,
        };

        Ok(ProcessOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Gracefully shutdown process
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        debug!(pid = %self.pid, "Shutting down process");

        if let Err(e) = self.child.kill().await {
            warn!(pid = %self.pid, error = %e, "Failed to kill process");
            return Err(ProcessError::KillFailed(e.to_string()));
        }

        let timeout = Duration::from_secs(SHUTDOWN_WAIT_SECS);
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => {
                debug!(pid = %self.pid, "Process shut down");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(pid = %self.pid, error = %e, "Error waiting for process");
                Err(ProcessError::KillFailed(e.to_string()))
            }
            Err(_) => {
                warn!(pid = %self.pid, "Timeout waiting for process to exit");
                Err(ProcessError::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
        }
    }

    /// Kill process tree (process and all descendants)
    ///
    /// - Windows: Uses `taskkill /pid <pid> /f /t`
    /// - Unix: SIGTERM to the process group, SIGKILL if it is still alive
    ///   after a short grace period
    ///
    /// The child is reaped before returning.
    pub async fn kill_tree(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        debug!(pid = %self.pid, "Killing process tree");

        #[cfg(windows)]
        {
            use tokio::process::Command;

            let mut killer = Command::new("taskkill")
                .args(["/pid", &self.pid.to_string(), "/f", "/t"])
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
                .map_err(|e| ProcessError::KillFailed(e.to_string()))?;

            let _ = killer.wait().await;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let pgid = Pid::from_raw(self.pid as i32);

            if let Err(e) = killpg(pgid, Signal::SIGTERM) {
                warn!(pid = %self.pid, error = %e, "Failed to send SIGTERM, killing process only");
                let _ = self.child.start_kill();
            }

            let grace = Duration::from_millis(SIGKILL_TIMEOUT_MS);
            if tokio::time::timeout(grace, self.child.wait()).await.is_err() {
                match killpg(pgid, Signal::SIGKILL) {
                    Ok(_) => debug!(pid = %self.pid, "Sent SIGKILL to process group"),
                    Err(e) => {
                        warn!(pid = %self.pid, error = %e, "Failed to send SIGKILL, killing process only");
                        let _ = self.child.start_kill();
                    }
                }
            }
        }

        self.child
            .wait()
            .await
            .map_err(|e| ProcessError::KillFailed(e.to_string()))?;
        debug!(pid = %self.pid, "Process tree killed");
        Ok(())
    }

    /// Take stdout handle
    pub fn stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    /// Take stderr handle
    pub fn stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }
}
