//! # llamadeck-process
//!
//! Process lifecycle management for the daemon's command-line operations
//! (`ollama pull`, `ollama rm`).
//!
//! ## Features
//!
//! - **Process Spawning**: Async process creation with piped stdout/stderr
//! - **Run to completion**: Capture exit status and output of short commands
//! - **Graceful Shutdown**: kill + bounded wait
//! - **Process Tree Kill**: Kill process groups on Unix, task trees on Windows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use llamadeck_process::{ProcessManager, ProcessConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ProcessManager::new();
//!
//! let config = ProcessConfig::new("ollama").args(["pull", "llama3"]);
//! let mut child = manager.spawn(config).await?;
//!
//! let stdout = child.stdout();
//! // ... read progress from stdout ...
//! manager.kill_tree(child).await?;
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod config;
pub mod error;
pub mod manager;

pub use child::ManagedChild;
pub use config::ProcessConfig;
pub use error::{ProcessError, Result};
pub use manager::{ProcessManager, ProcessOutput};
