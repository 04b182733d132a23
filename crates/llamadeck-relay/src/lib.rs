//! Streaming relays between a browser client and a local Ollama daemon
//!
//! Two relays live here:
//! - [`ChatRelay`] turns the daemon's NDJSON chat stream into plain text deltas.
//! - [`DownloadRelay`] runs `ollama pull` as a child process and turns its
//!   progress output into typed [`PullEvent`]s.
//!
//! Both are built on the [`framer`] module and cancel through
//! `tokio_util::sync::CancellationToken`. The [`DownloadRegistry`] guarantees
//! at most one in-flight pull per model.

pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod framer;
pub mod models;
pub mod progress;
pub mod pull;
pub mod registry;
pub mod upstream;

pub use chat::{ChatRelay, ChatStream};
pub use commands::{DaemonCommands, ModelRemoval};
pub use config::{CommandConfig, DaemonConfig};
pub use error::RelayError;
pub use framer::{FrameMode, Framer};
pub use models::{ChatDelta, ChatMessage, ChatRequest, PullEvent, PullRequest, RelayOutcome};
pub use progress::{parse_progress, ProgressUpdate};
pub use pull::{DownloadRelay, PullStream};
pub use registry::{DownloadHandle, DownloadRegistry};
pub use upstream::{ByteStream, ChatUpstream, OllamaClient};

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
