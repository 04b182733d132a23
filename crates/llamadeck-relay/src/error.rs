//! Error types for relay operations

use llamadeck_process::ProcessError;
use thiserror::Error;

/// Errors that can occur while relaying chat or model operations
///
/// Cancellation is deliberately absent: a cancelled relay ends normally and
/// reports [`crate::RelayOutcome::Cancelled`].
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream stream error: {0}")]
    UpstreamStream(String),

    #[error("Download already in progress for model: {0}")]
    AlreadyInProgress(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() || err.is_decode() {
            RelayError::UpstreamStream(err.to_string())
        } else {
            RelayError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl RelayError {
    /// Whether the caller is at fault (maps to a 4xx response)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::InvalidRequest(_)
                | RelayError::AlreadyInProgress(_)
                | RelayError::ModelNotFound(_)
        )
    }
}
