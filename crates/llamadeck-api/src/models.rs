//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessageBody {
    /// "system", "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
    /// Base64-encoded images
    pub images: Option<Vec<String>>,
}

/// Chat request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequestBody {
    /// Model identifier
    pub model: String,
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessageBody>,
}

/// Model pull request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullModelBody {
    /// Model to download, e.g. "llama3:8b"
    pub model_name: String,
}

/// One Server-Sent-Events record of a model pull
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PullEventBody {
    /// "progress", "error" or "complete"
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable text
    pub data: String,
    /// Completion percentage, progress events only
    pub percent: Option<f64>,
}

/// Model deletion response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteModelResponse {
    /// Outcome summary
    pub message: String,
    /// Output of the delete command
    pub stdout: String,
    /// Diagnostics of the delete command
    pub stderr: String,
}

/// Pull cancellation response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelPullResponse {
    /// Model the cancellation targeted
    pub model: String,
    /// Whether a pull was in flight and got cancelled
    pub cancelled: bool,
}

/// In-flight pulls
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivePullsResponse {
    /// Models being downloaded, sorted
    pub models: Vec<String>,
    /// Total count
    pub total: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" when the daemon answers, "degraded" otherwise
    pub status: String,
    /// Server version
    pub version: String,
    /// Uptime in seconds
    pub uptime: u64,
    /// "reachable" or "unreachable"
    pub daemon: String,
    /// Number of in-flight pulls
    pub active_pulls: usize,
}
