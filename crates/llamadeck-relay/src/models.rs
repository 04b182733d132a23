//! Data models shared by the relays and the HTTP layer

use serde::{Deserialize, Serialize};

use crate::{error::RelayError, Result};

/// A fragment of assistant text. Concatenating all deltas of one reply in
/// arrival order reconstructs the full reply.
pub type ChatDelta = String;

/// One chat message as sent by the browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,

    /// Message text
    #[serde(default, alias = "text")]
    pub content: String,

    /// Base64-encoded images for multimodal models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    /// Plain text message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            images: None,
        }
    }

    fn has_payload(&self) -> bool {
        !self.content.trim().is_empty()
            || self.images.as_ref().is_some_and(|images| !images.is_empty())
    }
}

/// Chat request accepted from the browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Model identifier, e.g. "llava-llama3"
    #[serde(default)]
    pub model: String,

    /// Conversation so far, oldest first
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }

    /// Check the request invariants: a model is named and at least one
    /// message carries text or an image.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(RelayError::InvalidRequest(
                "Model name is required".to_string(),
            ));
        }
        if !self.messages.iter().any(ChatMessage::has_payload) {
            return Err(RelayError::InvalidRequest(
                "At least one message must contain text or an image".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request to download a model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    #[serde(default, rename = "modelName", alias = "model", alias = "name")]
    pub model_name: String,
}

/// Event emitted while a model is being pulled
///
/// Serialized as `{"type": "progress" | "error" | "complete", "data": "<text>"}`,
/// with an extra `percent` number on progress events that carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WirePullEvent", try_from = "WirePullEvent")]
pub enum PullEvent {
    Progress { text: String, percent: Option<f64> },
    Error { text: String },
    Complete { text: String },
}

impl PullEvent {
    /// Event type tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            PullEvent::Progress { .. } => "progress",
            PullEvent::Error { .. } => "error",
            PullEvent::Complete { .. } => "complete",
        }
    }

    /// Human-readable text of the event
    pub fn text(&self) -> &str {
        match self {
            PullEvent::Progress { text, .. }
            | PullEvent::Error { text }
            | PullEvent::Complete { text } => text,
        }
    }

    /// Encode as one Server-Sent-Events record: `data: {...}\n\n`
    pub fn to_sse_record(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WirePullEvent {
    #[serde(rename = "type")]
    kind: String,
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percent: Option<f64>,
}

impl From<PullEvent> for WirePullEvent {
    fn from(event: PullEvent) -> Self {
        let kind = event.kind().to_string();
        match event {
            PullEvent::Progress { text, percent } => Self {
                kind,
                data: text,
                percent,
            },
            PullEvent::Error { text } | PullEvent::Complete { text } => Self {
                kind,
                data: text,
                percent: None,
            },
        }
    }
}

impl TryFrom<WirePullEvent> for PullEvent {
    type Error = String;

    fn try_from(wire: WirePullEvent) -> std::result::Result<Self, String> {
        match wire.kind.as_str() {
            "progress" => Ok(PullEvent::Progress {
                text: wire.data,
                percent: wire.percent,
            }),
            "error" => Ok(PullEvent::Error { text: wire.data }),
            "complete" => Ok(PullEvent::Complete { text: wire.data }),
            other => Err(format!("unknown pull event type: {}", other)),
        }
    }
}

/// How a relay invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream finished successfully
    Completed,
    /// Upstream failed; the message is for logs
    Failed(String),
    /// Caller or registry cancelled the operation
    Cancelled,
}
