//! HTTP client for the Ollama daemon
//!
//! Chat goes through the [`ChatUpstream`] trait so the relay can be driven by
//! any byte source in tests. Model metadata calls return the daemon's JSON
//! untouched; the browser consumes it as-is.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{config::DaemonConfig, error::RelayError, models::ChatMessage, Result};

/// Health check timeout
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Raw body chunks of a streaming upstream response
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Sampling options sent with every chat request
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

/// Chat request in the daemon's shape
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpstreamChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: SamplingOptions,
}

/// Source of streaming chat responses
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Start a streaming chat call.
    ///
    /// Fails with [`RelayError::UpstreamUnavailable`] when the call cannot be
    /// established or the daemon answers with a non-success status. Dropping
    /// the returned stream aborts the underlying connection.
    async fn open_chat(&self, request: &UpstreamChatRequest) -> Result<ByteStream>;
}

/// Ollama daemon client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Arc<Client>,
    config: DaemonConfig,
}

impl OllamaClient {
    /// Create a client with connection pooling and keep-alive.
    ///
    /// No overall request timeout is set on the client: chat streams may run
    /// for minutes. Non-streaming calls apply `request_timeout` per request.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(config.pool_idle_timeout())
            .tcp_keepalive(config.tcp_keepalive())
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn with_default_endpoint() -> Result<Self> {
        Self::new(DaemonConfig::default())
    }

    pub fn base_url(&self) -> &str {
        self.config.api_root()
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_root(), path)
    }

    /// `GET /api/tags`: locally available models
    pub async fn list_models(&self) -> Result<Value> {
        debug!("Listing models");

        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Failed to list models: {}", error_text);
            return Err(RelayError::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            error!("Failed to parse tags response: {}", e);
            RelayError::UpstreamUnavailable(e.to_string())
        })
    }

    /// `POST /api/show`: metadata for one model
    pub async fn show_model(&self, model_name: &str) -> Result<Value> {
        if model_name.trim().is_empty() {
            return Err(RelayError::InvalidRequest(
                "Model name cannot be empty".to_string(),
            ));
        }

        debug!(model = %model_name, "Getting model info");

        let response = self
            .client
            .post(self.url("/api/show"))
            .timeout(self.config.request_timeout())
            .json(&serde_json::json!({ "name": model_name }))
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(RelayError::ModelNotFound(model_name.to_string()));
            }
            let error_text = response.text().await.unwrap_or_default();
            error!(model = %model_name, "Failed to get model info: {}", error_text);
            return Err(RelayError::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            error!("Failed to parse model info response: {}", e);
            RelayError::UpstreamUnavailable(e.to_string())
        })
    }

    /// Whether the daemon answers on its root endpoint
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.url("/"))
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => {
                let healthy = response.status().is_success();
                if !healthy {
                    warn!("Ollama health check failed: HTTP {}", response.status());
                }
                healthy
            }
            Err(e) => {
                warn!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ChatUpstream for OllamaClient {
    async fn open_chat(&self, request: &UpstreamChatRequest) -> Result<ByteStream> {
        debug!(model = %request.model, messages = request.messages.len(), "Opening chat stream");

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama chat request failed: {}", e);
                RelayError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(RelayError::UpstreamUnavailable(format!(
                "Ollama API error: {}. {}",
                status, error_text
            )));
        }

        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| RelayError::UpstreamStream(e.to_string()))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_empty_url() {
        let result = OllamaClient::new(DaemonConfig::with_base_url(""));
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn test_default_endpoint() {
        let client = OllamaClient::with_default_endpoint().unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_upstream_request_shape() {
        let request = UpstreamChatRequest {
            model: "llama3".to_string(),
            messages: vec![ChatMessage::new("user", "hello")],
            stream: true,
            options: SamplingOptions {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.9,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["options"]["top_k"], 40);
        assert_eq!(value["messages"][0]["content"], "hello");
        assert!(value["messages"][0].get("images").is_none());
    }
}
