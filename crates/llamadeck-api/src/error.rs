//! API error types and handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use llamadeck_relay::RelayError;
use serde_json::json;
use thiserror::Error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body could not be parsed
    #[error("Invalid JSON body: {0}")]
    InvalidBody(#[from] JsonRejection),

    /// Failure inside the relay layer
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ApiError {
    /// HTTP status and machine-readable error type
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidBody(rejection) => (rejection.status(), "invalid_body"),
            ApiError::Relay(err) => match err {
                RelayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
                RelayError::AlreadyInProgress(_) => (StatusCode::CONFLICT, "already_in_progress"),
                RelayError::ModelNotFound(_) => (StatusCode::NOT_FOUND, "model_not_found"),
                RelayError::UpstreamUnavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "upstream_unavailable")
                }
                RelayError::UpstreamStream(_) => (StatusCode::BAD_GATEWAY, "upstream_stream_error"),
                RelayError::CommandFailed(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "command_failed")
                }
                RelayError::Process(_) => (StatusCode::INTERNAL_SERVER_ERROR, "process_error"),
                RelayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
                RelayError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();

        if status.is_server_error() {
            tracing::error!(error_type, "{}", self);
        } else {
            tracing::debug!(error_type, "{}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
