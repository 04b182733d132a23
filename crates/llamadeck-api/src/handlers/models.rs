//! Model management handlers

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use llamadeck_relay::PullRequest;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    error::ApiResult,
    models::{ActivePullsResponse, CancelPullResponse, DeleteModelResponse},
    state::AppState,
};

/// List locally available models
#[utoipa::path(
    get,
    path = "/api/models",
    responses(
        (status = 200, description = "Daemon model list, passed through", body = serde_json::Value),
        (status = 502, description = "Daemon unreachable")
    )
)]
pub async fn list_models(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.daemon.list_models().await?))
}

/// Show details of one model
#[utoipa::path(
    get,
    path = "/api/models/{name}",
    params(("name" = String, Path, description = "Model name")),
    responses(
        (status = 200, description = "Daemon model details, passed through", body = serde_json::Value),
        (status = 404, description = "Model not found"),
        (status = 502, description = "Daemon unreachable")
    )
)]
pub async fn get_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.daemon.show_model(&name).await?))
}

/// Delete a local model
#[utoipa::path(
    delete,
    path = "/api/models/{name}",
    params(("name" = String, Path, description = "Model name")),
    responses(
        (status = 200, description = "Model deleted", body = DeleteModelResponse),
        (status = 400, description = "Invalid model name"),
        (status = 500, description = "Delete command failed")
    )
)]
pub async fn delete_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DeleteModelResponse>> {
    let removal = state.commands.remove(&name).await?;
    info!(model = %name, "Model deleted");

    Ok(Json(DeleteModelResponse {
        message: "Model deleted successfully".to_string(),
        stdout: removal.stdout,
        stderr: removal.stderr,
    }))
}

/// Pull a model, streaming progress as Server-Sent Events
#[utoipa::path(
    post,
    path = "/api/models/pull",
    request_body = crate::models::PullModelBody,
    responses(
        (status = 200, description = "Progress records until a terminal complete or error record", content_type = "text/event-stream", body = crate::models::PullEventBody),
        (status = 400, description = "Missing or invalid model name"),
        (status = 409, description = "A pull of this model is already running")
    )
)]
pub async fn pull_model(
    State(state): State<AppState>,
    payload: Result<Json<PullRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let mut events = state
        .downloads
        .relay_pull(&request.model_name, CancellationToken::new())?;

    let body = async_stream::stream! {
        while let Some(event) = events.next().await {
            let record = event.to_sse_record().unwrap_or_else(|e| {
                error!(error = %e, "Failed to encode pull event");
                String::new()
            });
            yield Ok::<_, Infallible>(record);
        }
        debug!(model = %events.model_id(), outcome = ?events.outcome(), "Pull stream closed");
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Cancel an in-flight pull
#[utoipa::path(
    delete,
    path = "/api/models/pull/{name}",
    params(("name" = String, Path, description = "Model name")),
    responses(
        (status = 200, description = "Cancellation result", body = CancelPullResponse)
    )
)]
pub async fn cancel_pull(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<CancelPullResponse> {
    let cancelled = state.downloads.cancel(&name);
    if cancelled {
        info!(model = %name, "Pull cancelled by request");
    }
    Json(CancelPullResponse {
        model: name,
        cancelled,
    })
}

/// List in-flight pulls
#[utoipa::path(
    get,
    path = "/api/models/pull",
    responses(
        (status = 200, description = "Models being downloaded", body = ActivePullsResponse)
    )
)]
pub async fn active_pulls(State(state): State<AppState>) -> Json<ActivePullsResponse> {
    let models = state.downloads.active();
    Json(ActivePullsResponse {
        total: models.len(),
        models,
    })
}
