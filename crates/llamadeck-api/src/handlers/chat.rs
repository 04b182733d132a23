//! Streaming chat endpoint

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use llamadeck_relay::ChatRequest;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{error::ApiResult, state::AppState};

/// Relay a chat to the daemon, streaming the reply as plain text
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = crate::models::ChatRequestBody,
    responses(
        (status = 200, description = "Reply text, streamed as it is generated", content_type = "text/plain", body = String),
        (status = 400, description = "Missing model or empty conversation"),
        (status = 502, description = "Daemon unreachable or returned an error")
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let model = request.model.clone();

    let cancel = CancellationToken::new();
    let mut deltas = state.chat.relay_chat(request, cancel.clone()).await?;

    // Dropping the body (client gone) cancels the upstream call.
    // An upstream failure aborts the body so the client never sees a clean end.
    let guard = cancel.drop_guard();
    let body = async_stream::stream! {
        let _guard = guard;
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => yield Ok::<_, std::io::Error>(text),
                Err(e) => {
                    warn!(model = %model, error = %e, "Chat reply truncated");
                    yield Err(std::io::Error::other(e.to_string()));
                    break;
                }
            }
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
