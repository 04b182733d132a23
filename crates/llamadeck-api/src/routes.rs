//! API route definitions

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    handlers::{chat, health, models},
    middleware::logging_middleware,
    state::AppState,
};

/// Chat bodies carry base64 images
pub const CHAT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Chat
        .route(
            "/api/chat",
            post(chat::chat).layer(DefaultBodyLimit::max(CHAT_BODY_LIMIT)),
        )
        // Model management
        .route("/api/models", get(models::list_models))
        .route(
            "/api/models/pull",
            get(models::active_pulls).post(models::pull_model),
        )
        .route("/api/models/pull/:name", delete(models::cancel_pull))
        .route(
            "/api/models/:name",
            get(models::get_model).delete(models::delete_model),
        )
        // CORS
        .layer(CorsLayer::permissive())
}

/// OpenAPI document route
pub fn docs_routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Combined routes with the static frontend as fallback
pub fn all_routes(state: AppState) -> Router {
    let frontend = ServeDir::new(&state.static_dir);

    api_routes()
        .merge(docs_routes())
        .fallback_service(frontend)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OpenAPI document for every endpoint
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        chat::chat,
        models::list_models,
        models::get_model,
        models::delete_model,
        models::pull_model,
        models::cancel_pull,
        models::active_pulls,
    ),
    components(schemas(
        crate::models::ChatMessageBody,
        crate::models::ChatRequestBody,
        crate::models::PullModelBody,
        crate::models::PullEventBody,
        crate::models::DeleteModelResponse,
        crate::models::CancelPullResponse,
        crate::models::ActivePullsResponse,
        crate::models::HealthResponse,
    )),
    info(
        title = "llamadeck API",
        version = "1.0.0",
        description = "Browser-facing relay for a local Ollama daemon"
    )
)]
pub struct ApiDoc;
