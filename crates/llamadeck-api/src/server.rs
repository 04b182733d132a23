//! HTTP server lifecycle

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::{config::RelayConfig, error::ApiResult, routes, state::AppState};

/// Configured API server
pub struct ApiServer {
    config: RelayConfig,
    state: AppState,
}

impl ApiServer {
    /// Build the server and its relays from configuration
    pub fn new(config: RelayConfig) -> ApiResult<Self> {
        let state = AppState::new(&config)?;
        Ok(Self { config, state })
    }

    /// Shared application state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with every route and layer applied
    pub fn router(&self) -> Router {
        routes::all_routes(self.state.clone())
    }

    /// Bind and serve until Ctrl-C
    pub async fn serve(self) -> std::io::Result<()> {
        let address = self.config.server.bind_address();
        let listener = TcpListener::bind(&address).await?;

        info!(
            address = %address,
            daemon = %self.state.daemon.base_url(),
            static_dir = %self.config.server.static_dir.display(),
            "Server listening: http://{}",
            address
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
