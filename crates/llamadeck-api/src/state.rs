//! Application state for the API server

use std::{path::PathBuf, sync::Arc, time::Instant};

use llamadeck_relay::{
    ChatRelay, ChatUpstream, DaemonCommands, DownloadRegistry, DownloadRelay, OllamaClient,
};

use crate::{config::RelayConfig, error::ApiResult};

/// Application state shared across all API handlers
#[derive(Clone)]
pub struct AppState {
    /// Streaming chat relay
    pub chat: ChatRelay,
    /// Model download relay
    pub downloads: DownloadRelay,
    /// Daemon HTTP client for model metadata
    pub daemon: OllamaClient,
    /// Daemon CLI for model removal
    pub commands: DaemonCommands,
    /// Directory served as the frontend
    pub static_dir: PathBuf,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Wire the relays from configuration
    pub fn new(config: &RelayConfig) -> ApiResult<Self> {
        let daemon = OllamaClient::new(config.daemon.clone())?;
        Self::with_chat_upstream(config, daemon.clone(), Arc::new(daemon))
    }

    /// Like [`AppState::new`] but with a custom chat upstream
    pub fn with_chat_upstream(
        config: &RelayConfig,
        daemon: OllamaClient,
        upstream: Arc<dyn ChatUpstream>,
    ) -> ApiResult<Self> {
        let commands = DaemonCommands::new(config.commands.clone())?
            .with_daemon_host(daemon.base_url());
        let downloads = DownloadRelay::new(DownloadRegistry::new(), commands.clone());

        Ok(Self {
            chat: ChatRelay::new(upstream),
            downloads,
            daemon,
            commands,
            static_dir: config.server.static_dir.clone(),
            start_time: Instant::now(),
        })
    }

    /// Active download registry
    pub fn registry(&self) -> &DownloadRegistry {
        self.downloads.registry()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
