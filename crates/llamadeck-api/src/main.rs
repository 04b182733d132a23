//! llamadeck server entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use llamadeck_api::{ApiServer, RelayConfig};

/// Browser chat front end for a local Ollama daemon
#[derive(Debug, Parser)]
#[command(name = "llamadeck", version, about)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overrides configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address, overrides configuration
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RelayConfig::load_from(path, true)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RelayConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .init();

    let server = ApiServer::new(config)?;
    match server.serve().await {
        Ok(()) => {
            tracing::info!("Server shut down gracefully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
