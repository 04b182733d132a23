#![warn(missing_docs)]

//! llamadeck HTTP API
//!
//! Serves the static chat frontend and relays its requests to a local Ollama
//! daemon: streaming chat, model listing and inspection, model pulls with
//! Server-Sent-Events progress, and model removal.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use config::RelayConfig;
pub use server::ApiServer;
pub use state::AppState;
