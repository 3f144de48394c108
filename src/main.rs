mod config;
mod error;
mod mcp;
mod platform;
mod relay;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::mcp::RelayServer;
use crate::platform::telegram::TelegramApi;
use crate::relay::{Relay, RelaySettings};
use crate::state::FileCursorStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. stdout carries the tool protocol, so log to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Chat id: {}", config.chat_id());
    info!("  State file: {}", config.state.path.display());
    info!("  Reply wait: {}s", config.relay.reply_wait_secs);

    let api = Arc::new(TelegramApi::new(
        &config.telegram.bot_token,
        &config.telegram.api_base_url,
        config.relay.send_timeout_secs,
    ));
    let store = Arc::new(FileCursorStore::new(config.state.path.clone()));
    let relay = Arc::new(Relay::new(
        api,
        store,
        config.chat_id(),
        RelaySettings::from_config(&config),
    ));

    info!("Relay server is starting on stdio...");
    let service = RelayServer::new(relay, Arc::new(config))
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP server")?;

    service.waiting().await.context("MCP server stopped with error")?;
    info!("Relay server stopped");

    Ok(())
}
