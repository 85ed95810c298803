//! Tradewinds multiplayer game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod protocol;
mod room;
mod server;
mod store;

use config::ServerConfig;
use server::ServerState;
use store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        "Starting Tradewinds server (turn order {:?}, free setup builds {})",
        config.game.turn_order, config.game.free_setup_builds
    );

    let state = Arc::new(ServerState::new(config, Arc::new(MemoryStore::new())));

    server::run_server(state).await
}
