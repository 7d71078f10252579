//! Bonfire World Server
//!
//! Serves the shared campfire world over WebSocket and keeps the fire
//! simulation ticking in the background.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bonfire::{
    BonfireServer, GameConfig, ServerConfig, SnapshotStore, SystemClock, Clock, VERSION,
    WorldService,
    core::hash::short_hex,
    core::time::format_timestamp,
    game::CHAT_CAPACITY,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env();

    info!("Bonfire Server v{}", config.version);
    info!("State file: {}", config.state_path.display());
    info!("Tick interval: {:?}", config.tick_interval);

    let store = SnapshotStore::new(&config.state_path);
    let (state, source) = store.load_with_source(SystemClock.now());
    info!(
        "World {} loaded from {:?}: {} trees, {} logs, fire {:.2} ({:?}), last tick {}",
        short_hex(&state.compute_hash()),
        source,
        state.trees,
        state.wood_storage,
        state.fire_size,
        state.fire_stage(),
        format_timestamp(state.last_update)
    );
    info!("Chat capacity: {} messages", CHAT_CAPACITY);

    let world = Arc::new(WorldService::with_system_clock(store, GameConfig::default()));
    let server = BonfireServer::new(config, world);

    tokio::select! {
        result = server.run() => {
            result.context("Server stopped with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down v{}", VERSION);
            server.shutdown();
        }
    }

    Ok(())
}
