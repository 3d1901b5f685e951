use std::sync::Arc;
use tracing::info;

use pharos::{
    assets::DiskAssets, config::Config, presence::PresenceRegistry, server::ChatServer,
    store::Store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Pharos daemon starting...");

    let config = Config::from_env()?;

    info!("Initializing store at {}", config.db_path().display());
    let store = Store::new(config.db_path()).await?;
    store.init().await?;

    // Presence lives and dies with this process; it starts empty on every
    // boot and is populated only by connection lifecycle events.
    let presence = Arc::new(PresenceRegistry::new());

    let assets = Arc::new(DiskAssets::new(
        config.assets_dir(),
        config.public_url.clone(),
    )?);

    let server = ChatServer::new(store, presence, assets, config.assets_dir());
    let app = server.router();

    info!("Starting messaging server on port {}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                info!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
