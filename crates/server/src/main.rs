use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use server::{AppState, routes};
use services::services::{config::Config, storage::FilesystemStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    utils::logging::init();

    let config = Config::from_env()?;
    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .with_context(|| format!("failed to create storage root {}", config.storage_root.display()))?;
    let store = Arc::new(FilesystemStore::new(&config.storage_root));

    let state = AppState::new(db, store, config.upload_policy());
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        storage_root = %config.storage_root.display(),
        max_upload_bytes = config.upload_max_bytes,
        "Document server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
    info!("Shutting down");
}
