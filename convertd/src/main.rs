//! convertd - Media Transcoding Service
//!
//! Accepts conversion and deletion requests over HTTP, persists them in two
//! work queues, and transcodes in the background through ffmpeg.

use convertd::config::AppConfig;
use convertd::database;
use convertd::logging;
use convertd::services::ServiceContainer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before the config overlay reads them.
    dotenvy::dotenv().ok();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    logging::init(config.env);
    info!(env = ?config.env, "starting convertd v{}", env!("CARGO_PKG_VERSION"));

    // The media root: every stored path is an offset from here.
    let root = std::env::current_dir()?;

    info!(dsn = %config.database.dsn, "connecting to database");
    let pool = database::create_pool(&config.database.dsn).await?;

    let container = ServiceContainer::new(config, pool, root);
    container.start().await?;

    info!("convertd started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, initiating shutdown");
        }
        _ = wait_for_sigterm() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }

    container.shutdown().await;
    info!("convertd shutdown complete");
    Ok(())
}

/// Wait for SIGTERM (Unix only).
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    sigterm.recv().await;
}

/// On non-Unix targets SIGTERM does not exist; ctrl_c above covers shutdown.
#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
