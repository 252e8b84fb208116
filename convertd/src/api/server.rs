//! API server setup.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::routes;
use crate::config::HttpServerConfig;
use crate::queue::{ConversionQueue, DeletionQueue};
use crate::task::TaskService;
use crate::{Error, Result};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub conversion_queue: Arc<ConversionQueue>,
    pub deletion_queue: Arc<DeletionQueue>,
    pub tasks: Arc<TaskService>,
}

/// Bind the listener. Kept separate from [`serve`] so a bad address is a
/// startup failure rather than a background-task log line.
pub async fn bind(config: &HttpServerConfig) -> Result<TcpListener> {
    let listener = TcpListener::bind(&config.address)
        .await
        .map_err(|e| Error::Other(format!("cannot bind '{}': {}", config.address, e)))?;
    info!(address = %config.address, "HTTP server listening");
    Ok(listener)
}

/// Serve until the cancellation token latches, then drain in-flight
/// connections.
pub async fn serve(
    listener: TcpListener,
    config: HttpServerConfig,
    state: AppState,
    token: CancellationToken,
) -> Result<()> {
    let app: Router = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(config.write_timeout)));

    axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
