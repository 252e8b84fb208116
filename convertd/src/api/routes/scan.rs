//! Filesystem scan endpoint.

use axum::{Json, Router, extract::State, routing::post};
use tracing::{debug, error};

use crate::api::error::ApiError;
use crate::api::models::StatusResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/scan", post(scan))
}

async fn scan(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    if state.tasks.is_scanning() {
        return Err(ApiError::conflict("scan is already running"));
    }

    // The walk continues after the response; the worker is signaled when it
    // ends so freshly admitted files get picked up.
    let tasks = state.tasks.clone();
    tokio::spawn(async move {
        if let Err(e) = tasks.scan_media_root().await {
            error!(error = %e, "filesystem scan failed");
        } else {
            debug!("filesystem scan completed");
        }
        tasks.try_queue_conversion();
    });

    Ok(Json(StatusResponse::ok()))
}
