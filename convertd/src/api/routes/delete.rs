//! Deletion admission endpoint.

use axum::{Json, Router, extract::State, routing::post};
use tracing::debug;

use crate::api::error::{ApiError, deletion_error};
use crate::api::models::{DeleteRequest, EnqueueResponse};
use crate::api::routes::validate_path;
use crate::api::server::AppState;
use crate::database::models::DeletionInfo;

pub fn router() -> Router<AppState> {
    Router::new().route("/delete", post(delete))
}

async fn delete(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    validate_path(&req.path)?;

    let id = state
        .deletion_queue
        .add(DeletionInfo::new(&req.path))
        .await
        .map_err(deletion_error)?;

    debug!(path = %req.path, id, "file added to deletion queue");

    // Try to process the file immediately.
    state.tasks.try_queue_deletion();

    Ok(Json(EnqueueResponse::new(id)))
}
