//! Conversion admission endpoint.

use axum::{Json, Router, extract::State, routing::post};
use tracing::debug;

use crate::api::error::{ApiError, conversion_error};
use crate::api::models::{ConvertRequest, EnqueueResponse};
use crate::api::routes::validate_path;
use crate::api::server::AppState;
use crate::database::models::ConversionInfo;
use crate::media::FileInfo;

pub fn router() -> Router<AppState> {
    Router::new().route("/convert", post(convert))
}

async fn convert(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    validate_path(&req.path)?;

    let info = ConversionInfo::new(FileInfo::from_path(&req.path), req.convert_to);
    let id = state
        .conversion_queue
        .add(info)
        .await
        .map_err(conversion_error)?;

    debug!(path = %req.path, id, "file added to conversion queue");

    // Try to process the file immediately.
    state.tasks.try_queue_conversion();

    Ok(Json(EnqueueResponse::new(id)))
}
