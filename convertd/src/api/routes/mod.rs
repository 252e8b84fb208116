//! API route modules.

pub mod convert;
pub mod delete;
pub mod health;
pub mod scan;

use axum::Router;

use crate::api::error::ApiError;
use crate::api::server::AppState;

/// Create the main router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(convert::router())
        .merge(delete::router())
        .merge(scan::router())
        .with_state(state)
}

/// Submitted paths must be leading-slash offsets from the media root.
pub(crate) fn validate_path(path: &str) -> Result<(), ApiError> {
    if path.trim().is_empty() {
        return Err(ApiError::bad_request("path must not be empty"));
    }
    if !path.starts_with('/') {
        return Err(ApiError::bad_request("path must begin with '/'"));
    }
    Ok(())
}
