//! Liveness probe.

use axum::{Router, routing::get};

use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthcheck", get(healthcheck))
}

async fn healthcheck() -> &'static str {
    "alive"
}
