//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::database::models::TargetFormat;

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub path: String,
    /// Absent or empty means "use the per-media-class defaults".
    #[serde(default)]
    pub convert_to: Vec<TargetFormat>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub path: String,
}

/// The `{status, error?}` envelope every JSON endpoint answers with.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "OK",
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "Error",
            error: Some(message.into()),
        }
    }
}

/// Successful admission: the envelope plus the new entry id.
#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    #[serde(flatten)]
    pub response: StatusResponse,
    pub id: i64,
}

impl EnqueueResponse {
    pub fn new(id: i64) -> Self {
        Self {
            response: StatusResponse::ok(),
            id,
        }
    }
}
