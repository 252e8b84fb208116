//! API error handling: one error type that renders as the JSON envelope,
//! plus the admission-error → status-code mappings for the two queues.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::api::models::StatusResponse;
use crate::queue::AdmissionError;

/// API error renderable as `{status: "Error", error: "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(StatusResponse::error(self.message))).into_response()
    }
}

/// Map a conversion-queue admission failure onto a response.
pub fn conversion_error(err: AdmissionError) -> ApiError {
    match err {
        AdmissionError::PathAlreadyExist | AdmissionError::FilestemAlreadyExist => {
            ApiError::conflict("file with the specified path or filestem already exists")
        }
        AdmissionError::FileDoesNotExist(_) => ApiError::not_found("file does not exist"),
        AdmissionError::FileTypeNotSupported(ext) => {
            ApiError::bad_request(format!("file type '{ext}' not supported"))
        }
        AdmissionError::InvalidConversionFormat { from, to } => {
            ApiError::bad_request(format!("file type '{from}' is not convertible to '{to}'"))
        }
        AdmissionError::EmptyTargetFormatList(_) => {
            ApiError::bad_request("no target formats for the file")
        }
        AdmissionError::FailedDetermineFileType(_) => {
            ApiError::unprocessable("failed to determine the file type")
        }
        AdmissionError::Internal(e) => {
            error!(error = %e, "failed to add file to conversion queue");
            ApiError::internal("failed to add file to conversion queue")
        }
    }
}

/// Map a deletion-queue admission failure onto a response.
pub fn deletion_error(err: AdmissionError) -> ApiError {
    match err {
        AdmissionError::PathAlreadyExist => {
            ApiError::conflict("file with the specified path already exists in the deletion queue")
        }
        AdmissionError::FileDoesNotExist(_) => ApiError::not_found("file does not exist"),
        AdmissionError::Internal(e) => {
            error!(error = %e, "failed to add file to deletion queue");
            ApiError::internal("failed to add file to deletion queue")
        }
        other => {
            error!(error = %other, "unexpected deletion admission failure");
            ApiError::internal("failed to add file to deletion queue")
        }
    }
}
