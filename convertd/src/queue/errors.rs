//! Typed admission failures, mapped to HTTP statuses at the API boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("file with the specified path already exists")]
    PathAlreadyExist,

    #[error("file with the specified filestem already exists")]
    FilestemAlreadyExist,

    #[error("file '{0}' does not exist")]
    FileDoesNotExist(String),

    #[error("file type '{0}' not supported")]
    FileTypeNotSupported(String),

    #[error("failed to determine the file type of '{0}'")]
    FailedDetermineFileType(String),

    #[error("file type '{from}' is not convertible to {to}")]
    InvalidConversionFormat { from: String, to: String },

    #[error("no target formats for '{0}'")]
    EmptyTargetFormatList(String),

    #[error(transparent)]
    Internal(#[from] crate::Error),
}
