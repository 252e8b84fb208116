//! Conversion queue service.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::database::models::{ConversionEntry, ConversionInfo};
use crate::database::repositories::ConversionRepository;
use crate::media::{FormatCatalog, MediaKind, catalog, classify};
use crate::queue::AdmissionError;
use crate::{Error, Result};

/// Admission and lifecycle management for the conversion queue.
pub struct ConversionQueue {
    root: PathBuf,
    formats: Arc<FormatCatalog>,
    repository: Arc<dyn ConversionRepository>,
}

impl ConversionQueue {
    pub fn new(
        root: PathBuf,
        formats: Arc<FormatCatalog>,
        repository: Arc<dyn ConversionRepository>,
    ) -> Self {
        Self {
            root,
            formats,
            repository,
        }
    }

    /// Validate and enqueue one source file.
    ///
    /// When the request names no targets, the source is classified and the
    /// per-media-class default target list is substituted.
    pub async fn add(&self, mut info: ConversionInfo) -> std::result::Result<i64, AdmissionError> {
        let src = self.root.join(info.fullpath.trim_start_matches('/'));
        if !src.is_file() {
            return Err(AdmissionError::FileDoesNotExist(info.fullpath));
        }

        if !catalog::is_supported(&info.ext) {
            return Err(AdmissionError::FileTypeNotSupported(info.ext));
        }

        if info.convert_to.is_empty() {
            let kind = classify(&src).map_err(|e| {
                debug!(path = %info.fullpath, error = %e, "classification failed during admission");
                AdmissionError::FailedDetermineFileType(info.fullpath.clone())
            })?;
            if kind == MediaKind::Other {
                return Err(AdmissionError::FailedDetermineFileType(info.fullpath));
            }
            info.convert_to = self.formats.defaults_for(kind).to_vec();
            if info.convert_to.is_empty() {
                return Err(AdmissionError::EmptyTargetFormatList(info.fullpath));
            }
        } else {
            for target in &info.convert_to {
                if !catalog::is_convertible(&info.ext, &target.ext) {
                    return Err(AdmissionError::InvalidConversionFormat {
                        from: info.ext.clone(),
                        to: target.ext.clone(),
                    });
                }
            }
        }

        match self.repository.create(&info).await {
            Ok(id) => Ok(id),
            Err(Error::FilestemAlreadyExists(_)) => Err(AdmissionError::FilestemAlreadyExist),
            Err(Error::PathAlreadyExists(_)) => Err(AdmissionError::PathAlreadyExist),
            Err(e) => Err(AdmissionError::Internal(e)),
        }
    }

    /// Oldest pending entry; `None` when the queue is drained.
    pub async fn pop(&self) -> Result<Option<ConversionEntry>> {
        self.repository.find_oldest_pending().await
    }

    /// Latest entry for a path, any status.
    pub async fn get(&self, fullpath: &str) -> Result<Option<ConversionEntry>> {
        self.repository.find_by_fullpath(fullpath).await
    }

    pub async fn mark_done(&self, fullpath: &str) -> Result<()> {
        self.repository.mark_done(fullpath).await
    }

    pub async fn mark_canceled(&self, fullpath: &str, code: u32) -> Result<()> {
        self.repository.mark_canceled(fullpath, code).await
    }
}
