//! Deletion queue service.

use std::sync::Arc;

use crate::database::models::{DeletionEntry, DeletionInfo};
use crate::database::repositories::DeletionRepository;
use crate::queue::AdmissionError;
use crate::{Error, Result};

/// Admission and lifecycle management for the deletion queue.
///
/// A deletion may only be admitted for a path that already has a conversion
/// record; the artifacts to remove are derived from that record later, at
/// worker time.
pub struct DeletionQueue {
    repository: Arc<dyn DeletionRepository>,
}

impl DeletionQueue {
    pub fn new(repository: Arc<dyn DeletionRepository>) -> Self {
        Self { repository }
    }

    pub async fn add(&self, info: DeletionInfo) -> std::result::Result<i64, AdmissionError> {
        match self.repository.create(&info).await {
            Ok(id) => Ok(id),
            Err(Error::NotFound { .. }) => Err(AdmissionError::FileDoesNotExist(info.fullpath)),
            Err(Error::PathAlreadyExists(_)) => Err(AdmissionError::PathAlreadyExist),
            Err(e) => Err(AdmissionError::Internal(e)),
        }
    }

    /// Oldest pending entry; `None` when the queue is drained.
    pub async fn pop(&self) -> Result<Option<DeletionEntry>> {
        self.repository.find_oldest_pending().await
    }

    /// Pending entry for a path, if any.
    pub async fn get_pending(&self, fullpath: &str) -> Result<Option<DeletionEntry>> {
        self.repository.find_pending_by_fullpath(fullpath).await
    }

    pub async fn mark_done(&self, fullpath: &str) -> Result<()> {
        self.repository.mark_done(fullpath).await
    }

    pub async fn mark_canceled(&self, fullpath: &str, code: u32) -> Result<()> {
        self.repository.mark_canceled(fullpath, code).await
    }
}
