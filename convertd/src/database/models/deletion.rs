//! Deletion queue models.

use chrono::{DateTime, Utc};

use super::EntryStatus;

/// Admission input for the deletion queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionInfo {
    pub fullpath: String,
}

impl DeletionInfo {
    pub fn new(fullpath: impl Into<String>) -> Self {
        Self {
            fullpath: fullpath.into(),
        }
    }
}

/// One persisted deletion queue row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeletionEntry {
    pub id: i64,
    pub fullpath: String,
    pub status: EntryStatus,
    pub error_code: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
