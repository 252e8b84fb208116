//! Deletion queue repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{DeletionEntry, DeletionInfo, EntryStatus};
use crate::{Error, Result};

/// Persistence contract the deletion queue service depends on.
#[async_trait]
pub trait DeletionRepository: Send + Sync {
    /// Insert a new pending entry.
    ///
    /// Runs in one transaction: the path must have a conversion record
    /// (any status), otherwise [`Error::NotFound`]; a pending deletion row
    /// for the same path fails with [`Error::PathAlreadyExists`].
    async fn create(&self, info: &DeletionInfo) -> Result<i64>;

    /// Pending entry for a path, if any.
    async fn find_pending_by_fullpath(&self, fullpath: &str) -> Result<Option<DeletionEntry>>;

    /// The pending entry with the smallest `updated_at`, if any.
    async fn find_oldest_pending(&self) -> Result<Option<DeletionEntry>>;

    async fn mark_done(&self, fullpath: &str) -> Result<()>;

    async fn mark_canceled(&self, fullpath: &str, code: u32) -> Result<()>;
}

/// SQLx implementation of [`DeletionRepository`].
pub struct SqlxDeletionRepository {
    pool: SqlitePool,
}

impl SqlxDeletionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeletionRepository for SqlxDeletionRepository {
    async fn create(&self, info: &DeletionInfo) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let conversion: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM conversion_queue WHERE fullpath = ? LIMIT 1")
                .bind(&info.fullpath)
                .fetch_optional(&mut *tx)
                .await?;
        if conversion.is_none() {
            return Err(Error::not_found("conversion entry", &info.fullpath));
        }

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM deletion_queue WHERE fullpath = ? AND status = ?")
                .bind(&info.fullpath)
                .bind(EntryStatus::Pending)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(Error::PathAlreadyExists(info.fullpath.clone()));
        }

        let now = Utc::now();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO deletion_queue (fullpath, status, error_code, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&info.fullpath)
        .bind(EntryStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn find_pending_by_fullpath(&self, fullpath: &str) -> Result<Option<DeletionEntry>> {
        let entry = sqlx::query_as::<_, DeletionEntry>(
            "SELECT * FROM deletion_queue WHERE fullpath = ? AND status = ?",
        )
        .bind(fullpath)
        .bind(EntryStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn find_oldest_pending(&self) -> Result<Option<DeletionEntry>> {
        let entry = sqlx::query_as::<_, DeletionEntry>(
            "SELECT * FROM deletion_queue WHERE status = ? ORDER BY updated_at, id LIMIT 1",
        )
        .bind(EntryStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn mark_done(&self, fullpath: &str) -> Result<()> {
        sqlx::query(
            "UPDATE deletion_queue SET status = ?, updated_at = ? WHERE fullpath = ? AND status = ?",
        )
        .bind(EntryStatus::Done)
        .bind(Utc::now())
        .bind(fullpath)
        .bind(EntryStatus::Pending)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_canceled(&self, fullpath: &str, code: u32) -> Result<()> {
        sqlx::query(
            "UPDATE deletion_queue SET status = ?, error_code = ?, updated_at = ? WHERE fullpath = ? AND status = ?",
        )
        .bind(EntryStatus::Canceled)
        .bind(code as i64)
        .bind(Utc::now())
        .bind(fullpath)
        .bind(EntryStatus::Pending)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
