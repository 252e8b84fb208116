//! Conversion queue repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::database::models::{ConversionEntry, ConversionInfo, EntryStatus};
use crate::{Error, Result};

/// Persistence contract the conversion queue service depends on.
#[async_trait]
pub trait ConversionRepository: Send + Sync {
    /// Insert a new pending entry.
    ///
    /// Runs in one transaction: a pending row with the same `filestem`
    /// fails with [`Error::FilestemAlreadyExists`], a pending row with the
    /// same `fullpath` with [`Error::PathAlreadyExists`]; otherwise the row
    /// is inserted and its id returned.
    async fn create(&self, info: &ConversionInfo) -> Result<i64>;

    /// Latest entry for a path, any status.
    async fn find_by_fullpath(&self, fullpath: &str) -> Result<Option<ConversionEntry>>;

    /// The pending entry with the smallest `updated_at`, if any.
    async fn find_oldest_pending(&self) -> Result<Option<ConversionEntry>>;

    async fn mark_done(&self, fullpath: &str) -> Result<()>;

    async fn mark_canceled(&self, fullpath: &str, code: u32) -> Result<()>;
}

/// SQLx implementation of [`ConversionRepository`].
pub struct SqlxConversionRepository {
    pool: SqlitePool,
}

impl SqlxConversionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversionRepository for SqlxConversionRepository {
    async fn create(&self, info: &ConversionInfo) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let by_filestem: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM conversion_queue WHERE filestem = ? AND status = ?")
                .bind(&info.filestem)
                .bind(EntryStatus::Pending)
                .fetch_optional(&mut *tx)
                .await?;
        if by_filestem.is_some() {
            return Err(Error::FilestemAlreadyExists(info.filestem.clone()));
        }

        let by_fullpath: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM conversion_queue WHERE fullpath = ? AND status = ?")
                .bind(&info.fullpath)
                .bind(EntryStatus::Pending)
                .fetch_optional(&mut *tx)
                .await?;
        if by_fullpath.is_some() {
            return Err(Error::PathAlreadyExists(info.fullpath.clone()));
        }

        let now = Utc::now();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO conversion_queue
                (fullpath, path, filestem, ext, convert_to, status, error_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&info.fullpath)
        .bind(&info.path)
        .bind(&info.filestem)
        .bind(&info.ext)
        .bind(Json(&info.convert_to))
        .bind(EntryStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn find_by_fullpath(&self, fullpath: &str) -> Result<Option<ConversionEntry>> {
        let entry = sqlx::query_as::<_, ConversionEntry>(
            "SELECT * FROM conversion_queue WHERE fullpath = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(fullpath)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn find_oldest_pending(&self) -> Result<Option<ConversionEntry>> {
        let entry = sqlx::query_as::<_, ConversionEntry>(
            "SELECT * FROM conversion_queue WHERE status = ? ORDER BY updated_at, id LIMIT 1",
        )
        .bind(EntryStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn mark_done(&self, fullpath: &str) -> Result<()> {
        sqlx::query(
            "UPDATE conversion_queue SET status = ?, updated_at = ? WHERE fullpath = ? AND status = ?",
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
            "UPDATE conversion_queue SET status = ?, error_code = ?, updated_at = ? WHERE fullpath = ? AND status = ?",
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
