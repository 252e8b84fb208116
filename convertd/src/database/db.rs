use sqlx::migrate::MigrateError;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Connection pool size.
const DEFAULT_POOL_SIZE: u32 = 10;

/// How long a writer waits on a locked database before giving up.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to connect to the database: {0}")]
    ConnectionFailed(#[from] sqlx::Error),
    #[error("Failed to run migrations: {0}")]
    MigrationFailed(#[from] MigrateError),
}

/// Creates a connection pool for the queue database and applies migrations.
///
/// WAL mode keeps admission reads from blocking the worker's status writes.
pub async fn create_pool(dsn: &str) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(dsn)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(DEFAULT_POOL_SIZE)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
