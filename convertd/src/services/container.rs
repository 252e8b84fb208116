//! Service container: the explicit construction root.
//!
//! Wires pool → repositories → queues → backends → converter → orchestrator
//! and registers teardowns with the deferred-shutdown queue as components
//! come up. Teardown order is the reverse of registration: the HTTP server
//! closes first (stops admitting work), then the ticker, then the worker
//! drains, then the pool closes.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::converter::{ConverterService, FfmpegBackend};
use crate::database::repositories::{SqlxConversionRepository, SqlxDeletionRepository};
use crate::media::FormatCatalog;
use crate::queue::{ConversionQueue, DeletionQueue};
use crate::shutdown::DeferredShutdown;
use crate::task::{QueueTicker, TaskService};
use crate::{Error, Result};

/// Holds every application service and manages its lifecycle.
pub struct ServiceContainer {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub conversion_queue: Arc<ConversionQueue>,
    pub deletion_queue: Arc<DeletionQueue>,
    pub tasks: Arc<TaskService>,
    deferred: Arc<DeferredShutdown>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build the object graph. `root` is the media root every stored path
    /// is an offset from.
    pub fn new(config: AppConfig, pool: SqlitePool, root: PathBuf) -> Self {
        info!(root = %root.display(), "initializing services");

        let cancellation_token = CancellationToken::new();
        let deferred = Arc::new(DeferredShutdown::new());

        // Registered first, so the pool closes last.
        let teardown_pool = pool.clone();
        deferred.add("database pool", async move {
            teardown_pool.close().await;
            Ok(())
        });

        let formats = Arc::new(FormatCatalog::new(
            config.defaults.image.formats.clone(),
            config.defaults.video.formats.clone(),
        ));

        let conversion_repository = Arc::new(SqlxConversionRepository::new(pool.clone()));
        let deletion_repository = Arc::new(SqlxDeletionRepository::new(pool.clone()));

        let conversion_queue = Arc::new(ConversionQueue::new(
            root.clone(),
            formats.clone(),
            conversion_repository,
        ));
        let deletion_queue = Arc::new(DeletionQueue::new(deletion_repository));

        let image_backend = Arc::new(FfmpegBackend::new(config.image.threads));
        let video_backend = Arc::new(FfmpegBackend::new(config.video.threads));
        let converter = Arc::new(ConverterService::new(
            root.clone(),
            &formats,
            image_backend,
            video_backend,
        ));

        let tasks = Arc::new(TaskService::new(
            root,
            conversion_queue.clone(),
            deletion_queue.clone(),
            converter,
            cancellation_token.clone(),
        ));

        Self {
            config,
            pool,
            conversion_queue,
            deletion_queue,
            tasks,
            deferred,
            cancellation_token,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Spawn the worker loop, the ticker, and the HTTP server.
    pub async fn start(&self) -> Result<()> {
        let worker = tokio::spawn({
            let tasks = self.tasks.clone();
            async move { tasks.process_queues().await }
        });
        self.deferred.add("task worker", async move {
            worker
                .await
                .map_err(|e| Error::Other(format!("task worker failed: {e}")))
        });

        let ticker_handle = tokio::spawn({
            let ticker = QueueTicker::new(self.tasks.clone(), self.config.task.check_interval());
            let token = self.cancellation_token.clone();
            async move { ticker.run(token).await }
        });
        self.deferred.add("queue ticker", async move {
            ticker_handle
                .await
                .map_err(|e| Error::Other(format!("queue ticker failed: {e}")))
        });

        let state = AppState {
            conversion_queue: self.conversion_queue.clone(),
            deletion_queue: self.deletion_queue.clone(),
            tasks: self.tasks.clone(),
        };
        let listener = api::server::bind(&self.config.http_server).await?;
        let server = tokio::spawn(api::serve(
            listener,
            self.config.http_server.clone(),
            state,
            self.cancellation_token.clone(),
        ));
        self.deferred.add("http server", async move {
            match server.await {
                Ok(result) => result,
                Err(e) => Err(Error::Other(format!("http server failed: {e}"))),
            }
        });

        Ok(())
    }

    /// Graceful shutdown: latch the token, then run every registered
    /// teardown. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.tasks.shutdown();
        self.deferred.release();
        self.deferred.wait().await;
        if !self.pool.is_closed() {
            error!("database pool still open after shutdown");
        }
    }
}
