//! Task orchestration: the dual-queue worker loop, the filesystem scanner,
//! and the shutdown latch.
//!
//! Signals are not tasks. Each queue has a single-slot channel carrying
//! "there might be work" pings; redundant pings collapse while the worker is
//! busy, and one ping triggers a drain pass that pops rows until the queue
//! is empty.

mod ticker;

pub use ticker::QueueTicker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::converter::ConverterService;
use crate::database::models::{ConversionInfo, EntryStatus};
use crate::media::{FileInfo, MediaKind, classify};
use crate::queue::{ConversionQueue, DeletionQueue};
use crate::{Error, Result};

/// Error code persisted when deletion artifacts cannot be removed.
pub const ERR_FAILED_TO_REMOVE_FILE: u32 = 100;
/// Error code persisted on a conversion superseded by a queued deletion.
pub const ERR_FILE_QUEUED_FOR_DELETION: u32 = 101;

pub struct TaskService {
    root: PathBuf,
    conversion_queue: Arc<ConversionQueue>,
    deletion_queue: Arc<DeletionQueue>,
    converter: Arc<ConverterService>,
    conv_tx: mpsc::Sender<()>,
    del_tx: mpsc::Sender<()>,
    /// Taken exactly once by the worker loop.
    receivers: Mutex<Option<(mpsc::Receiver<()>, mpsc::Receiver<()>)>>,
    shutdown: CancellationToken,
    scan_in_progress: RwLock<bool>,
}

impl TaskService {
    pub fn new(
        root: PathBuf,
        conversion_queue: Arc<ConversionQueue>,
        deletion_queue: Arc<DeletionQueue>,
        converter: Arc<ConverterService>,
        shutdown: CancellationToken,
    ) -> Self {
        let (conv_tx, conv_rx) = mpsc::channel(1);
        let (del_tx, del_rx) = mpsc::channel(1);
        Self {
            root,
            conversion_queue,
            deletion_queue,
            converter,
            conv_tx,
            del_tx,
            receivers: Mutex::new(Some((conv_rx, del_rx))),
            shutdown,
            scan_in_progress: RwLock::new(false),
        }
    }

    /// Ping the conversion queue. Returns false when the slot is already
    /// occupied or shutdown has been latched.
    pub fn try_queue_conversion(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.conv_tx.try_send(()).is_ok()
    }

    /// Ping the deletion queue. Returns false when the slot is already
    /// occupied or shutdown has been latched.
    pub fn try_queue_deletion(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.del_tx.try_send(()).is_ok()
    }

    /// Latch shutdown. One-shot and idempotent; the worker loop observes the
    /// latch between drain passes, never mid-pipeline.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("task service shutting down");
        }
        self.shutdown.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The single worker loop. Runs until shutdown is latched.
    pub async fn process_queues(&self) {
        let Some((mut conv_rx, mut del_rx)) = self.receivers.lock().take() else {
            warn!("worker loop started twice, second call ignored");
            return;
        };

        info!("task worker started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("task worker stopped");
                    return;
                }
                Some(()) = conv_rx.recv() => self.drain_conversion().await,
                Some(()) = del_rx.recv() => self.drain_deletion().await,
            }
        }
    }

    /// Pop conversion entries until the queue is empty.
    ///
    /// A persistence error aborts the pass, not the worker; the next signal
    /// resumes where the queue stands then.
    async fn drain_conversion(&self) {
        loop {
            let entry = match self.conversion_queue.pop().await {
                Ok(Some(entry)) => entry,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "failed to pop conversion entry");
                    return;
                }
            };

            // A queued deletion for the same path wins over the conversion.
            match self.deletion_queue.get_pending(&entry.fullpath).await {
                Ok(Some(_)) => {
                    debug!(path = %entry.fullpath, "conversion superseded by queued deletion");
                    if let Err(e) = self
                        .conversion_queue
                        .mark_canceled(&entry.fullpath, ERR_FILE_QUEUED_FOR_DELETION)
                        .await
                    {
                        error!(error = %e, "failed to cancel superseded conversion");
                        return;
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "failed to check the deletion queue");
                    return;
                }
            }

            if let Err(err) = self.converter.convert(&entry).await {
                error!(path = %entry.fullpath, error = %err, "failed to convert file");
                if let Err(e) = self
                    .conversion_queue
                    .mark_canceled(&entry.fullpath, err.code())
                    .await
                {
                    error!(error = %e, "failed to cancel conversion entry");
                    return;
                }
                continue;
            }

            if let Err(e) = self.conversion_queue.mark_done(&entry.fullpath).await {
                error!(error = %e, "failed to mark conversion as done");
                return;
            }
            debug!(path = %entry.fullpath, "conversion finished");
        }
    }

    /// Pop deletion entries until the queue is empty.
    async fn drain_deletion(&self) {
        loop {
            let entry = match self.deletion_queue.pop().await {
                Ok(Some(entry)) => entry,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "failed to pop deletion entry");
                    return;
                }
            };

            let conversion = match self.conversion_queue.get(&entry.fullpath).await {
                Ok(Some(conversion)) => conversion,
                Ok(None) => {
                    // Orphan deletion: the conversion record was evicted
                    // externally, so the artifact names cannot be derived.
                    warn!(path = %entry.fullpath, "deletion without a conversion record");
                    if let Err(e) = self
                        .deletion_queue
                        .mark_canceled(&entry.fullpath, ERR_FAILED_TO_REMOVE_FILE)
                        .await
                    {
                        error!(error = %e, "failed to cancel orphan deletion");
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "failed to look up the conversion record");
                    return;
                }
            };

            // Never transcoded: there is nothing on disk to remove.
            if conversion.status == EntryStatus::Pending {
                if let Err(e) = self.deletion_queue.mark_done(&entry.fullpath).await {
                    error!(error = %e, "failed to mark deletion as done");
                    return;
                }
                continue;
            }

            let mut removal_failed = false;
            for target in conversion.targets() {
                let dest = conversion.destination_path(&self.root, target);
                match tokio::fs::remove_file(&dest).await {
                    Ok(()) => debug!(dest = %dest.display(), "artifact removed"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(dest = %dest.display(), error = %e, "failed to remove artifact");
                        removal_failed = true;
                    }
                }
            }

            let marked = if removal_failed {
                self.deletion_queue
                    .mark_canceled(&entry.fullpath, ERR_FAILED_TO_REMOVE_FILE)
                    .await
            } else {
                self.deletion_queue.mark_done(&entry.fullpath).await
            };
            if let Err(e) = marked {
                error!(error = %e, "failed to finalize deletion entry");
                return;
            }
            debug!(path = %entry.fullpath, "deletion finished");
        }
    }

    /// Whether a filesystem scan is currently running.
    pub fn is_scanning(&self) -> bool {
        *self.scan_in_progress.read()
    }

    /// Walk the media root and enqueue every image or video found.
    ///
    /// Mutually exclusive: a second caller fails with
    /// [`Error::ScanAlreadyRunning`] while a walk is in flight. Per-file
    /// problems (unreadable entries, duplicates, unsupported types) are
    /// logged and skipped.
    pub async fn scan_media_root(&self) -> Result<()> {
        {
            let mut in_progress = self.scan_in_progress.write();
            if *in_progress {
                return Err(Error::ScanAlreadyRunning);
            }
            *in_progress = true;
        }
        let _guard = ScanGuard(&self.scan_in_progress);

        let root = self.root.clone();
        let candidates = tokio::task::spawn_blocking(move || collect_media_files(&root))
            .await
            .map_err(|e| Error::Other(format!("scan worker failed: {e}")))?;

        let mut admitted = 0usize;
        for fullpath in candidates {
            let info = ConversionInfo::new(FileInfo::from_path(&fullpath), Vec::new());
            match self.conversion_queue.add(info).await {
                Ok(id) => {
                    admitted += 1;
                    debug!(path = %fullpath, id, "scan admitted file");
                }
                Err(e) => debug!(path = %fullpath, reason = %e, "scan skipped file"),
            }
        }

        info!(admitted, "filesystem scan finished");
        Ok(())
    }
}

/// Clears the scan flag on every exit path, early returns included.
struct ScanGuard<'a>(&'a RwLock<bool>);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        *self.0.write() = false;
    }
}

fn collect_media_files(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "unreadable entry skipped");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match classify(entry.path()) {
            Ok(MediaKind::Image | MediaKind::Video) => {}
            Ok(MediaKind::Other) => continue,
            Err(e) => {
                debug!(path = %entry.path().display(), reason = %e, "unclassifiable file skipped");
                continue;
            }
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        match rel.to_str() {
            Some(rel) => files.push(format!("/{rel}")),
            None => debug!(path = %entry.path().display(), "non-utf8 path skipped"),
        }
    }
    files
}
