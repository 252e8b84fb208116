//! Integration tests for the task orchestrator: the dual-queue worker loop,
//! the cross-queue interlock, the scanner, and the shutdown latch. Codec
//! backends are stubbed; everything else is real.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use convertd::converter::{BackendError, ConvConf, ConverterService, MediaBackend};
use convertd::database::create_pool;
use convertd::database::models::{
    ConversionEntry, ConversionInfo, DeletionEntry, DeletionInfo, EntryStatus, TargetFormat,
};
use convertd::database::repositories::{SqlxConversionRepository, SqlxDeletionRepository};
use convertd::media::{FileInfo, FormatCatalog};
use convertd::queue::{ConversionQueue, DeletionQueue};
use convertd::task::{ERR_FAILED_TO_REMOVE_FILE, ERR_FILE_QUEUED_FOR_DELETION, TaskService};
use convertd::{Error, Result};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Records calls and writes the destination file, or fails on demand.
struct StubBackend {
    calls: Mutex<Vec<(PathBuf, PathBuf, ConvConf)>>,
    fail: bool,
}

impl StubBackend {
    fn new(fail: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail,
        }
    }

    fn calls(&self) -> Vec<(PathBuf, PathBuf, ConvConf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaBackend for StubBackend {
    async fn convert(
        &self,
        src: &Path,
        dest: &Path,
        config: &ConvConf,
    ) -> std::result::Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dest.to_path_buf(), config.clone()));
        if self.fail {
            return Err(BackendError::new("stub encoder failure"));
        }
        std::fs::write(dest, b"artifact").map_err(|e| BackendError::new(e.to_string()))
    }
}

struct Harness {
    dir: tempfile::TempDir,
    pool: SqlitePool,
    conversions: Arc<ConversionQueue>,
    deletions: Arc<DeletionQueue>,
    tasks: Arc<TaskService>,
    image_backend: Arc<StubBackend>,
}

async fn setup() -> Harness {
    setup_with_failing_backend(false).await
}

async fn setup_with_failing_backend(fail: bool) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();
    // The worker runs concurrently with the test body, so every pooled
    // connection must see the same database; a file-backed one guarantees
    // that where `sqlite::memory:` would not.
    let dsn = format!("sqlite://{}", dir.path().join("queue.db").display());
    let pool = create_pool(&dsn).await.expect("test pool");

    let catalog = Arc::new(FormatCatalog::new(
        vec![TargetFormat::new("webp")],
        vec![TargetFormat::new("webm")],
    ));
    let conversions = Arc::new(ConversionQueue::new(
        root.clone(),
        catalog.clone(),
        Arc::new(SqlxConversionRepository::new(pool.clone())),
    ));
    let deletions = Arc::new(DeletionQueue::new(Arc::new(SqlxDeletionRepository::new(
        pool.clone(),
    ))));

    let image_backend = Arc::new(StubBackend::new(fail));
    let video_backend = Arc::new(StubBackend::new(fail));
    let converter = Arc::new(ConverterService::new(
        root.clone(),
        &catalog,
        image_backend.clone(),
        video_backend,
    ));

    let tasks = Arc::new(TaskService::new(
        root,
        conversions.clone(),
        deletions.clone(),
        converter,
        CancellationToken::new(),
    ));

    Harness {
        dir,
        pool,
        conversions,
        deletions,
        tasks,
        image_backend,
    }
}

impl Harness {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn jpeg(&self, fullpath: &str) {
        self.fixture(fullpath, &[0xFF, 0xD8, 0xFF, 0xE0]);
    }

    fn mp4(&self, fullpath: &str) {
        let mut bytes = vec![
            0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00,
            0x02, 0x00, b'i', b's', b'o', b'm', b'i', b's', b'o', b'2',
        ];
        bytes.resize(300, 0);
        self.fixture(fullpath, &bytes);
    }

    fn fixture(&self, fullpath: &str, bytes: &[u8]) {
        let path = self.root().join(fullpath.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    async fn admit_conversion(&self, fullpath: &str, targets: Vec<TargetFormat>) -> i64 {
        self.conversions
            .add(ConversionInfo::new(FileInfo::from_path(fullpath), targets))
            .await
            .expect("conversion admission")
    }

    async fn admit_deletion(&self, fullpath: &str) -> i64 {
        self.deletions
            .add(DeletionInfo::new(fullpath))
            .await
            .expect("deletion admission")
    }

    fn spawn_worker(&self) -> JoinHandle<()> {
        let tasks = self.tasks.clone();
        tokio::spawn(async move { tasks.process_queues().await })
    }

    async fn wait_conversion(&self, fullpath: &str, status: EntryStatus) -> ConversionEntry {
        for _ in 0..500 {
            if let Some(entry) = self.conversions.get(fullpath).await.unwrap()
                && entry.status == status
            {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("conversion entry '{fullpath}' never reached {status:?}");
    }

    async fn wait_deletion(&self, fullpath: &str, status: EntryStatus) -> DeletionEntry {
        for _ in 0..500 {
            let entry: Option<DeletionEntry> =
                sqlx::query_as("SELECT * FROM deletion_queue WHERE fullpath = ? ORDER BY id DESC")
                    .bind(fullpath)
                    .fetch_optional(&self.pool)
                    .await
                    .unwrap();
            if let Some(entry) = entry
                && entry.status == status
            {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("deletion entry '{fullpath}' never reached {status:?}");
    }
}

#[tokio::test]
async fn happy_image_conversion_produces_the_default_artifact() {
    let h = setup().await;
    h.jpeg("/files/a.jpg");
    let id = h.admit_conversion("/files/a.jpg", Vec::new()).await;
    assert_eq!(id, 1);

    let worker = h.spawn_worker();
    assert!(h.tasks.try_queue_conversion());

    h.wait_conversion("/files/a.jpg", EntryStatus::Done).await;

    // Default image target, source extension interposed.
    let dest = h.root().join("files/a.jpg.webp");
    assert_eq!(std::fs::read(&dest).unwrap(), b"artifact");
    assert!(!h.root().join("files/a.jpg.webp.tmp").exists());

    // The backend saw the source and the sibling temporary, once.
    let calls = h.image_backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, h.root().join("files/a.jpg"));
    assert_eq!(calls[0].1, h.root().join("files/a.jpg.webp.tmp"));

    h.tasks.shutdown();
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("worker should stop after shutdown")
        .unwrap();
}

#[tokio::test]
async fn failing_backend_cancels_the_entry_with_the_converter_code() {
    let h = setup_with_failing_backend(true).await;
    h.jpeg("/files/a.jpg");
    h.admit_conversion("/files/a.jpg", Vec::new()).await;

    let worker = h.spawn_worker();
    h.tasks.try_queue_conversion();

    let entry = h
        .wait_conversion("/files/a.jpg", EntryStatus::Canceled)
        .await;
    assert_eq!(entry.error_code, 2); // UnableToConvertFile
    assert!(!h.root().join("files/a.jpg.webp").exists());
    assert!(!h.root().join("files/a.jpg.webp.tmp").exists());

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn source_removed_before_the_worker_cancels_with_code_1() {
    let h = setup().await;
    h.jpeg("/files/a.jpg");
    h.admit_conversion("/files/a.jpg", Vec::new()).await;
    std::fs::remove_file(h.root().join("files/a.jpg")).unwrap();

    let worker = h.spawn_worker();
    h.tasks.try_queue_conversion();

    let entry = h
        .wait_conversion("/files/a.jpg", EntryStatus::Canceled)
        .await;
    assert_eq!(entry.error_code, 1); // FileDoesNotExist

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn queued_deletion_interlocks_the_conversion() {
    let h = setup().await;
    h.mp4("/files/b.mp4");
    h.admit_conversion("/files/b.mp4", Vec::new()).await;
    h.admit_deletion("/files/b.mp4").await;

    let worker = h.spawn_worker();
    h.tasks.try_queue_conversion();

    let entry = h
        .wait_conversion("/files/b.mp4", EntryStatus::Canceled)
        .await;
    assert_eq!(entry.error_code, ERR_FILE_QUEUED_FOR_DELETION as i64);

    // The deletion stays queued; only the conversion was resolved.
    assert!(
        h.deletions
            .get_pending("/files/b.mp4")
            .await
            .unwrap()
            .is_some()
    );
    // No backend ran.
    assert!(h.image_backend.calls().is_empty());

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn deletion_of_a_done_entry_removes_every_artifact() {
    let h = setup().await;
    h.jpeg("/files/c.jpg");

    let mut webp = TargetFormat::new("webp");
    webp.optional
        .insert("replace_orig_ext".into(), serde_json::json!(true));
    let avif = TargetFormat::new("avif");
    h.admit_conversion("/files/c.jpg", vec![webp, avif]).await;

    let worker = h.spawn_worker();
    h.tasks.try_queue_conversion();
    h.wait_conversion("/files/c.jpg", EntryStatus::Done).await;

    let webp_dest = h.root().join("files/c.webp");
    let avif_dest = h.root().join("files/c.jpg.avif");
    assert!(webp_dest.exists());
    assert!(avif_dest.exists());

    // One artifact already vanished; its removal must be tolerated.
    std::fs::remove_file(&webp_dest).unwrap();

    h.admit_deletion("/files/c.jpg").await;
    h.tasks.try_queue_deletion();

    h.wait_deletion("/files/c.jpg", EntryStatus::Done).await;
    assert!(!avif_dest.exists());
    // The source itself is not an artifact and stays.
    assert!(h.root().join("files/c.jpg").exists());

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn deletion_of_a_pending_entry_completes_without_filesystem_io() {
    let h = setup().await;
    h.jpeg("/files/d.jpg");
    h.admit_conversion("/files/d.jpg", Vec::new()).await;
    h.admit_deletion("/files/d.jpg").await;

    let worker = h.spawn_worker();
    h.tasks.try_queue_deletion();

    h.wait_deletion("/files/d.jpg", EntryStatus::Done).await;
    // Nothing was transcoded, nothing was removed.
    assert!(h.root().join("files/d.jpg").exists());
    assert!(h.image_backend.calls().is_empty());

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn orphan_deletion_is_canceled_with_the_removal_code() {
    let h = setup().await;
    h.jpeg("/files/e.jpg");
    h.admit_conversion("/files/e.jpg", Vec::new()).await;
    h.admit_deletion("/files/e.jpg").await;

    // Evict the conversion record behind the queue's back.
    sqlx::query("DELETE FROM conversion_queue WHERE fullpath = ?")
        .bind("/files/e.jpg")
        .execute(&h.pool)
        .await
        .unwrap();

    let worker = h.spawn_worker();
    h.tasks.try_queue_deletion();

    let entry = h
        .wait_deletion("/files/e.jpg", EntryStatus::Canceled)
        .await;
    assert_eq!(entry.error_code, ERR_FAILED_TO_REMOVE_FILE as i64);

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn redundant_signals_coalesce_into_one_slot() {
    let h = setup().await;

    // No worker is draining, so the single slot fills once.
    assert!(h.tasks.try_queue_conversion());
    assert!(!h.tasks.try_queue_conversion());
    assert!(!h.tasks.try_queue_conversion());

    // Once the worker consumed the ping, the slot opens again.
    let worker = h.spawn_worker();
    let mut reopened = false;
    for _ in 0..500 {
        if h.tasks.try_queue_conversion() {
            reopened = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(reopened);

    h.tasks.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn shutdown_is_idempotent_and_stops_an_idle_worker_promptly() {
    let h = setup().await;
    let worker = h.spawn_worker();

    h.tasks.shutdown();
    h.tasks.shutdown();

    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("idle worker should observe the latch immediately")
        .unwrap();

    // Signals after the latch are refused.
    assert!(!h.tasks.try_queue_conversion());
    assert!(!h.tasks.try_queue_deletion());
}

#[tokio::test]
async fn scan_ingests_media_files_and_skips_the_rest() {
    let h = setup().await;
    h.jpeg("/files/a.jpg");
    h.mp4("/files/nested/clip.mp4");
    h.fixture("/files/notes.txt", &[0u8; 300]);
    h.fixture("/files/tiny.bin", b"xx");

    h.tasks.scan_media_root().await.expect("scan");
    assert!(!h.tasks.is_scanning());

    let a = h.conversions.get("/files/a.jpg").await.unwrap();
    assert!(a.is_some());
    let clip = h.conversions.get("/files/nested/clip.mp4").await.unwrap();
    assert!(clip.is_some());
    assert!(
        h.conversions
            .get("/files/notes.txt")
            .await
            .unwrap()
            .is_none()
    );
    assert!(h.conversions.get("/files/tiny.bin").await.unwrap().is_none());

    // A rescan skips the still-pending duplicates without failing.
    h.tasks.scan_media_root().await.expect("rescan");
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversion_queue")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn concurrent_scans_are_mutually_exclusive() {
    let h = setup().await;
    h.jpeg("/files/a.jpg");

    // The first future claims the flag on its first poll and parks on the
    // walk; the second observes the flag.
    let first = h.tasks.scan_media_root();
    let second = h.tasks.scan_media_root();
    let (first, second): (Result<()>, Result<()>) = tokio::join!(first, second);

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(Error::ScanAlreadyRunning)))
    );
    assert!(!h.tasks.is_scanning());
}
