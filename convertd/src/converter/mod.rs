//! Conversion pipeline: resolve the source, classify it, and produce every
//! requested target through a sibling temporary file.

mod backend;
mod ffmpeg;

pub use backend::{BackendError, ConvConf, MediaBackend, merge_configs};
pub use ffmpeg::FfmpegBackend;

#[cfg(test)]
pub use backend::MockMediaBackend;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::database::models::ConversionEntry;
use crate::media::{FormatCatalog, MediaKind, classify};

/// Pipeline failure; the numeric code is persisted on the canceled entry.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("file '{0}' does not exist")]
    FileDoesNotExist(String),

    #[error("unable to convert file: {0}")]
    UnableToConvertFile(String),

    #[error("invalid conversion format: {0}")]
    InvalidConversionFormat(String),

    #[error("the file is not an image or video: {0}")]
    WrongSourceFile(String),
}

impl ConvertError {
    pub fn code(&self) -> u32 {
        match self {
            Self::FileDoesNotExist(_) => 1,
            Self::UnableToConvertFile(_) => 2,
            Self::InvalidConversionFormat(_) => 3,
            Self::WrongSourceFile(_) => 4,
        }
    }
}

/// Executes one conversion entry end to end.
pub struct ConverterService {
    root: PathBuf,
    image_backend: Arc<dyn MediaBackend>,
    video_backend: Arc<dyn MediaBackend>,
    /// Per-target-format default codec parameters, indexed once here so the
    /// hot path merges maps instead of scanning the catalog lists.
    image_defaults: BTreeMap<String, ConvConf>,
    video_defaults: BTreeMap<String, ConvConf>,
}

impl ConverterService {
    pub fn new(
        root: PathBuf,
        formats: &FormatCatalog,
        image_backend: Arc<dyn MediaBackend>,
        video_backend: Arc<dyn MediaBackend>,
    ) -> Self {
        let index = |targets: &[crate::database::models::TargetFormat]| {
            targets
                .iter()
                .map(|t| (t.ext.clone(), t.conv_conf.clone()))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            root,
            image_backend,
            video_backend,
            image_defaults: index(formats.image_defaults()),
            video_defaults: index(formats.video_defaults()),
        }
    }

    /// Convert every target of the entry, in order.
    ///
    /// A failure on any target aborts the entry; outputs already renamed
    /// into place are left as they are.
    pub async fn convert(&self, entry: &ConversionEntry) -> Result<(), ConvertError> {
        let src = entry.source_path(&self.root);
        debug!(src = %src.display(), "convert");

        if !src.is_file() {
            return Err(ConvertError::FileDoesNotExist(entry.fullpath.clone()));
        }

        let kind = classify(&src)
            .map_err(|e| ConvertError::InvalidConversionFormat(e.to_string()))?;
        let (backend, defaults) = match kind {
            MediaKind::Image => (&self.image_backend, &self.image_defaults),
            MediaKind::Video => (&self.video_backend, &self.video_defaults),
            MediaKind::Other => {
                return Err(ConvertError::WrongSourceFile(entry.fullpath.clone()));
            }
        };

        for target in entry.targets() {
            let dest = entry.destination_path(&self.root, target);
            let tmp = tmp_sibling(&dest);
            let merged = merge_configs([defaults.get(&target.ext), Some(&target.conv_conf)]);

            if let Err(e) = backend.convert(&src, &tmp, &merged).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(ConvertError::UnableToConvertFile(e.to_string()));
            }

            if let Err(e) = replace(&tmp, &dest).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(ConvertError::UnableToConvertFile(format!(
                    "failed to move '{}' into place: {}",
                    dest.display(),
                    e
                )));
            }
        }

        Ok(())
    }
}

/// Sibling temporary name: same directory, so the final rename is a rename.
fn tmp_sibling(dest: &Path) -> PathBuf {
    let mut raw = dest.as_os_str().to_os_string();
    raw.push(".tmp");
    PathBuf::from(raw)
}

/// Replace `dest` with `tmp`. A missing `dest` is the common case, not an
/// error.
async fn replace(tmp: &Path, dest: &Path) -> std::io::Result<()> {
    match fs::remove_file(dest).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(tmp, dest).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{EntryStatus, TargetFormat};
    use crate::media::FileInfo;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::types::Json;
    use std::fs::File;
    use std::io::Write;

    fn jpeg_fixture(root: &Path, rel: &str) {
        let path = root.join(rel.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = File::create(path).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
    }

    fn entry(fullpath: &str, targets: Vec<TargetFormat>) -> ConversionEntry {
        let info = FileInfo::from_path(fullpath);
        ConversionEntry {
            id: 1,
            fullpath: info.fullpath,
            path: info.path,
            filestem: info.filestem,
            ext: info.ext,
            convert_to: Json(targets),
            status: EntryStatus::Pending,
            error_code: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn writing_backend() -> MockMediaBackend {
        let mut backend = MockMediaBackend::new();
        backend.expect_convert().returning(|_, dest, _| {
            std::fs::write(dest, b"converted").unwrap();
            Ok(())
        });
        backend
    }

    fn service(
        root: &Path,
        image_backend: MockMediaBackend,
        video_backend: MockMediaBackend,
    ) -> ConverterService {
        let formats = FormatCatalog::new(
            vec![TargetFormat::new("webp")],
            vec![TargetFormat::new("webm")],
        );
        ConverterService::new(
            root.to_path_buf(),
            &formats,
            Arc::new(image_backend),
            Arc::new(video_backend),
        )
    }

    #[tokio::test]
    async fn image_entry_lands_under_the_default_name() {
        let dir = tempfile::tempdir().unwrap();
        jpeg_fixture(dir.path(), "/files/a.jpg");

        let mut video = MockMediaBackend::new();
        video.expect_convert().never();
        let svc = service(dir.path(), writing_backend(), video);

        let e = entry("/files/a.jpg", vec![TargetFormat::new("webp")]);
        svc.convert(&e).await.unwrap();

        let dest = dir.path().join("files/a.jpg.webp");
        assert_eq!(std::fs::read(&dest).unwrap(), b"converted");
        assert!(!tmp_sibling(&dest).exists());
    }

    #[tokio::test]
    async fn missing_source_fails_with_code_1() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), MockMediaBackend::new(), MockMediaBackend::new());

        let e = entry("/files/gone.jpg", vec![TargetFormat::new("webp")]);
        let err = svc.convert(&e).await.unwrap_err();
        assert!(matches!(err, ConvertError::FileDoesNotExist(_)));
        assert_eq!(err.code(), 1);
    }

    #[tokio::test]
    async fn non_media_source_fails_with_code_4() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files/blob.jpg");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![0u8; 512]).unwrap();

        let svc = service(dir.path(), MockMediaBackend::new(), MockMediaBackend::new());
        let e = entry("/files/blob.jpg", vec![TargetFormat::new("webp")]);
        let err = svc.convert(&e).await.unwrap_err();
        assert!(matches!(err, ConvertError::WrongSourceFile(_)));
        assert_eq!(err.code(), 4);
    }

    #[tokio::test]
    async fn backend_failure_cleans_the_temporary_and_keeps_earlier_outputs() {
        let dir = tempfile::tempdir().unwrap();
        jpeg_fixture(dir.path(), "/files/a.jpg");

        let mut image = MockMediaBackend::new();
        let mut call = 0;
        image.expect_convert().returning(move |_, dest, _| {
            call += 1;
            if call == 1 {
                std::fs::write(dest, b"first").unwrap();
                Ok(())
            } else {
                Err(BackendError::new("encoder blew up"))
            }
        });
        let svc = service(dir.path(), image, MockMediaBackend::new());

        let e = entry(
            "/files/a.jpg",
            vec![TargetFormat::new("webp"), TargetFormat::new("avif")],
        );
        let err = svc.convert(&e).await.unwrap_err();
        assert_eq!(err.code(), 2);

        // First target survived, second left nothing behind.
        assert!(dir.path().join("files/a.jpg.webp").exists());
        assert!(!dir.path().join("files/a.jpg.avif").exists());
        assert!(!dir.path().join("files/a.jpg.avif.tmp").exists());
    }

    #[tokio::test]
    async fn existing_destination_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        jpeg_fixture(dir.path(), "/files/a.jpg");
        let dest = dir.path().join("files/a.jpg.webp");
        std::fs::write(&dest, b"stale").unwrap();

        let svc = service(dir.path(), writing_backend(), MockMediaBackend::new());
        let e = entry("/files/a.jpg", vec![TargetFormat::new("webp")]);
        svc.convert(&e).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"converted");
    }

    #[tokio::test]
    async fn defaults_are_overlaid_by_the_target_conf() {
        let dir = tempfile::tempdir().unwrap();
        jpeg_fixture(dir.path(), "/files/a.jpg");

        let mut default_target = TargetFormat::new("webp");
        default_target.conv_conf.insert("quality".into(), json!(75));
        default_target.conv_conf.insert("preset".into(), json!("picture"));
        let formats = FormatCatalog::new(vec![default_target], vec![]);

        let mut image = MockMediaBackend::new();
        image
            .expect_convert()
            .withf(|_, _, config: &ConvConf| {
                config.get("quality") == Some(&json!(90))
                    && config.get("preset") == Some(&json!("picture"))
            })
            .returning(|_, dest, _| {
                std::fs::write(dest, b"converted").unwrap();
                Ok(())
            });

        let svc = ConverterService::new(
            dir.path().to_path_buf(),
            &formats,
            Arc::new(image),
            Arc::new(MockMediaBackend::new()),
        );

        let mut target = TargetFormat::new("webp");
        target.conv_conf.insert("quality".into(), json!(90));
        let e = entry("/files/a.jpg", vec![target]);
        svc.convert(&e).await.unwrap();
    }
}
