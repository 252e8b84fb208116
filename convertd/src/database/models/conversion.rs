//! Conversion queue models.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

use super::EntryStatus;
use crate::media::FileInfo;

/// One requested output format with its codec parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetFormat {
    /// Target extension, e.g. "webp".
    pub ext: String,
    /// Codec parameters overlaid onto the per-format defaults,
    /// e.g. `{c:v: libvpx-vp9, crf: 40}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conv_conf: BTreeMap<String, Value>,
    /// Free-form options; `replace_orig_ext` and `suffix` are recognized.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional: BTreeMap<String, Value>,
}

impl TargetFormat {
    pub fn new(ext: impl Into<String>) -> Self {
        Self {
            ext: ext.into(),
            ..Self::default()
        }
    }

    /// Whether the source extension is dropped from the output name.
    /// Anything but a literal `true` means "keep it".
    pub fn replace_orig_ext(&self) -> bool {
        matches!(self.optional.get("replace_orig_ext"), Some(Value::Bool(true)))
    }

    /// Optional stem suffix; non-string values are ignored.
    pub fn suffix(&self) -> Option<&str> {
        self.optional.get("suffix").and_then(Value::as_str)
    }
}

/// Admission input for the conversion queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionInfo {
    pub fullpath: String,
    pub path: String,
    pub filestem: String,
    pub ext: String,
    /// Empty means "use the per-media-class defaults".
    pub convert_to: Vec<TargetFormat>,
}

impl ConversionInfo {
    pub fn new(info: FileInfo, convert_to: Vec<TargetFormat>) -> Self {
        Self {
            fullpath: info.fullpath,
            path: info.path,
            filestem: info.filestem,
            ext: info.ext,
            convert_to,
        }
    }
}

/// One persisted conversion queue row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversionEntry {
    pub id: i64,
    pub fullpath: String,
    pub path: String,
    pub filestem: String,
    pub ext: String,
    pub convert_to: Json<Vec<TargetFormat>>,
    pub status: EntryStatus,
    pub error_code: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversionEntry {
    pub fn targets(&self) -> &[TargetFormat] {
        &self.convert_to.0
    }

    /// Absolute source location under the media root.
    pub fn source_path(&self, root: &Path) -> PathBuf {
        root.join(self.fullpath.trim_start_matches('/'))
    }

    /// Absolute output location for one target.
    ///
    /// Naming: `{filestem}[.{source ext}][{suffix}].{target ext}`. The
    /// source extension is interposed unless the target opts out with
    /// `replace_orig_ext`, which keeps a generated `gen.jpg.webp` from
    /// colliding with a hypothetical `gen.webp` source.
    pub fn destination_path(&self, root: &Path, target: &TargetFormat) -> PathBuf {
        let mut name = self.filestem.clone();
        if !target.replace_orig_ext() && !self.ext.is_empty() {
            name.push('.');
            name.push_str(&self.ext);
        }
        if let Some(suffix) = target.suffix() {
            name.push_str(suffix);
        }
        name.push('.');
        name.push_str(&target.ext);

        root.join(self.path.trim_start_matches('/')).join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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

    #[test]
    fn destination_interposes_source_extension_by_default() {
        let e = entry("/files/a.jpg", vec![TargetFormat::new("webp")]);
        let dest = e.destination_path(Path::new("/root"), &e.targets()[0]);
        assert_eq!(dest, PathBuf::from("/root/files/a.jpg.webp"));
    }

    #[test]
    fn replace_orig_ext_drops_the_source_extension() {
        let mut target = TargetFormat::new("webp");
        target
            .optional
            .insert("replace_orig_ext".into(), json!(true));
        let e = entry("/files/a.jpg", vec![target]);
        let dest = e.destination_path(Path::new("/root"), &e.targets()[0]);
        assert_eq!(dest, PathBuf::from("/root/files/a.webp"));
    }

    #[test]
    fn non_bool_replace_orig_ext_is_ignored() {
        let mut target = TargetFormat::new("webp");
        target
            .optional
            .insert("replace_orig_ext".into(), json!("yes"));
        let e = entry("/files/a.jpg", vec![target]);
        let dest = e.destination_path(Path::new("/root"), &e.targets()[0]);
        assert_eq!(dest, PathBuf::from("/root/files/a.jpg.webp"));
    }

    #[test]
    fn suffix_lands_before_the_target_extension() {
        let mut target = TargetFormat::new("avif");
        target.optional.insert("suffix".into(), json!("_thumb"));
        let e = entry("/files/a.png", vec![target]);
        let dest = e.destination_path(Path::new("/root"), &e.targets()[0]);
        assert_eq!(dest, PathBuf::from("/root/files/a.png_thumb.avif"));
    }

    #[test]
    fn source_path_strips_the_leading_slash_before_joining() {
        let e = entry("/files/a.jpg", vec![]);
        assert_eq!(
            e.source_path(Path::new("/srv/media")),
            PathBuf::from("/srv/media/files/a.jpg")
        );
    }

    #[test]
    fn target_format_round_trips_through_json() {
        let mut target = TargetFormat::new("webm");
        target.conv_conf.insert("c:v".into(), json!("libvpx-vp9"));
        target.conv_conf.insert("crf".into(), json!(40));
        let raw = serde_json::to_string(&vec![target.clone()]).unwrap();
        let back: Vec<TargetFormat> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, vec![target]);
    }
}
