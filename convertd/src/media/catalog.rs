//! Format catalog: which source types are accepted, and what they may
//! become.
//!
//! The permitted-target table is static. Default target lists come from
//! configuration and are selected per media class at admission time.

use crate::database::models::TargetFormat;
use crate::media::sniff::MediaKind;

const IMAGE_TARGETS: &[&str] = &["webp", "avif"];
const VIDEO_TARGETS: &[&str] = &["webm"];

fn permitted_targets(ext: &str) -> Option<&'static [&'static str]> {
    match ext {
        "jpg" | "jpeg" | "png" => Some(IMAGE_TARGETS),
        "mp4" => Some(VIDEO_TARGETS),
        _ => None,
    }
}

/// Whether files with this source extension can be enqueued at all.
pub fn is_supported(ext: &str) -> bool {
    permitted_targets(ext).is_some()
}

/// Whether `from` sources may be transcoded into `to`.
pub fn is_convertible(from: &str, to: &str) -> bool {
    permitted_targets(from).is_some_and(|targets| targets.contains(&to))
}

/// The per-media-class default target lists.
#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    image_defaults: Vec<TargetFormat>,
    video_defaults: Vec<TargetFormat>,
}

impl FormatCatalog {
    pub fn new(image_defaults: Vec<TargetFormat>, video_defaults: Vec<TargetFormat>) -> Self {
        Self {
            image_defaults,
            video_defaults,
        }
    }

    /// Default targets for a classified source; empty for `Other`.
    pub fn defaults_for(&self, kind: MediaKind) -> &[TargetFormat] {
        match kind {
            MediaKind::Image => &self.image_defaults,
            MediaKind::Video => &self.video_defaults,
            MediaKind::Other => &[],
        }
    }

    pub fn image_defaults(&self) -> &[TargetFormat] {
        &self.image_defaults
    }

    pub fn video_defaults(&self) -> &[TargetFormat] {
        &self.video_defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_sources_permit_webp_and_avif() {
        for src in ["jpg", "jpeg", "png"] {
            assert!(is_supported(src));
            assert!(is_convertible(src, "webp"));
            assert!(is_convertible(src, "avif"));
            assert!(!is_convertible(src, "webm"));
        }
    }

    #[test]
    fn mp4_permits_webm_only() {
        assert!(is_supported("mp4"));
        assert!(is_convertible("mp4", "webm"));
        assert!(!is_convertible("mp4", "webp"));
    }

    #[test]
    fn unknown_sources_are_rejected() {
        assert!(!is_supported("gif"));
        assert!(!is_supported(""));
        assert!(!is_convertible("gif", "webp"));
    }

    #[test]
    fn defaults_follow_the_classified_kind() {
        let catalog = FormatCatalog::new(
            vec![TargetFormat::new("webp")],
            vec![TargetFormat::new("webm")],
        );
        assert_eq!(catalog.defaults_for(MediaKind::Image)[0].ext, "webp");
        assert_eq!(catalog.defaults_for(MediaKind::Video)[0].ext, "webm");
        assert!(catalog.defaults_for(MediaKind::Other).is_empty());
    }
}
