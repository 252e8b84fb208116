//! Lexical path splitting.
//!
//! Every stored path begins with `/` and is an offset from the media root
//! (the process working directory unless a prefix is given). Splitting is
//! purely lexical: no filesystem access happens here.

use std::path::{Path, PathBuf};

/// The decomposed form of a submitted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Canonical leading-slash path, e.g. "/files/gen.jpg".
    pub fullpath: String,
    /// Parent directory, e.g. "/files".
    pub path: String,
    /// File name without the final extension, e.g. "gen".
    pub filestem: String,
    /// Final extension, lowercased, without the leading dot, e.g. "jpg".
    pub ext: String,
}

impl FileInfo {
    /// Split a leading-slash path into its stored components.
    pub fn from_path(fullpath: &str) -> Self {
        let (path, name) = match fullpath.rfind('/') {
            Some(idx) => (&fullpath[..idx], &fullpath[idx + 1..]),
            None => ("", fullpath),
        };
        let (filestem, ext) = match name.rfind('.') {
            // A leading dot is part of the name, not an extension marker.
            Some(0) | None => (name, ""),
            Some(idx) => (&name[..idx], &name[idx + 1..]),
        };

        Self {
            fullpath: fullpath.to_string(),
            path: path.to_string(),
            filestem: filestem.to_string(),
            ext: ext.to_ascii_lowercase(),
        }
    }
}

/// Resolve a stored leading-slash path against a root prefix.
///
/// An empty prefix means the process working directory.
pub fn absolute_from_relative(rel: &str, prefix: &Path) -> PathBuf {
    let root = if prefix.as_os_str().is_empty() {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        prefix.to_path_buf()
    };
    root.join(rel.trim_start_matches('/'))
}
