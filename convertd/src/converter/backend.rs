//! Codec backend contract.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Codec parameters handed to a backend, e.g. `{c:v: libvpx-vp9, crf: 40}`.
pub type ConvConf = BTreeMap<String, Value>;

/// Opaque backend failure; the pipeline wraps it into its own error code.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A codec backend converts one source file into one destination file.
///
/// The destination is a sibling temporary; the pipeline performs the atomic
/// replace afterwards, so backends never touch the final name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn convert(&self, src: &Path, dest: &Path, config: &ConvConf)
    -> Result<(), BackendError>;
}

/// Overlay configuration layers, last writer wins per key.
pub fn merge_configs<'a, I>(layers: I) -> ConvConf
where
    I: IntoIterator<Item = Option<&'a ConvConf>>,
{
    let mut merged = ConvConf::new();
    for layer in layers.into_iter().flatten() {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
