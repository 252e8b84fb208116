//! ffmpeg-spawning codec backend.
//!
//! One instance serves one media class; the container keeps separate
//! instances for images and videos so each carries its own thread budget.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::backend::{BackendError, ConvConf, MediaBackend};

/// Upper bound on the stderr excerpt carried inside a failure.
const STDERR_EXCERPT_LEN: usize = 2048;

pub struct FfmpegBackend {
    program: String,
    threads: u32,
}

impl FfmpegBackend {
    pub fn new(threads: u32) -> Self {
        Self::with_program("ffmpeg", threads)
    }

    /// Use an alternative executable. Tests point this at a stub.
    pub fn with_program(program: impl Into<String>, threads: u32) -> Self {
        Self {
            program: program.into(),
            threads,
        }
    }

    fn build_args(&self, src: &Path, dest: &Path, config: &ConvConf) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
            .iter()
            .map(OsString::from)
            .collect();

        args.push("-i".into());
        args.push(src.into());

        if self.threads > 0 {
            args.push("-threads".into());
            args.push(self.threads.to_string().into());
        }

        for (key, value) in config {
            args.push(format!("-{key}").into());
            args.push(render_value(value).into());
        }

        // The destination carries a transient marker extension, so the
        // container format cannot be inferred from the output name.
        if let Some(muxer) = muxer_for(dest) {
            args.push("-f".into());
            args.push(muxer.into());
        }

        args.push(dest.into());
        args
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn convert(
        &self,
        src: &Path,
        dest: &Path,
        config: &ConvConf,
    ) -> Result<(), BackendError> {
        let args = self.build_args(src, dest, config);
        debug!(program = %self.program, src = %src.display(), dest = %dest.display(), "spawning codec");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BackendError::new(format!("failed to spawn '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_LEN).collect();
            return Err(BackendError::new(format!(
                "'{}' exited with {}: {}",
                self.program, output.status, excerpt
            )));
        }

        Ok(())
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Explicit muxer for a destination whose real extension sits under the
/// transient `.tmp` marker.
fn muxer_for(dest: &Path) -> Option<&'static str> {
    let name = dest.file_name()?.to_str()?;
    let stem = name.strip_suffix(".tmp").unwrap_or(name);
    match stem.rsplit('.').next()? {
        "webp" => Some("webp"),
        "avif" => Some("avif"),
        "webm" => Some("webm"),
        "mp4" => Some("mp4"),
        _ => None,
    }
}
