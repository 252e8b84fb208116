//! Application configuration.
//!
//! Configuration is layered: a YAML file selected by `CONFIG_PATH` provides
//! the base values, then environment variables with the same names override
//! them field by field. A second YAML file selected by `DEFAULTS_PATH`
//! carries the per-media default target formats; when absent, built-in
//! defaults apply (webp for images, webm for videos).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::database::models::TargetFormat;
use crate::error::{Error, Result};

/// Default worker check interval (5 minutes).
const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 300;

/// Deployment environment, selects the log format and verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Local,
    Dev,
    Prod,
}

impl Env {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "dev" => Some(Self::Dev),
            "prod" => Some(Self::Prod),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Bind address, e.g. "127.0.0.1:8080".
    pub address: String,
    /// Per-request read timeout in seconds.
    pub read_timeout: u64,
    /// Per-request write timeout in seconds.
    pub write_timeout: u64,
    /// Keep-alive idle timeout in seconds.
    pub idle_timeout: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".to_string(),
            read_timeout: 10,
            write_timeout: 30,
            idle_timeout: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite DSN, e.g. "sqlite:convertd.db?mode=rwc".
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite:convertd.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Interval between periodic queue checks, in seconds.
    pub check_timeout: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            check_timeout: DEFAULT_CHECK_TIMEOUT_SECS,
        }
    }
}

impl TaskConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_timeout)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Codec thread count; 0 lets the backend decide.
    pub threads: u32,
}

/// Default target formats for one media class.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaFormats {
    pub formats: Vec<TargetFormat>,
}

/// Contents of the `DEFAULTS_PATH` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatDefaults {
    pub image: MediaFormats,
    pub video: MediaFormats,
}

impl Default for FormatDefaults {
    fn default() -> Self {
        Self {
            image: MediaFormats {
                formats: vec![TargetFormat::new("webp")],
            },
            video: MediaFormats {
                formats: vec![TargetFormat::new("webm")],
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub env: Env,
    pub http_server: HttpServerConfig,
    pub database: DatabaseConfig,
    pub task: TaskConfig,
    pub image: MediaConfig,
    pub video: MediaConfig,
    #[serde(skip)]
    pub defaults: FormatDefaults,
}

impl AppConfig {
    /// Load configuration from `CONFIG_PATH` / `DEFAULTS_PATH` plus the
    /// environment overlay.
    ///
    /// A `CONFIG_PATH` that points at a missing or malformed file is a fatal
    /// error; an unset `CONFIG_PATH` means pure defaults plus environment.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };

        config.apply_env_overrides();

        config.defaults = match std::env::var("DEFAULTS_PATH") {
            Ok(path) if !path.trim().is_empty() => load_defaults(Path::new(&path))?,
            _ => FormatDefaults::default(),
        };

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            Error::config(format!("malformed config file '{}': {}", path.display(), e))
        })
    }

    /// Overlay environment variables onto the file values.
    fn apply_env_overrides(&mut self) {
        if let Some(env) = env_var("ENV").and_then(|v| Env::parse(&v)) {
            self.env = env;
        }
        if let Some(address) = env_var("ADDRESS") {
            self.http_server.address = address;
        }
        if let Some(secs) = env_var("READ_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.http_server.read_timeout = secs;
        }
        if let Some(secs) = env_var("WRITE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.http_server.write_timeout = secs;
        }
        if let Some(secs) = env_var("IDLE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.http_server.idle_timeout = secs;
        }
        if let Some(dsn) = env_var("DATABASE_DSN") {
            self.database.dsn = dsn;
        }
        if let Some(secs) = env_var("CHECK_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.task.check_timeout = secs;
        }
        if let Some(threads) = env_var("IMAGE_THREADS").and_then(|v| v.parse().ok()) {
            self.image.threads = threads;
        }
        if let Some(threads) = env_var("VIDEO_THREADS").and_then(|v| v.parse().ok()) {
            self.video.threads = threads;
        }
    }
}

fn load_defaults(path: &Path) -> Result<FormatDefaults> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "cannot read defaults file '{}': {}",
            path.display(),
            e
        ))
    })?;
    serde_yaml::from_str(&raw).map_err(|e| {
        Error::config(format!(
            "malformed defaults file '{}': {}",
            path.display(),
            e
        ))
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
