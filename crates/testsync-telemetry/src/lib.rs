//! Tracing setup.
//!
//! Events go to `<log_dir>/test-sync.log` when a directory is configured and
//! writable, otherwise to stderr. `RUST_LOG` takes precedence over the
//! configured level.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Name of the log file created inside the log directory.
pub const LOG_FILE_NAME: &str = "test-sync.log";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("unknown log level {0:?}")]
    InvalidLevel(String),
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by the RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "testsync_engine" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
    /// Directory holding the log file. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
            log_dir: None,
        }
    }
}

/// Returned by [`init_telemetry`]. Reports where logs ended up.
#[derive(Debug)]
pub struct TelemetryGuard {
    log_path: Option<PathBuf>,
}

impl TelemetryGuard {
    /// The log file in use, or `None` when logging to stderr.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config)));

    let (writer, log_path, ansi) = match config.log_dir.as_deref().map(open_log_file) {
        Some(Ok((file, path))) => (BoxMakeWriter::new(Arc::new(file)), Some(path), false),
        Some(Err(e)) => {
            eprintln!("testsync-telemetry: cannot open log file, using stderr: {e}");
            (BoxMakeWriter::new(std::io::stderr), None, true)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let (json_layer, text_layer) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(writer);
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    Ok(TelemetryGuard { log_path })
}

/// Parse a level name, case-insensitively.
pub fn parse_level(name: &str) -> Result<Level, TelemetryError> {
    Level::from_str(name.trim()).map_err(|_| TelemetryError::InvalidLevel(name.to_string()))
}

/// Filter string built from the default level plus module overrides.
pub fn filter_directives(config: &TelemetryConfig) -> String {
    let mut directives = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        directives.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    directives
}

fn open_log_file(dir: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}
