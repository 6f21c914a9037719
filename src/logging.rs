//! Tracing subscriber setup.
//!
//! Logs are filtered through `RUST_LOG` (default `warn`) and written to stderr,
//! or appended to `CANVAS_LOG_FILE` when it is set so they stay out of the
//! interactive output. Both sinks go through a `tracing-appender` worker thread.
//! `CANVAS_LOG_JSON=1` emits newline-delimited JSON.

use crate::error::{AppError, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub json: bool,
    pub file: Option<PathBuf>,
    /// Verbosity used when `RUST_LOG` is not set.
    pub default_level: Level,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            json: false,
            file: None,
            default_level: Level::WARN,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        let json = env::var("CANVAS_LOG_JSON")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let file = env::var("CANVAS_LOG_FILE")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            json,
            file,
            ..Self::default()
        }
    }
}

/// Appender writing every line to exactly `path`, creating its directory.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Config(format!("CANVAS_LOG_FILE has no file name: {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map_err(|e| AppError::Config(format!("cannot open log file {}: {}", path.display(), e)))
}

/// Background writer for the configured sink; the guard flushes it on drop.
fn writer(settings: &LogSettings) -> Result<(NonBlocking, WorkerGuard)> {
    Ok(match &settings.file {
        Some(path) => tracing_appender::non_blocking(file_appender(path)?),
        None => tracing_appender::non_blocking(std::io::stderr()),
    })
}

/// Installs the global subscriber. Later calls are ignored.
///
/// Keep the returned guard alive until exit, or buffered lines are lost.
pub fn init_tracing(settings: &LogSettings) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_level.as_str()));

    let (writer, guard) = writer(settings)?;
    let layer = fmt::layer().with_target(false).with_writer(writer);

    if settings.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_ansi(settings.file.is_none()))
            .try_init()
            .ok();
    }
    Ok(guard)
}
