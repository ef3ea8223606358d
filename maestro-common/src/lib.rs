//! Maestro Common Library
//!
//! Shared building blocks for the Maestro stove bridge:
//!
//! - [`config`] - Bus, logging and file loading (JSON5 format)
//! - [`session`] - Zenoh session and MQTT client setup
//! - [`topic`] - Topic builders and wildcard matching
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod session;
pub mod topic;

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::registry::LookupSpan;

// Re-export commonly used types at the crate root
pub use config::{
    BusConfig, LogFormat, LoggingConfig, MqttConfig, ZenohConfig, load_config, parse_config,
};
pub use error::{Error, Result};
pub use session::{connect, mqtt_options, mqtt_qos};
pub use topic::WildcardStyle;

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// When `config.file` is set, every event is also appended (without ANSI
/// colors) to a daily rotated file named after it; only the current and the
/// previous day's files are kept. The returned guard flushes the file writer when
/// dropped and must be kept alive for the lifetime of the process.
///
/// # Example
///
/// ```ignore
/// use maestro_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
///     file: None,
/// };
/// let _guard = init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(file_layer(writer))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(file_layer(writer))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(guard)
}

/// Log files kept on disk: the current one plus one backup.
const LOG_FILES_KEPT: usize = 2;

/// Open a non-blocking writer on a daily rotated file prefixed by `path`.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path.file_name().ok_or_else(|| {
        Error::Config(format!("Invalid log file path '{}'", path.display()))
    })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name.to_string_lossy())
        .max_log_files(LOG_FILES_KEPT)
        .build(directory)
        .map_err(|e| Error::Config(format!("Failed to open log file: {}", e)))?;
    Ok(tracing_appender::non_blocking(appender))
}

fn file_layer<S>(writer: Option<NonBlocking>) -> Option<impl Layer<S>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
    })
}
