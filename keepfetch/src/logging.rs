//! Logging setup.
//!
//! Installs a `tracing` subscriber with a stderr layer and, when a log
//! directory is configured, a non-blocking file layer. `RUST_LOG` overrides
//! the configured level.

use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "keepfetch.log";

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for the log file. `None` disables file logging.
    pub directory: Option<PathBuf>,
    /// Default filter level (e.g. `info`, `debug`).
    pub level: Option<String>,
    /// Force debug output regardless of `level`.
    pub verbose: bool,
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub fn directive(&self) -> String {
        let level = if self.verbose {
            "debug"
        } else {
            self.level.as_deref().unwrap_or("info")
        };
        format!("keepfetch={level},keepfetch_cli={level},warn")
    }
}

/// Keeps the background log writer alive. Drop it at process exit.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A global subscriber was already installed.
    #[error("logging already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive()));

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .compact();

    let (file_layer, file_guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
