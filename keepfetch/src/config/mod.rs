//! Configuration for download sessions.
//!
//! - [`SessionConfig`]: in-memory settings consumed by [`crate::session::Session`]
//! - [`ConfigFile`]: optional INI file (`~/.config/keepfetch/config.ini`) that
//!   seeds a `SessionConfig`; command-line flags override it
//! - [`parse_size`] / [`format_size`]: human-readable byte sizes

mod file;
mod session;
mod size;

pub use file::{
    default_config_path, ConfigFile, DownloadSection, LinkSection, LoggingSection, ProxySection,
    RetrySection,
};
pub use session::{
    SessionConfig, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_PROXY_FILE, DEFAULT_WORK_DIR,
};
pub use size::{format_size, parse_size};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The INI file exists but could not be read or parsed.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// A key holds a value of the wrong shape.
    #[error("invalid value for [{section}] {key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// A size string could not be parsed.
    #[error("invalid size: {0:?}")]
    InvalidSize(String),
}
