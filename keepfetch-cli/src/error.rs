//! CLI error type.

use std::fmt;

use keepfetch::config::ConfigError;
use keepfetch::logging::LoggingError;
use keepfetch::session::SessionError;

/// Errors surfaced to the user as `Error: <reason>`.
#[derive(Debug)]
pub enum CliError {
    /// Configuration problems (bad file, bad flag value).
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The async runtime could not be created.
    Runtime(std::io::Error),
    /// The download itself failed.
    Session(SessionError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "failed to start runtime: {}", e),
            CliError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}
