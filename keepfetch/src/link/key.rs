//! Download keys and URL sets.

use std::time::Duration;

use crate::proxy::NetworkPath;

/// What the exchange step granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Opaque key that mints download URLs.
    Key(String),
    /// A download URL handed out directly.
    Url(String),
}

/// A grant bound to the network path it was obtained over.
///
/// The server ties the grant to the client address it saw, so every follow-up
/// request must use [`DownloadKey::path`]. Lives only for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadKey {
    pub grant: Grant,
    pub path: NetworkPath,
    /// Wait that was served before the grant became usable.
    pub wait: Option<Duration>,
}

impl DownloadKey {
    /// A key bound to `path`, usable at once.
    pub fn new(grant: Grant, path: NetworkPath) -> Self {
        Self {
            grant,
            path,
            wait: None,
        }
    }

    /// Record the wait that was served before the key became valid.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }
}

/// Result of a full acquisition: the bound key and the URLs it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredLinks {
    pub key: DownloadKey,
    pub urls: Vec<String>,
}
