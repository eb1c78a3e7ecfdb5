//! Proxy pool management.
//!
//! Candidates come from a [`ProxySource`], are checked by a
//! [`ReachabilityProbe`] and persisted by [`ProxyPool`]. Each candidate maps
//! to a [`NetworkPath`]; the link acquirer walks those paths in order.

mod candidate;
mod pool;
mod probe;
mod source;

use std::path::PathBuf;

use thiserror::Error;

pub use candidate::{NetworkPath, ProbeStatus, ProxyCandidate};
pub use pool::{
    dedupe, validate_candidates, ProxyPool, ValidationConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QUOTA,
};
pub use probe::{HttpProbe, ReachabilityProbe, DEFAULT_PROBE_ENDPOINT, DEFAULT_PROBE_TIMEOUT};
pub use source::{HttpProxySource, ProxySource, StaticProxySource, DEFAULT_PROXY_SOURCES};

/// Errors from proxy list handling.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No candidate list could be fetched.
    #[error("Proxy source error: {0}")]
    Source(String),

    /// Reading or writing the proxy file failed.
    #[error("Proxy file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
