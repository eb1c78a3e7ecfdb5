//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::link::AcquisitionConfig;
use crate::proxy::ValidationConfig;
use crate::transfer::RetryPolicy;

/// Default chunk size (20 MB).
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// Default location of the persisted proxy list.
pub const DEFAULT_PROXY_FILE: &str = "proxies.txt";

/// Default directory for part files.
pub const DEFAULT_WORK_DIR: &str = "tmp";

/// Default timeout for hosting API calls and chunk reads.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent chunk transfers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Configuration for a single download session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Output path. When `None`, the display name reported by the API is used.
    pub output: Option<PathBuf>,

    /// Target size of each byte-range chunk.
    pub chunk_size: u64,

    /// Number of chunks transferred concurrently.
    ///
    /// This is also the number of download URLs requested from the API.
    pub concurrency: usize,

    /// Route link acquisition through validated proxies.
    pub use_proxies: bool,

    /// Re-validate the proxy list even if a persisted one exists.
    pub refresh_proxies: bool,

    /// Newline-delimited proxy address file.
    pub proxy_file: PathBuf,

    /// Plain-text endpoints that list candidate proxies.
    pub proxy_sources: Vec<String>,

    /// Directory holding part files between runs.
    pub work_dir: PathBuf,

    /// Timeout for API calls and for individual body reads.
    pub request_timeout: Duration,

    /// Fetch chunks through the proxy the download key is bound to.
    ///
    /// Off by default: generated URLs are fetched directly.
    pub transfer_via_bound_path: bool,

    /// Keep part files after assembly.
    pub keep_parts: bool,

    /// Chunk retry policy.
    pub retry: RetryPolicy,

    /// Link acquisition limits.
    pub acquisition: AcquisitionConfig,

    /// Proxy validation limits.
    pub validation: ValidationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            use_proxies: true,
            refresh_proxies: false,
            proxy_file: PathBuf::from(DEFAULT_PROXY_FILE),
            proxy_sources: crate::proxy::DEFAULT_PROXY_SOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            transfer_via_bound_path: false,
            keep_parts: false,
            retry: RetryPolicy::default(),
            acquisition: AcquisitionConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output path.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the number of concurrent chunk transfers (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enable or disable proxies for link acquisition.
    pub fn with_proxies(mut self, enabled: bool) -> Self {
        self.use_proxies = enabled;
        self
    }

    /// Force a proxy list refresh.
    pub fn with_refresh_proxies(mut self, refresh: bool) -> Self {
        self.refresh_proxies = refresh;
        self
    }

    /// Set the proxy list file.
    pub fn with_proxy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.proxy_file = path.into();
        self
    }

    /// Replace the proxy source endpoints.
    pub fn with_proxy_sources(mut self, sources: Vec<String>) -> Self {
        self.proxy_sources = sources;
        self
    }

    /// Set the part-file directory.
    pub fn with_work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = path.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fetch chunks through the key's bound proxy.
    pub fn with_transfer_via_bound_path(mut self, enabled: bool) -> Self {
        self.transfer_via_bound_path = enabled;
        self
    }

    /// Keep part files after assembly.
    pub fn with_keep_parts(mut self, keep: bool) -> Self {
        self.keep_parts = keep;
        self
    }

    /// Set the chunk retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the link acquisition limits.
    pub fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
        self.acquisition = acquisition;
        self
    }

    /// Set the proxy validation limits.
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }
}
