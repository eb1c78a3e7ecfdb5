//! Proxy pool: persisted candidate list plus concurrent validation.
//!
//! # Validation
//!
//! ```text
//! ProxySource ──► dedupe ──► shuffle ──► probe (≤ max_in_flight at once)
//!                                           │
//!                          confirmed accumulator (Mutex, ≤ quota)
//!                                           │
//!                    quota reached ──► cancel outstanding probes
//! ```
//!
//! Cancellation is cooperative: a probe that completes after the quota was
//! reached is discarded, never appended.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::candidate::{ProbeStatus, ProxyCandidate};
use super::probe::{ReachabilityProbe, DEFAULT_PROBE_ENDPOINT, DEFAULT_PROBE_TIMEOUT};
use super::source::ProxySource;
use super::ProxyError;

/// Default number of simultaneous probes.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 200;

/// Default number of confirmed candidates after which validation stops.
pub const DEFAULT_QUOTA: usize = 50;

/// Proxy validation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Maximum number of probes in flight.
    pub max_in_flight: usize,
    /// Stop once this many candidates are confirmed.
    pub quota: usize,
    /// Endpoint fetched through each candidate.
    pub probe_endpoint: String,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            quota: DEFAULT_QUOTA,
            probe_endpoint: DEFAULT_PROBE_ENDPOINT.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Confirmed proxy candidates backed by a newline-delimited file.
///
/// Readers get immutable snapshots via [`ProxyPool::get_all`]; only
/// [`ProxyPool::refresh`] replaces the set.
pub struct ProxyPool {
    path: PathBuf,
    candidates: RwLock<Arc<Vec<ProxyCandidate>>>,
    validation: ValidationConfig,
}

impl ProxyPool {
    /// Load the persisted list at `path`. A missing file is an empty pool.
    ///
    /// Persisted entries were confirmed by the refresh that wrote them and
    /// load as [`ProbeStatus::Confirmed`].
    pub fn load(path: impl Into<PathBuf>, validation: ValidationConfig) -> Result<Self, ProxyError> {
        let path = path.into();
        let candidates = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| ProxyError::Io {
                path: path.clone(),
                source,
            })?;
            parse_list(&contents)
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), count = candidates.len(), "Loaded proxy list");

        Ok(Self {
            path,
            candidates: RwLock::new(Arc::new(candidates)),
            validation,
        })
    }

    /// Snapshot of the confirmed candidates, in order.
    ///
    /// Empty means no proxy is available and callers fall back to a single
    /// direct attempt.
    pub fn get_all(&self) -> Arc<Vec<ProxyCandidate>> {
        Arc::clone(&self.candidates.read())
    }

    /// Number of confirmed candidates.
    pub fn len(&self) -> usize {
        self.candidates.read().len()
    }

    /// True when no confirmed candidates are held.
    pub fn is_empty(&self) -> bool {
        self.candidates.read().is_empty()
    }

    /// Address file backing the pool.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch, deduplicate, validate and persist a fresh candidate set.
    ///
    /// Returns the number of confirmed candidates.
    pub async fn refresh(
        &self,
        source: &dyn ProxySource,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Result<usize, ProxyError> {
        let raw = source.fetch().await?;
        let mut candidates = dedupe(&raw);
        candidates.shuffle(&mut rand::rng());

        tracing::info!(
            raw = raw.len(),
            unique = candidates.len(),
            quota = self.validation.quota,
            "Validating proxy candidates"
        );

        let confirmed = validate_candidates(candidates, probe, &self.validation).await;
        let count = confirmed.len();

        *self.candidates.write() = Arc::new(confirmed);
        self.save()?;

        tracing::info!(confirmed = count, "Proxy validation finished");
        Ok(count)
    }

    /// Write the current set to the backing file.
    pub fn save(&self) -> Result<(), ProxyError> {
        let io_error = |source| ProxyError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let snapshot = self.get_all();
        let contents = snapshot
            .iter()
            .map(ProxyCandidate::address)
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&self.path, contents).map_err(io_error)
    }
}

fn parse_list(contents: &str) -> Vec<ProxyCandidate> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = ProxyCandidate::parse(line);
            if parsed.is_none() {
                tracing::debug!(line, "Skipping malformed proxy line");
            }
            parsed
        })
        .map(|c| c.with_status(ProbeStatus::Confirmed))
        .collect()
}

/// Parse raw lines into unique candidates, keeping first-seen order.
pub fn dedupe(raw: &[String]) -> Vec<ProxyCandidate> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|line| ProxyCandidate::parse(line))
        .filter(|c| seen.insert(c.address().to_string()))
        .collect()
}

/// Probe candidates concurrently until `config.quota` are confirmed.
///
/// At most `config.max_in_flight` probes run at once. The result never holds
/// more than `config.quota` candidates.
pub async fn validate_candidates(
    candidates: Vec<ProxyCandidate>,
    probe: Arc<dyn ReachabilityProbe>,
    config: &ValidationConfig,
) -> Vec<ProxyCandidate> {
    let quota = config.quota;
    if quota == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let cancel = CancellationToken::new();
    let confirmed = Arc::new(Mutex::new(Vec::with_capacity(quota)));
    let mut tasks = JoinSet::new();

    for candidate in candidates {
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let confirmed = Arc::clone(&confirmed);
        let probe = Arc::clone(&probe);

        tasks.spawn(async move {
            let _permit = tokio::select! {
                _ = cancel.cancelled() => return,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let reachable = tokio::select! {
                _ = cancel.cancelled() => return,
                reachable = probe.probe(&candidate) => reachable,
            };
            if !reachable {
                return;
            }

            let mut confirmed = confirmed.lock();
            if confirmed.len() >= quota {
                tracing::trace!(proxy = %candidate, "Discarding late probe result");
                return;
            }
            tracing::debug!(proxy = %candidate, found = confirmed.len() + 1, quota, "Proxy confirmed");
            confirmed.push(candidate.with_status(ProbeStatus::Confirmed));
            if confirmed.len() >= quota {
                cancel.cancel();
            }
        });
    }

    while tasks.join_next().await.is_some() {
        if cancel.is_cancelled() {
            tasks.abort_all();
        }
    }

    let result = std::mem::take(&mut *confirmed.lock());
    result
}
