//! Reachability probes.

use std::time::Duration;

use super::candidate::ProxyCandidate;
use crate::BoxFuture;

/// Default probe endpoint: small, fast, HTTPS.
pub const DEFAULT_PROBE_ENDPOINT: &str = "https://api.myip.com";

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Checks whether a candidate currently relays traffic.
///
/// Probes never fail: any error is a `false`.
pub trait ReachabilityProbe: Send + Sync {
    fn probe<'a>(&'a self, candidate: &'a ProxyCandidate) -> BoxFuture<'a, bool>;
}

/// Issues a GET to a fixed endpoint through the candidate.
pub struct HttpProbe {
    endpoint: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Probe `endpoint`, giving each candidate `timeout` to answer.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    async fn check(&self, candidate: &ProxyCandidate) -> Result<(), reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(url) = candidate.path().proxy_url() {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }
        builder
            .build()?
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ENDPOINT, DEFAULT_PROBE_TIMEOUT)
    }
}

impl ReachabilityProbe for HttpProbe {
    fn probe<'a>(&'a self, candidate: &'a ProxyCandidate) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.check(candidate).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::trace!(proxy = %candidate, error = %e, "Probe failed");
                    false
                }
            }
        })
    }
}
