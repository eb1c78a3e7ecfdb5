//! Candidate address sources.

use std::time::Duration;

use super::ProxyError;
use crate::BoxFuture;

/// Public proxy lists queried by default.
pub const DEFAULT_PROXY_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/?request=getproxies&proxytype=https&timeout=10000&country=all&ssl=all&anonymity=all",
    "https://api.proxyscrape.com/?request=getproxies&proxytype=http&timeout=10000&country=all&ssl=all&anonymity=all",
];

/// Supplies raw `host:port` candidate lines.
pub trait ProxySource: Send + Sync {
    /// Fetch candidate lines. Order matters only for deduplication.
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<String>, ProxyError>>;
}

/// Reads newline-delimited candidates from one or more HTTP endpoints.
///
/// A failing endpoint is logged and skipped; the fetch fails only when every
/// endpoint fails.
pub struct HttpProxySource {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpProxySource {
    /// Pull candidates from each of `urls` in turn.
    pub fn new(urls: Vec<String>, timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::Source(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, urls })
    }

    async fn fetch_one(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl ProxySource for HttpProxySource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<String>, ProxyError>> {
        Box::pin(async move {
            let mut lines = Vec::new();
            let mut failures = 0;

            for url in &self.urls {
                match self.fetch_one(url).await {
                    Ok(body) => {
                        let before = lines.len();
                        lines.extend(body.lines().map(str::to_string));
                        tracing::debug!(url = %url, count = lines.len() - before, "Fetched proxy list");
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(url = %url, error = %e, "Proxy source failed");
                    }
                }
            }

            if !self.urls.is_empty() && failures == self.urls.len() {
                return Err(ProxyError::Source("all proxy sources failed".to_string()));
            }
            Ok(lines)
        })
    }
}

/// A fixed list of candidates.
pub struct StaticProxySource {
    lines: Vec<String>,
}

impl StaticProxySource {
    /// Serve a fixed list of raw `host:port` lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

impl ProxySource for StaticProxySource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<String>, ProxyError>> {
        let lines = self.lines.clone();
        Box::pin(async move { Ok(lines) })
    }
}
