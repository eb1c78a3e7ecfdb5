//! Ranged HTTP transfer.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::proxy::NetworkPath;
use crate::BoxFuture;

/// Statuses treated as "slow down".
const RATE_LIMIT_STATUSES: [u16; 3] = [429, 503, 509];

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a single chunk transfer attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Server asked to back off.
    #[error("Rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    /// Non-success status other than rate limiting.
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Server answered a range request with the wrong status.
    #[error("Range request ignored (HTTP {status})")]
    RangeIgnored { status: u16 },

    /// Body ended before the range was complete.
    #[error("Short body: expected {expected} bytes, received {received}")]
    ShortBody { expected: u64, received: u64 },

    /// Body carried more bytes than the range.
    #[error("Body exceeds expected {expected} bytes")]
    Overflow { expected: u64 },

    /// Connect, read or timeout failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Local part-file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Map a response status to an error, or `None` for success.
    pub fn from_status(status: u16) -> Option<Self> {
        if (200..300).contains(&status) {
            None
        } else if RATE_LIMIT_STATUSES.contains(&status) {
            Some(TransferError::RateLimited { status })
        } else {
            Some(TransferError::Http { status })
        }
    }

    /// Server asked to back off (429, 503 or 509).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransferError::RateLimited { .. })
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::RateLimited { .. } => true,
            TransferError::Http { status } => *status >= 500,
            TransferError::RangeIgnored { .. } => false,
            TransferError::ShortBody { .. }
            | TransferError::Overflow { .. }
            | TransferError::Network(_)
            | TransferError::Io(_) => true,
        }
    }
}

/// Incrementally readable response body.
pub trait RangeBody: Send {
    /// Next piece of the body, or `None` at the end.
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransferError>>;
}

/// A successful (2xx) response to a range request.
pub struct RangeResponse {
    pub status: u16,
    pub body: Box<dyn RangeBody>,
}

/// HTTP operations the chunk fetcher needs.
pub trait RangeClient: Send + Sync {
    /// GET `url` with `Range: bytes=start-end`.
    ///
    /// Non-2xx statuses come back as errors via [`TransferError::from_status`].
    fn open_range<'a>(
        &'a self,
        url: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, Result<RangeResponse, TransferError>>;

    /// Size advertised by a HEAD request, if any.
    fn content_length<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<u64>, TransferError>>;
}

/// Range client over reqwest, bound to one network path.
pub struct ReqwestRangeClient {
    client: Client,
    read_timeout: Duration,
}

impl ReqwestRangeClient {
    /// Build a client for `path`. `read_timeout` bounds each body read.
    pub fn new(path: &NetworkPath, read_timeout: Duration) -> Result<Self, TransferError> {
        let mut builder = Client::builder().connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        if let Some(url) = path.proxy_url() {
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| TransferError::Network(format!("invalid proxy {}: {}", path, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| TransferError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            read_timeout,
        })
    }
}

fn network(e: reqwest::Error) -> TransferError {
    TransferError::Network(e.to_string())
}

struct ReqwestBody {
    response: reqwest::Response,
    read_timeout: Duration,
}

impl RangeBody for ReqwestBody {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransferError>> {
        Box::pin(async move {
            match tokio::time::timeout(self.read_timeout, self.response.chunk()).await {
                Ok(chunk) => chunk.map_err(network),
                Err(_) => Err(TransferError::Network(format!(
                    "no data for {}s",
                    self.read_timeout.as_secs()
                ))),
            }
        })
    }
}

impl RangeClient for ReqwestRangeClient {
    fn open_range<'a>(
        &'a self,
        url: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, Result<RangeResponse, TransferError>> {
        Box::pin(async move {
            let request = self
                .client
                .get(url)
                .header(RANGE, format!("bytes={}-{}", start, end))
                .send();
            let response = tokio::time::timeout(self.read_timeout, request)
                .await
                .map_err(|_| TransferError::Network("request timed out".to_string()))?
                .map_err(network)?;

            let status = response.status().as_u16();
            if let Some(err) = TransferError::from_status(status) {
                return Err(err);
            }

            Ok(RangeResponse {
                status,
                body: Box::new(ReqwestBody {
                    response,
                    read_timeout: self.read_timeout,
                }),
            })
        })
    }

    fn content_length<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<u64>, TransferError>> {
        Box::pin(async move {
            let response = self.client.head(url).send().await.map_err(network)?;
            if response.status() != StatusCode::OK {
                return Err(TransferError::from_status(response.status().as_u16())
                    .unwrap_or(TransferError::Http {
                        status: response.status().as_u16(),
                    }));
            }

            // HEAD bodies are empty, so read the header rather than the size hint.
            Ok(response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(TransferError::from_status(206).is_none());
        assert!(TransferError::from_status(200).is_none());

        for status in [429, 503, 509] {
            let err = TransferError::from_status(status).unwrap();
            assert!(err.is_rate_limited());
            assert!(err.is_retryable());
        }

        let err = TransferError::from_status(500).unwrap();
        assert!(!err.is_rate_limited());
        assert!(err.is_retryable());

        let err = TransferError::from_status(403).unwrap();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_body_errors_are_retryable() {
        assert!(TransferError::ShortBody {
            expected: 10,
            received: 2
        }
        .is_retryable());
        assert!(TransferError::Network("reset".into()).is_retryable());
        assert!(!TransferError::RangeIgnored { status: 200 }.is_retryable());
    }

    #[test]
    fn test_client_for_proxy_path() {
        let path = NetworkPath::Proxy("127.0.0.1:3128".to_string());
        assert!(ReqwestRangeClient::new(&path, Duration::from_secs(5)).is_ok());
        assert!(ReqwestRangeClient::new(&NetworkPath::Direct, Duration::from_secs(5)).is_ok());
    }
}
