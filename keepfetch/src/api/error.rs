//! Hosting API errors.

use thiserror::Error;

/// Errors returned by [`super::HostingApi`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, proxy).
    #[error("request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The response body was not what the endpoint should return.
    #[error("invalid response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// The API answered with an error message.
    #[error("API error: {0}")]
    Api(String),

    /// A proxy address could not be turned into a client.
    #[error("invalid proxy address {0}")]
    InvalidProxy(String),
}
