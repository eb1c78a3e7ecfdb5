//! Link acquisition errors.

use thiserror::Error;

use crate::api::ApiError;
use crate::captcha::SolverError;

/// Errors that end link acquisition.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The hosting service reports the file as missing.
    #[error("File is not available")]
    NotAvailable,

    /// Every candidate path was tried without obtaining a key.
    #[error("All network paths exhausted without obtaining a download key")]
    ExhaustedCandidates,

    /// A key was bound but no download URL could be minted.
    #[error("No download links could be generated")]
    NoLinks,

    /// Too many captcha answers were rejected.
    #[error("Captcha rejected {attempts} times")]
    InvalidChallengeExhausted { attempts: u32 },

    /// A challenge could not be requested.
    #[error("Failed to request captcha: {0}")]
    Challenge(#[source] ApiError),

    /// The solver failed to produce an answer.
    #[error("Captcha solver failed: {0}")]
    Solver(#[from] SolverError),
}

impl From<ApiError> for LinkError {
    fn from(err: ApiError) -> Self {
        LinkError::Challenge(err)
    }
}
