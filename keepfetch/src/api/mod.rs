//! Hosting API collaborator.
//!
//! The hosting service exposes three JSON endpoints (`getFilesInfo`,
//! `requestCaptcha`, `getUrl`). [`HostingApi`] abstracts them so the link
//! state machine can be driven by a mock in tests; [`ReqwestHostingApi`] is
//! the production implementation.

mod client;
mod error;
mod file_id;
mod types;

pub use client::{HostingApi, ReqwestHostingApi, DEFAULT_API_BASE};
pub use error::ApiError;
pub use file_id::extract_file_id;
pub use types::{
    CaptchaChallenge, ExchangeOutcome, ExchangeRequest, FileDescriptor, MSG_FILE_NOT_FOUND,
    MSG_INVALID_CAPTCHA, UNKNOWN_FILE_NAME,
};
