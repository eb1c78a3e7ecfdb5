//! Captcha solving.
//!
//! The link state machine hands each challenge to a [`CaptchaSolver`] and
//! submits whatever text comes back. How the answer is produced (a human at a
//! prompt, an external program) is up to the implementation.

mod command;

use thiserror::Error;

use crate::api::CaptchaChallenge;
use crate::BoxFuture;

pub use command::{CommandSolver, CAPTCHA_IMAGE_NAME};

/// A challenge ready to be shown to a solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaPresentation {
    /// Opaque challenge id.
    pub challenge: String,
    /// Where the image can be fetched.
    pub image_url: String,
    /// Image bytes, when the download succeeded.
    pub image: Option<Vec<u8>>,
}

impl CaptchaPresentation {
    /// Pair a challenge with its image bytes, if they could be fetched.
    pub fn new(challenge: &CaptchaChallenge, image: Option<Vec<u8>>) -> Self {
        Self {
            challenge: challenge.challenge.clone(),
            image_url: challenge.captcha_url.clone(),
            image,
        }
    }
}

/// Errors raised while producing a captcha answer.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Solver I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Solver command '{command}' exited with {status}")]
    Command { command: String, status: String },

    #[error("Solver returned an empty answer")]
    EmptyAnswer,

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Produces an answer for a captcha challenge.
pub trait CaptchaSolver: Send + Sync {
    fn solve<'a>(
        &'a self,
        presentation: &'a CaptchaPresentation,
    ) -> BoxFuture<'a, Result<String, SolverError>>;
}
