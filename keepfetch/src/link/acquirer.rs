//! Captcha-to-URL state machine.
//!
//! ```text
//! RequestChallenge ──► AwaitSolution ──► Exchange ──┬──► KeyAcquired
//!        ▲                                          │
//!        └────────── invalid answer ◄───────────────┤
//!                                                   └──► Wait ──► KeyAcquired
//! ```
//!
//! One solved challenge is carried across the candidate walk; only a rejected
//! answer asks for a new one, retried on the same candidate. Candidates are
//! tried one at a time; a candidate that errors or demands a wait above the
//! ceiling is abandoned for the next one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::LinkError;
use super::key::{AcquiredLinks, DownloadKey, Grant};
use crate::api::{ExchangeOutcome, ExchangeRequest, HostingApi};
use crate::captcha::{CaptchaPresentation, CaptchaSolver};
use crate::proxy::{NetworkPath, ProxyCandidate};

/// Longest server-imposed wait that is served instead of skipped.
pub const DEFAULT_WAIT_CEILING: Duration = Duration::from_secs(60);

/// Rejected captcha answers tolerated per acquisition.
pub const DEFAULT_MAX_CHALLENGE_ATTEMPTS: u32 = 5;

/// Link acquisition limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Waits longer than this skip the candidate.
    pub wait_ceiling: Duration,
    /// Rejected answers allowed before giving up.
    pub max_challenge_attempts: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            wait_ceiling: DEFAULT_WAIT_CEILING,
            max_challenge_attempts: DEFAULT_MAX_CHALLENGE_ATTEMPTS,
        }
    }
}

/// Per-path state of the acquisition machine.
#[derive(Debug, Clone)]
pub enum LinkState {
    RequestChallenge,
    AwaitSolution(CaptchaPresentation),
    Exchange(ExchangeRequest),
    Wait { duration: Duration, key: String },
    KeyAcquired(DownloadKey),
}

impl LinkState {
    /// Short snake_case name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::RequestChallenge => "request_challenge",
            LinkState::AwaitSolution(_) => "await_solution",
            LinkState::Exchange(_) => "exchange",
            LinkState::Wait { .. } => "wait",
            LinkState::KeyAcquired(_) => "key_acquired",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drives the challenge/exchange/wait protocol to a bound key and URLs.
pub struct LinkAcquirer {
    api: Arc<dyn HostingApi>,
    solver: Arc<dyn CaptchaSolver>,
    config: AcquisitionConfig,
}

impl LinkAcquirer {
    /// Create an acquirer over `api`, asking `solver` for captcha answers.
    pub fn new(
        api: Arc<dyn HostingApi>,
        solver: Arc<dyn CaptchaSolver>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            api,
            solver,
            config,
        }
    }

    /// Acquire a key and mint `count` URLs with it.
    pub async fn acquire(
        &self,
        file_id: &str,
        candidates: &[ProxyCandidate],
        count: usize,
    ) -> Result<AcquiredLinks, LinkError> {
        let key = self.acquire_key(file_id, candidates).await?;
        let urls = self.generate_urls(file_id, &key, count).await?;
        Ok(AcquiredLinks { key, urls })
    }

    /// Walk the candidates in order until one yields a bound key.
    ///
    /// The captcha is solved once up front and the answer reused for every
    /// candidate. An empty candidate list makes a single direct attempt.
    pub async fn acquire_key(
        &self,
        file_id: &str,
        candidates: &[ProxyCandidate],
    ) -> Result<DownloadKey, LinkError> {
        let paths = NetworkPath::from_candidates(candidates);
        let mut rejected = 0u32;

        let presentation = self.present_challenge().await?;
        let mut current = self.solve(file_id, presentation).await?;

        for (position, path) in paths.iter().enumerate() {
            tracing::info!(path = %path, position, total = paths.len(), "Trying network path");

            match self.run_path(file_id, path, &mut current, &mut rejected).await? {
                Some(key) => {
                    tracing::info!(path = %key.path, wait = ?key.wait, "Download key acquired");
                    return Ok(key);
                }
                None => continue,
            }
        }

        Err(LinkError::ExhaustedCandidates)
    }

    /// Run the machine on one path, starting from the exchange of `current`.
    ///
    /// A rejected answer replaces `current` with a freshly solved challenge.
    /// `Ok(None)` means advance to the next path.
    async fn run_path(
        &self,
        file_id: &str,
        path: &NetworkPath,
        current: &mut ExchangeRequest,
        rejected: &mut u32,
    ) -> Result<Option<DownloadKey>, LinkError> {
        let mut state = LinkState::Exchange(current.clone());

        loop {
            tracing::trace!(path = %path, state = %state, "Link state");

            state = match state {
                LinkState::RequestChallenge => LinkState::AwaitSolution(self.present_challenge().await?),

                LinkState::AwaitSolution(presentation) => {
                    let request = self.solve(file_id, presentation).await?;
                    *current = request.clone();
                    LinkState::Exchange(request)
                }

                LinkState::Exchange(request) => {
                    let outcome = match self.api.exchange(&request, path).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::warn!(path = %path, error = %e, "Exchange failed, advancing");
                            return Ok(None);
                        }
                    };

                    match outcome {
                        ExchangeOutcome::InvalidCaptcha => {
                            *rejected += 1;
                            if *rejected >= self.config.max_challenge_attempts {
                                return Err(LinkError::InvalidChallengeExhausted {
                                    attempts: *rejected,
                                });
                            }
                            tracing::warn!(attempt = *rejected, "Captcha rejected, requesting a new one");
                            LinkState::RequestChallenge
                        }
                        ExchangeOutcome::FileNotFound => return Err(LinkError::NotAvailable),
                        ExchangeOutcome::Error(message) => {
                            tracing::warn!(path = %path, message = %message, "API error, advancing");
                            return Ok(None);
                        }
                        ExchangeOutcome::Wait { seconds, key } => {
                            let duration = Duration::from_secs(seconds);
                            if duration > self.config.wait_ceiling {
                                tracing::info!(
                                    path = %path,
                                    wait_secs = seconds,
                                    ceiling_secs = self.config.wait_ceiling.as_secs(),
                                    "Wait exceeds ceiling, skipping"
                                );
                                return Ok(None);
                            }
                            match key {
                                Some(key) => LinkState::Wait { duration, key },
                                None => {
                                    tracing::warn!(path = %path, "Wait response carried no key, advancing");
                                    return Ok(None);
                                }
                            }
                        }
                        ExchangeOutcome::Url(url) => {
                            LinkState::KeyAcquired(DownloadKey::new(Grant::Url(url), path.clone()))
                        }
                        ExchangeOutcome::Key(key) => {
                            LinkState::KeyAcquired(DownloadKey::new(Grant::Key(key), path.clone()))
                        }
                    }
                }

                LinkState::Wait { duration, key } => {
                    tracing::info!(path = %path, wait_secs = duration.as_secs(), "Waiting before key becomes valid");
                    tokio::time::sleep(duration).await;
                    LinkState::KeyAcquired(
                        DownloadKey::new(Grant::Key(key), path.clone()).with_wait(duration),
                    )
                }

                LinkState::KeyAcquired(key) => return Ok(Some(key)),
            };
        }
    }

    async fn solve(
        &self,
        file_id: &str,
        presentation: CaptchaPresentation,
    ) -> Result<ExchangeRequest, LinkError> {
        let response = self.solver.solve(&presentation).await?;
        Ok(ExchangeRequest {
            file_id: file_id.to_string(),
            challenge: presentation.challenge,
            response,
        })
    }

    async fn present_challenge(&self) -> Result<CaptchaPresentation, LinkError> {
        let challenge = self.api.request_captcha().await?;

        let image = match self.api.captcha_image(&challenge.captcha_url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url = %challenge.captcha_url, error = %e, "Could not fetch captcha image");
                None
            }
        };

        Ok(CaptchaPresentation::new(&challenge, image))
    }

    /// Mint up to `count` URLs over the key's bound path.
    ///
    /// Individual failures are logged and skipped; only zero URLs is an error.
    /// A URL grant yields exactly that URL.
    pub async fn generate_urls(
        &self,
        file_id: &str,
        key: &DownloadKey,
        count: usize,
    ) -> Result<Vec<String>, LinkError> {
        let token = match &key.grant {
            Grant::Url(url) => return Ok(vec![url.clone()]),
            Grant::Key(token) => token,
        };

        let count = count.max(1);
        let mut urls = Vec::with_capacity(count);

        for index in 0..count {
            match self.api.mint_url(file_id, token, &key.path).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    tracing::warn!(index, path = %key.path, error = %e, "Failed to generate download URL");
                }
            }
        }

        if urls.is_empty() {
            return Err(LinkError::NoLinks);
        }

        tracing::info!(generated = urls.len(), requested = count, "Download URLs generated");
        Ok(urls)
    }
}
