//! Concurrent chunk fetcher.
//!
//! Each chunk is handled by one task; at most `concurrency` run at once.
//! A task first checks the part file (a part of the expected size is reused
//! without any network access), then streams the ranged body into the part
//! file, retrying according to the [`RetryPolicy`].

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::http::{RangeBody, RangeClient, TransferError};
use super::plan::{part_len, ChunkDescriptor, ChunkState};
use super::progress::ProgressCounter;
use super::retry::RetryPolicy;
use super::state::DownloadSession;

/// HTTP status for a satisfied range request.
const PARTIAL_CONTENT: u16 = 206;
const OK: u16 = 200;

/// Outcome of a fetch pass, by chunk id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Fetched over the network in this pass.
    pub completed: Vec<usize>,
    /// Already on disk with the expected size.
    pub resumed: Vec<usize>,
    /// Gave up after retries or a non-retryable error.
    pub failed: Vec<usize>,
}

impl FetchReport {
    /// True when no chunk failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// URL for chunk `id`: round-robin over the set.
pub fn select_url(urls: &[String], id: usize) -> Option<&str> {
    if urls.is_empty() {
        return None;
    }
    Some(urls[id % urls.len()].as_str())
}

enum ChunkOutcome {
    Resumed,
    Fetched,
    Failed,
}

/// Fetches all chunks of a [`DownloadSession`] into their part files.
pub struct ChunkFetcher {
    client: Arc<dyn RangeClient>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl ChunkFetcher {
    /// Fetch through `client`, at most `concurrency` chunks at once.
    pub fn new(client: Arc<dyn RangeClient>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            client,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one pass over every chunk not yet complete.
    ///
    /// Chunk states in `session` are updated; a failed chunk never affects
    /// its siblings.
    pub async fn fetch(&self, session: &mut DownloadSession) -> FetchReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        tracing::info!(
            chunks = session.chunks.len(),
            urls = session.urls.len(),
            concurrency = self.concurrency,
            "Starting chunk transfer"
        );

        for chunk in session.chunks.iter_mut() {
            if chunk.state == ChunkState::Complete {
                continue;
            }
            chunk.state = ChunkState::Fetching;

            let chunk = chunk.clone();
            let whole_file = chunk.start == 0 && chunk.end + 1 == session.total_size;
            let semaphore = Arc::clone(&semaphore);
            let client = Arc::clone(&self.client);
            let urls = Arc::clone(&session.urls);
            let progress = Arc::clone(&session.progress);
            let policy = self.policy.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (chunk.id, ChunkOutcome::Failed),
                };

                if chunk.is_present() {
                    tracing::debug!(chunk = chunk.id, "Part file present, skipping");
                    progress.add_bytes(chunk.expected_size());
                    progress.chunk_complete();
                    return (chunk.id, ChunkOutcome::Resumed);
                }

                let Some(url) = select_url(&urls, chunk.id) else {
                    tracing::error!(chunk = chunk.id, "No download URL available");
                    return (chunk.id, ChunkOutcome::Failed);
                };

                let job = ChunkJob {
                    client: client.as_ref(),
                    chunk: &chunk,
                    url,
                    whole_file,
                    progress: &progress,
                };
                match job.run(&policy).await {
                    Ok(()) => {
                        progress.chunk_complete();
                        (chunk.id, ChunkOutcome::Fetched)
                    }
                    Err(_) => (chunk.id, ChunkOutcome::Failed),
                }
            });
        }

        let mut report = FetchReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Chunk task aborted");
                    continue;
                }
            };

            let state = match outcome {
                ChunkOutcome::Resumed => {
                    report.resumed.push(id);
                    ChunkState::Complete
                }
                ChunkOutcome::Fetched => {
                    report.completed.push(id);
                    ChunkState::Complete
                }
                ChunkOutcome::Failed => {
                    report.failed.push(id);
                    ChunkState::Failed
                }
            };
            if let Some(chunk) = session.chunks.get_mut(id) {
                chunk.state = state;
            }
        }

        // A task that panicked never reported back.
        for chunk in session.chunks.iter_mut() {
            if chunk.state == ChunkState::Fetching {
                chunk.state = ChunkState::Failed;
                report.failed.push(chunk.id);
            }
        }

        report.completed.sort_unstable();
        report.resumed.sort_unstable();
        report.failed.sort_unstable();

        tracing::info!(
            fetched = report.completed.len(),
            resumed = report.resumed.len(),
            failed = report.failed.len(),
            "Chunk transfer finished"
        );
        report
    }
}

/// One chunk's transfer with retries.
struct ChunkJob<'a> {
    client: &'a dyn RangeClient,
    chunk: &'a ChunkDescriptor,
    url: &'a str,
    whole_file: bool,
    progress: &'a ProgressCounter,
}

impl ChunkJob<'_> {
    async fn run(&self, policy: &RetryPolicy) -> Result<(), TransferError> {
        let mut attempt = 1;
        loop {
            match self.attempt().await {
                Ok(bytes) => {
                    tracing::debug!(chunk = self.chunk.id, bytes, attempt, "Chunk complete");
                    return Ok(());
                }
                Err(e) => match policy.delay_for(attempt, &e) {
                    Some(delay) => {
                        tracing::warn!(
                            chunk = self.chunk.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Chunk attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        tracing::error!(
                            chunk = self.chunk.id,
                            attempts = attempt,
                            error = %e,
                            "Chunk exhausted"
                        );
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn attempt(&self) -> Result<u64, TransferError> {
        let chunk = self.chunk;
        let mut response = self.client.open_range(self.url, chunk.start, chunk.end).await?;

        let accepted =
            response.status == PARTIAL_CONTENT || (self.whole_file && response.status == OK);
        if !accepted {
            return Err(TransferError::RangeIgnored {
                status: response.status,
            });
        }

        if let Some(parent) = chunk.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(&chunk.path).await?;

        let mut written = 0u64;
        let result = self
            .stream_body(response.body.as_mut(), &mut file, &mut written)
            .await;

        if let Err(e) = result {
            self.progress.sub_bytes(written);
            discard_part(&chunk.path).await;
            return Err(e);
        }
        Ok(written)
    }

    /// Copy the body into `file`, counting bytes into `written` as they land.
    async fn stream_body(
        &self,
        body: &mut dyn RangeBody,
        file: &mut File,
        written: &mut u64,
    ) -> Result<(), TransferError> {
        let expected = self.chunk.expected_size();

        while let Some(bytes) = body.next_chunk().await? {
            let len = bytes.len() as u64;
            if *written + len > expected {
                return Err(TransferError::Overflow { expected });
            }
            file.write_all(&bytes).await?;
            *written += len;
            self.progress.add_bytes(len);
        }

        if *written < expected {
            return Err(TransferError::ShortBody {
                expected,
                received: *written,
            });
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

async fn discard_part(path: &Path) {
    if part_len(path).is_some() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), error = %e, "Could not remove partial part file");
        }
    }
}
