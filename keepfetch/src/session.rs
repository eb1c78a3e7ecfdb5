//! Download session orchestration.
//!
//! A [`Session`] runs one download end to end:
//!
//! 1. extract the file id and look the file up
//! 2. load (and if needed refresh) the proxy pool
//! 3. acquire a bound key and mint URLs
//! 4. determine the size and plan chunks
//! 5. fetch chunks into part files
//! 6. assemble the output
//!
//! File-info and link failures abort at once. Chunk failures are collected
//! and reported together; a rerun resumes from the part files left behind.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::api::{
    extract_file_id, ApiError, FileDescriptor, HostingApi, MSG_FILE_NOT_FOUND, UNKNOWN_FILE_NAME,
};
use crate::captcha::CaptchaSolver;
use crate::config::{format_size, SessionConfig};
use crate::link::{AcquiredLinks, LinkAcquirer, LinkError};
use crate::proxy::{
    HttpProbe, HttpProxySource, NetworkPath, ProxyCandidate, ProxyError, ProxyPool, ProxySource,
    ReachabilityProbe,
};
use crate::transfer::{
    plan_chunks, Assembler, AssemblyError, AssemblyOptions, AssemblyReport, ChunkFetcher,
    DownloadSession, FetchReport, PartLayout, PlanError, ProgressCallback, ProgressReporter,
    RangeClient, ReqwestRangeClient, TransferError, DEFAULT_POLL_INTERVAL,
};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid file URL: {0}")]
    InvalidUrl(String),

    #[error("File {0} is not available")]
    NotAvailable(String),

    #[error("Error getting file info: {0}")]
    Api(#[from] ApiError),

    #[error("Error generating links: {0}")]
    Link(#[from] LinkError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Could not determine file size")]
    UnknownSize,

    #[error("{} chunk(s) failed: {ids:?}", .ids.len())]
    ChunksFailed { ids: Vec<usize> },

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("Transfer setup failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result of a successful session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub file: FileDescriptor,
    pub total_size: u64,
    /// Path the download key was bound to.
    pub bound_path: NetworkPath,
    pub fetch: FetchReport,
    pub assembly: AssemblyReport,
}

/// One end-to-end download.
pub struct Session {
    config: SessionConfig,
    api: Arc<dyn HostingApi>,
    solver: Arc<dyn CaptchaSolver>,
    range_client: Option<Arc<dyn RangeClient>>,
    proxy_source: Option<Arc<dyn ProxySource>>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl Session {
    /// Create a session with default proxy, probe and transfer collaborators.
    pub fn new(
        config: SessionConfig,
        api: Arc<dyn HostingApi>,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Self {
        Self {
            config,
            api,
            solver,
            range_client: None,
            proxy_source: None,
            probe: None,
            on_progress: None,
        }
    }

    /// Use this client for chunk transfers instead of building one for the
    /// bound path.
    pub fn with_range_client(mut self, client: Arc<dyn RangeClient>) -> Self {
        self.range_client = Some(client);
        self
    }

    /// Use this source when refreshing proxies.
    pub fn with_proxy_source(mut self, source: Arc<dyn ProxySource>) -> Self {
        self.proxy_source = Some(source);
        self
    }

    /// Use this probe when validating proxies.
    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Report transfer progress through `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Download the file behind `url`.
    pub async fn run(&self, url: &str) -> Result<SessionOutcome, SessionError> {
        let file_id =
            extract_file_id(url).ok_or_else(|| SessionError::InvalidUrl(url.to_string()))?;
        tracing::info!(file_id = %file_id, "Initializing download");

        let file = self.file_info(&file_id).await?;
        let output = self.output_path(&file);
        tracing::info!(name = %file.name, output = %output.display(), "Target file");

        let candidates = self.prepare_proxies().await?;

        let acquirer = LinkAcquirer::new(
            Arc::clone(&self.api),
            Arc::clone(&self.solver),
            self.config.acquisition.clone(),
        );
        let AcquiredLinks { key, urls } = acquirer
            .acquire(&file_id, &candidates, self.config.concurrency)
            .await
            .map_err(|e| match e {
                LinkError::NotAvailable => SessionError::NotAvailable(file_id.clone()),
                other => SessionError::Link(other),
            })?;

        let client = self.range_client_for(&key.path)?;
        let total_size = self.total_size(&file, client.as_ref(), &urls).await?;
        tracing::info!(
            size = %format_size(total_size),
            chunk_size = %format_size(self.config.chunk_size),
            "File size determined"
        );

        let stem = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN_FILE_NAME.to_string());
        let layout = PartLayout::new(&self.config.work_dir, stem);
        let chunks = plan_chunks(total_size, self.config.chunk_size, &layout)?;
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        let mut download = DownloadSession::new(file, total_size, chunks, urls);
        let fetch = self.fetch(client, &mut download).await;

        if !fetch.is_complete() {
            return Err(SessionError::ChunksFailed {
                ids: fetch.failed.clone(),
            });
        }

        let assembly = self.assemble(&download, output).await?;

        Ok(SessionOutcome {
            file: download.file,
            total_size,
            bound_path: key.path,
            fetch,
            assembly,
        })
    }

    async fn file_info(&self, file_id: &str) -> Result<FileDescriptor, SessionError> {
        let file = self.api.files_info(file_id).await.map_err(|e| match e {
            ApiError::Api(ref message) if message == MSG_FILE_NOT_FOUND => {
                SessionError::NotAvailable(file_id.to_string())
            }
            other => SessionError::Api(other),
        })?;

        if !file.available {
            return Err(SessionError::NotAvailable(file_id.to_string()));
        }
        Ok(file)
    }

    fn output_path(&self, file: &FileDescriptor) -> PathBuf {
        match &self.config.output {
            Some(path) => path.clone(),
            None => PathBuf::from(sanitize_file_name(&file.name)),
        }
    }

    /// Confirmed candidates to try, or none for a direct attempt.
    async fn prepare_proxies(&self) -> Result<Vec<ProxyCandidate>, SessionError> {
        if !self.config.use_proxies {
            tracing::info!("Proxies disabled, using direct connection");
            return Ok(Vec::new());
        }

        let pool = ProxyPool::load(&self.config.proxy_file, self.config.validation.clone())?;

        if self.config.refresh_proxies || pool.is_empty() {
            tracing::info!("Fetching new proxies");
            let source: Arc<dyn ProxySource> = match &self.proxy_source {
                Some(source) => Arc::clone(source),
                None => Arc::new(HttpProxySource::new(
                    self.config.proxy_sources.clone(),
                    self.config.request_timeout,
                )?),
            };
            let probe: Arc<dyn ReachabilityProbe> = match &self.probe {
                Some(probe) => Arc::clone(probe),
                None => Arc::new(HttpProbe::new(
                    self.config.validation.probe_endpoint.clone(),
                    self.config.validation.probe_timeout,
                )),
            };

            if let Err(e) = pool.refresh(source.as_ref(), probe).await {
                tracing::warn!(error = %e, "Proxy refresh failed, continuing with current list");
            }
        } else {
            tracing::info!(count = pool.len(), "Using existing proxies");
        }

        Ok(pool.get_all().to_vec())
    }

    fn range_client_for(&self, bound: &NetworkPath) -> Result<Arc<dyn RangeClient>, SessionError> {
        if let Some(client) = &self.range_client {
            return Ok(Arc::clone(client));
        }
        let path = if self.config.transfer_via_bound_path {
            bound.clone()
        } else {
            NetworkPath::Direct
        };
        tracing::debug!(path = %path, "Transfer path");
        Ok(Arc::new(ReqwestRangeClient::new(
            &path,
            self.config.request_timeout,
        )?))
    }

    /// Size from the descriptor, falling back to a HEAD on the first URL.
    async fn total_size(
        &self,
        file: &FileDescriptor,
        client: &dyn RangeClient,
        urls: &[String],
    ) -> Result<u64, SessionError> {
        if let Some(size) = file.size.filter(|s| *s > 0) {
            return Ok(size);
        }

        let Some(first) = urls.first() else {
            return Err(SessionError::UnknownSize);
        };
        match client.content_length(first).await {
            Ok(Some(size)) if size > 0 => Ok(size),
            Ok(_) => Err(SessionError::UnknownSize),
            Err(e) => {
                tracing::warn!(error = %e, "HEAD request failed");
                Err(SessionError::UnknownSize)
            }
        }
    }

    async fn fetch(&self, client: Arc<dyn RangeClient>, download: &mut DownloadSession) -> FetchReport {
        let fetcher = ChunkFetcher::new(client, self.config.retry.clone(), self.config.concurrency);

        let reporter = self.on_progress.as_ref().map(|callback| {
            ProgressReporter::start(
                Arc::clone(&download.progress),
                download.total_size,
                download.total_chunks(),
                Arc::clone(callback),
                DEFAULT_POLL_INTERVAL,
            )
        });

        let report = fetcher.fetch(download).await;

        if let Some(reporter) = reporter {
            reporter.stop();
        }
        report
    }

    async fn assemble(
        &self,
        download: &DownloadSession,
        output: PathBuf,
    ) -> Result<AssemblyReport, SessionError> {
        let assembler = Assembler::new(AssemblyOptions {
            keep_parts: self.config.keep_parts,
        });
        let chunks = download.chunks.clone();

        let report = tokio::task::spawn_blocking(move || assembler.assemble(&chunks, &output))
            .await
            .map_err(|e| io::Error::other(e.to_string()))??;
        Ok(report)
    }
}

/// Make an API-supplied name safe to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => UNKNOWN_FILE_NAME.to_string(),
        _ => cleaned,
    }
}
