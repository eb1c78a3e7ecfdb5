//! Hosting API client abstraction.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::ApiError;
use super::types::{
    CaptchaChallenge, ExchangeOutcome, ExchangeRequest, FileDescriptor, FilesInfoRequest,
    MintRequest, RawFilesInfo, RawUrlResponse,
};
use crate::proxy::NetworkPath;
use crate::BoxFuture;

/// Default API root.
pub const DEFAULT_API_BASE: &str = "https://k2s.cc/api/v2";

/// Operations of the hosting API used by a download session.
///
/// Every method that takes a [`NetworkPath`] must send its request over that
/// path (direct or through the named proxy); the server ties wait timers and
/// download keys to the client address it sees.
pub trait HostingApi: Send + Sync {
    /// Look up a file's metadata (`getFilesInfo`).
    fn files_info<'a>(&'a self, file_id: &'a str)
        -> BoxFuture<'a, Result<FileDescriptor, ApiError>>;

    /// Ask for a fresh captcha challenge (`requestCaptcha`).
    fn request_captcha(&self) -> BoxFuture<'_, Result<CaptchaChallenge, ApiError>>;

    /// Download the captcha image.
    fn captcha_image<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ApiError>>;

    /// Exchange a solved captcha for a key or URL (`getUrl`).
    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
        path: &'a NetworkPath,
    ) -> BoxFuture<'a, Result<ExchangeOutcome, ApiError>>;

    /// Mint a download URL from a bound key (`getUrl` with `free_download_key`).
    fn mint_url<'a>(
        &'a self,
        file_id: &'a str,
        key: &'a str,
        path: &'a NetworkPath,
    ) -> BoxFuture<'a, Result<String, ApiError>>;
}

/// Hosting API client over reqwest.
///
/// Keeps one `reqwest::Client` per network path so repeated calls over the
/// same proxy reuse its connection pool.
pub struct ReqwestHostingApi {
    base_url: String,
    timeout: Duration,
    clients: Mutex<HashMap<NetworkPath, reqwest::Client>>,
}

impl ReqwestHostingApi {
    /// Create a client against [`DEFAULT_API_BASE`].
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_API_BASE, timeout)
    }

    /// Create a client against a custom API root.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, path: &NetworkPath) -> Result<reqwest::Client, ApiError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(path) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(proxy_url) = path.proxy_url() {
            let proxy = reqwest::Proxy::all(&proxy_url)
                .map_err(|_| ApiError::InvalidProxy(path.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| ApiError::Transport {
            endpoint: "client".to_string(),
            reason: e.to_string(),
        })?;

        clients.insert(path.clone(), client.clone());
        Ok(client)
    }

    async fn post_json<B, T>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        path: &NetworkPath,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let client = self.client_for(path)?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut request = client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        tracing::debug!(endpoint, %status, path = %path, "API response");

        response.json::<T>().await.map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: format!("HTTP {}: {}", status, e),
        })
    }
}

impl HostingApi for ReqwestHostingApi {
    fn files_info<'a>(
        &'a self,
        file_id: &'a str,
    ) -> BoxFuture<'a, Result<FileDescriptor, ApiError>> {
        Box::pin(async move {
            let body = FilesInfoRequest { ids: [file_id] };
            let raw: RawFilesInfo = self
                .post_json("getFilesInfo", Some(&body), &NetworkPath::Direct)
                .await?;
            raw.into_descriptor(file_id).map_err(ApiError::Api)
        })
    }

    fn request_captcha(&self) -> BoxFuture<'_, Result<CaptchaChallenge, ApiError>> {
        Box::pin(async move {
            self.post_json::<(), _>("requestCaptcha", None, &NetworkPath::Direct)
                .await
        })
    }

    fn captcha_image<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ApiError>> {
        Box::pin(async move {
            let client = self.client_for(&NetworkPath::Direct)?;
            let transport = |e: reqwest::Error| ApiError::Transport {
                endpoint: "captcha image".to_string(),
                reason: e.to_string(),
            };

            let response = client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(transport)?;
            let bytes = response.bytes().await.map_err(transport)?;
            Ok(bytes.to_vec())
        })
    }

    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
        path: &'a NetworkPath,
    ) -> BoxFuture<'a, Result<ExchangeOutcome, ApiError>> {
        Box::pin(async move {
            let raw: RawUrlResponse = self.post_json("getUrl", Some(request), path).await?;
            Ok(raw.into_outcome())
        })
    }

    fn mint_url<'a>(
        &'a self,
        file_id: &'a str,
        key: &'a str,
        path: &'a NetworkPath,
    ) -> BoxFuture<'a, Result<String, ApiError>> {
        Box::pin(async move {
            let body = MintRequest {
                file_id,
                free_download_key: key,
            };
            let raw: RawUrlResponse = self.post_json("getUrl", Some(&body), path).await?;
            raw.into_url().map_err(ApiError::Api)
        })
    }
}
