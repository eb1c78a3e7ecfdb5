//! End-to-end session tests over in-memory collaborators.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

use keepfetch::api::{
    ApiError, CaptchaChallenge, ExchangeOutcome, ExchangeRequest, FileDescriptor, HostingApi,
};
use keepfetch::captcha::{CaptchaPresentation, CaptchaSolver, SolverError};
use keepfetch::config::SessionConfig;
use keepfetch::proxy::{NetworkPath, ProxyCandidate, ReachabilityProbe, StaticProxySource};
use keepfetch::session::{Session, SessionError};
use keepfetch::transfer::{RangeBody, RangeClient, RangeResponse, TransferError};
use keepfetch::BoxFuture;

const URL: &str = "https://k2s.cc/file/abc123/movie.mkv";

struct FakeHost {
    descriptor: Result<FileDescriptor, ApiError>,
    exchange: ExchangeOutcome,
    exchange_paths: Mutex<Vec<NetworkPath>>,
    mint_paths: Mutex<Vec<NetworkPath>>,
}

impl FakeHost {
    fn serving(size: u64) -> Self {
        Self {
            descriptor: Ok(FileDescriptor {
                id: "abc123".into(),
                name: "movie.mkv".into(),
                size: Some(size),
                available: true,
            }),
            exchange: ExchangeOutcome::Key("free-key".into()),
            exchange_paths: Mutex::new(Vec::new()),
            mint_paths: Mutex::new(Vec::new()),
        }
    }
}

impl HostingApi for FakeHost {
    fn files_info<'a>(&'a self, _file_id: &'a str) -> BoxFuture<'a, Result<FileDescriptor, ApiError>> {
        Box::pin(async move { self.descriptor.clone() })
    }

    fn request_captcha(&self) -> BoxFuture<'_, Result<CaptchaChallenge, ApiError>> {
        Box::pin(async {
            Ok(CaptchaChallenge {
                challenge: "challenge".into(),
                captcha_url: "https://k2s.cc/captcha.png".into(),
            })
        })
    }

    fn captcha_image<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ApiError>> {
        Box::pin(async { Err(ApiError::Api("no image".into())) })
    }

    fn exchange<'a>(
        &'a self,
        _request: &'a ExchangeRequest,
        path: &'a NetworkPath,
    ) -> BoxFuture<'a, Result<ExchangeOutcome, ApiError>> {
        Box::pin(async move {
            self.exchange_paths.lock().push(path.clone());
            Ok(self.exchange.clone())
        })
    }

    fn mint_url<'a>(
        &'a self,
        _file_id: &'a str,
        _key: &'a str,
        path: &'a NetworkPath,
    ) -> BoxFuture<'a, Result<String, ApiError>> {
        Box::pin(async move {
            let mut paths = self.mint_paths.lock();
            paths.push(path.clone());
            Ok(format!("https://cdn.invalid/{}", paths.len()))
        })
    }
}

struct Answer;

impl CaptchaSolver for Answer {
    fn solve<'a>(&'a self, _p: &'a CaptchaPresentation) -> BoxFuture<'a, Result<String, SolverError>> {
        Box::pin(async { Ok("42".into()) })
    }
}

struct AcceptAll;

impl ReachabilityProbe for AcceptAll {
    fn probe<'a>(&'a self, _candidate: &'a ProxyCandidate) -> BoxFuture<'a, bool> {
        Box::pin(async { true })
    }
}

struct FakeCdn {
    data: Vec<u8>,
    requests: AtomicUsize,
    failing_starts: HashSet<u64>,
}

impl FakeCdn {
    fn new(size: usize) -> Self {
        Self {
            data: (0..size).map(|i| (i * 13 % 256) as u8).collect(),
            requests: AtomicUsize::new(0),
            failing_starts: HashSet::new(),
        }
    }
}

struct Body(Bytes);

impl RangeBody for Body {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransferError>> {
        Box::pin(async move {
            if self.0.is_empty() {
                Ok(None)
            } else {
                let n = self.0.len().min(16);
                Ok(Some(self.0.split_to(n)))
            }
        })
    }
}

impl RangeClient for FakeCdn {
    fn open_range<'a>(
        &'a self,
        _url: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, Result<RangeResponse, TransferError>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.failing_starts.contains(&start) {
                return Err(TransferError::Http { status: 403 });
            }
            let body = self.data[start as usize..=end as usize].to_vec();
            Ok(RangeResponse {
                status: 206,
                body: Box::new(Body(body.into())),
            })
        })
    }

    fn content_length<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Option<u64>, TransferError>> {
        Box::pin(async move { Ok(Some(self.data.len() as u64)) })
    }
}

fn config(dir: &Path) -> SessionConfig {
    SessionConfig::new()
        .with_output(dir.join("movie.mkv"))
        .with_work_dir(dir.join("tmp"))
        .with_proxy_file(dir.join("proxies.txt"))
        .with_chunk_size(30)
        .with_concurrency(2)
        .with_proxies(false)
}

fn session(config: SessionConfig, host: Arc<FakeHost>, cdn: Arc<FakeCdn>) -> Session {
    Session::new(config, host, Arc::new(Answer)).with_range_client(cdn)
}

#[tokio::test]
async fn test_full_download() {
    let temp = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::serving(100));
    let cdn = Arc::new(FakeCdn::new(100));

    let outcome = session(config(temp.path()), host.clone(), cdn.clone())
        .run(URL)
        .await
        .unwrap();

    assert_eq!(std::fs::read(temp.path().join("movie.mkv")).unwrap(), cdn.data);
    assert_eq!(outcome.total_size, 100);
    assert_eq!(outcome.assembly.bytes, 100);
    assert_eq!(outcome.fetch.completed, vec![0, 1, 2, 3]);
    assert_eq!(outcome.bound_path, NetworkPath::Direct);
    assert_eq!(cdn.requests.load(Ordering::SeqCst), 4);
    assert_eq!(host.mint_paths.lock().len(), 2);

    // Parts are consumed by assembly.
    let leftover = std::fs::read_dir(temp.path().join("tmp")).unwrap().count();
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_all_parts_present_skips_network() {
    let temp = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::serving(100));
    let cdn = Arc::new(FakeCdn::new(100));

    let tmp = temp.path().join("tmp");
    std::fs::create_dir_all(&tmp).unwrap();
    for (i, part) in cdn.data.chunks(30).enumerate() {
        std::fs::write(tmp.join(format!("movie.mkv.part{:03}", i)), part).unwrap();
    }

    let outcome = session(config(temp.path()), host, cdn.clone())
        .run(URL)
        .await
        .unwrap();

    assert_eq!(cdn.requests.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.fetch.resumed, vec![0, 1, 2, 3]);
    assert_eq!(std::fs::read(temp.path().join("movie.mkv")).unwrap(), cdn.data);
}

#[tokio::test]
async fn test_file_not_found_is_not_available() {
    let temp = TempDir::new().unwrap();
    let mut host = FakeHost::serving(100);
    host.descriptor = Err(ApiError::Api("File not found".into()));

    let err = session(config(temp.path()), Arc::new(host), Arc::new(FakeCdn::new(100)))
        .run(URL)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::NotAvailable(id) if id == "abc123"));
}

#[tokio::test]
async fn test_unavailable_file() {
    let temp = TempDir::new().unwrap();
    let mut host = FakeHost::serving(100);
    if let Ok(file) = host.descriptor.as_mut() {
        file.available = false;
    }
    let host = Arc::new(host);

    let err = session(config(temp.path()), host.clone(), Arc::new(FakeCdn::new(100)))
        .run(URL)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::NotAvailable(_)));
    assert!(host.exchange_paths.lock().is_empty());
}

#[tokio::test]
async fn test_invalid_url() {
    let temp = TempDir::new().unwrap();
    let err = session(
        config(temp.path()),
        Arc::new(FakeHost::serving(1)),
        Arc::new(FakeCdn::new(1)),
    )
    .run("https://example.com/nothing here")
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::InvalidUrl(_)));
}

#[tokio::test]
async fn test_size_from_head_when_not_reported() {
    let temp = TempDir::new().unwrap();
    let mut host = FakeHost::serving(0);
    if let Ok(file) = host.descriptor.as_mut() {
        file.size = None;
    }
    let cdn = Arc::new(FakeCdn::new(70));

    let outcome = session(config(temp.path()), Arc::new(host), cdn.clone())
        .run(URL)
        .await
        .unwrap();

    assert_eq!(outcome.total_size, 70);
    assert_eq!(std::fs::read(temp.path().join("movie.mkv")).unwrap(), cdn.data);
}

#[tokio::test]
async fn test_failed_chunk_blocks_assembly_then_resumes() {
    let temp = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::serving(100));
    let mut broken = FakeCdn::new(100);
    broken.failing_starts.insert(30);

    let err = session(config(temp.path()), host.clone(), Arc::new(broken))
        .run(URL)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::ChunksFailed { ref ids } if ids == &vec![1]));
    assert!(!temp.path().join("movie.mkv").exists());

    // Second run only fetches the missing chunk.
    let cdn = Arc::new(FakeCdn::new(100));
    let outcome = session(config(temp.path()), host, cdn.clone())
        .run(URL)
        .await
        .unwrap();

    assert_eq!(cdn.requests.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.fetch.completed, vec![1]);
    assert_eq!(outcome.fetch.resumed, vec![0, 2, 3]);
    assert_eq!(std::fs::read(temp.path().join("movie.mkv")).unwrap(), cdn.data);
}

#[tokio::test]
async fn test_proxies_refreshed_and_bound() {
    let temp = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::serving(50));
    let cdn = Arc::new(FakeCdn::new(50));
    let source = StaticProxySource::new(vec!["10.1.1.1:8080".into(), "10.1.1.1:8080".into()]);

    let outcome = Session::new(
        config(temp.path()).with_proxies(true),
        host.clone(),
        Arc::new(Answer),
    )
    .with_range_client(cdn)
    .with_proxy_source(Arc::new(source))
    .with_probe(Arc::new(AcceptAll))
    .run(URL)
    .await
    .unwrap();

    let proxy = NetworkPath::Proxy("10.1.1.1:8080".into());
    assert_eq!(outcome.bound_path, proxy);
    assert_eq!(*host.exchange_paths.lock(), vec![proxy.clone()]);
    assert!(host.mint_paths.lock().iter().all(|p| *p == proxy));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("proxies.txt")).unwrap(),
        "10.1.1.1:8080"
    );
}
