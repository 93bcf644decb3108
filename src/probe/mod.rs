//! Remote content prober.
//!
//! Fetches each candidate path from the live host and fingerprints the body
//! with the repository's blob hashing scheme. Requests run in a bounded pool
//! with a minimum gap between request starts. Any failure (transport error,
//! timeout, non-2xx status) leaves the path out of the result.

pub mod digest;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ProbeConfig;
use crate::models::{CandidatePathSet, ObjectFormat, ProbeResult};
use crate::progress::{Phase, ProgressEvent, ProgressSink};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid host URL '{0}'")]
    InvalidHost(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no probed path returned content ({attempted} attempted)")]
    NoResponses { attempted: usize },

    #[error("probing cancelled")]
    Cancelled,
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Content retrieval from the live host.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, method: Method) -> Result<FetchResponse, ProbeError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(ProbeError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, method: Method) -> Result<FetchResponse, ProbeError> {
        let request_err = |source| ProbeError::Request {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(request_err)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(request_err)?;
        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Parse the host argument; a bare host name gets `https://`.
pub fn parse_host(host: &str) -> Result<Url, ProbeError> {
    let host = host.trim();
    let parsed = if host.contains("://") {
        Url::parse(host)
    } else {
        Url::parse(&format!("https://{host}"))
    };
    let url = parsed.map_err(|_| ProbeError::InvalidHost(host.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ProbeError::InvalidHost(host.to_string()));
    }
    Ok(url)
}

/// Join `path` onto the base URL's path.
///
/// Duplicate separators and `.` segments are collapsed; the base's query
/// and fragment are dropped.
pub fn build_probe_url(base: &Url, path: &str) -> Url {
    let kept: Vec<&str> = base.path().split('/').filter(|s| is_segment(s)).collect();
    let mut url = base.clone();
    url.set_path(&format!("/{}", kept.join("/")));
    url.set_query(None);
    url.set_fragment(None);
    // Repository paths are raw text; each segment is percent-encoded as a whole.
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(path.split('/').filter(|s| is_segment(s)));
    }
    url
}

fn is_segment(s: &str) -> bool {
    !s.is_empty() && s != "."
}

/// Enforces a minimum interval between request starts.
struct RateGate {
    delay: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl RateGate {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: tokio::sync::Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.delay).await;
        }
        *last = Some(Instant::now());
    }
}

/// Probe every candidate path and fingerprint successful responses.
///
/// Returns [`ProbeError::NoResponses`] when nothing could be fetched.
pub async fn probe_paths(
    fetcher: Arc<dyn Fetcher>,
    base: &Url,
    paths: &CandidatePathSet,
    format: ObjectFormat,
    config: &ProbeConfig,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<ProbeResult, ProbeError> {
    let total = paths.len();
    progress.emit(ProgressEvent::PhaseStarted {
        phase: Phase::Probe,
        total,
    });

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let gate = Arc::new(RateGate::new(config.delay()));
    let results: Arc<Mutex<ProbeResult>> = Arc::new(Mutex::new(ProbeResult::new()));
    let done = Arc::new(AtomicUsize::new(0));
    let mut join_set = JoinSet::new();

    for path in paths {
        let url = build_probe_url(base, path);
        let path = path.clone();
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let gate = Arc::clone(&gate);
        let results = Arc::clone(&results);
        let done = Arc::clone(&done);
        let progress = Arc::clone(&progress);

        join_set.spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            gate.wait().await;

            let ok = match fetcher.fetch(&url, Method::GET).await {
                Ok(resp) if resp.is_success() => {
                    let id = digest::blob_id(format, &resp.body);
                    results
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(path.clone(), id);
                    true
                }
                Ok(resp) => {
                    tracing::debug!(%url, status = resp.status, "probe rejected");
                    false
                }
                Err(e) => {
                    tracing::debug!(%url, error = %e, "probe failed");
                    false
                }
            };

            let done = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.emit(ProgressEvent::FileChecked {
                path,
                ok,
                done,
                total,
            });
        });
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                join_set.abort_all();
                return Err(ProbeError::Cancelled);
            }
            next = join_set.join_next() => match next {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) => tracing::warn!(error = %e, "probe task failed"),
            },
        }
    }

    let results = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));
    tracing::info!(attempted = total, matched = results.len(), "probing finished");
    if results.is_empty() {
        return Err(ProbeError::NoResponses { attempted: total });
    }
    Ok(results)
}

/// Canned responses keyed by full URL. Unknown URLs get a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, FetchResponse>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status: 200,
                body: body.into(),
            },
        );
        self
    }

    /// Serve an empty response with `status` at `url`.
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status,
                body: Vec::new(),
            },
        );
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url, _method: Method) -> Result<FetchResponse, ProbeError> {
        Ok(self
            .responses
            .get(url.as_str())
            .cloned()
            .unwrap_or(FetchResponse {
                status: 404,
                body: Vec::new(),
            }))
    }
}
