//! The deployment-fingerprinting pipeline.
//!
//! [`Engine`] drives collection → probing → resolution → estimation over an
//! explicitly owned repository handle. The free functions
//! [`estimate_deployment`] and [`collect_candidate_paths`] open the
//! repository from a URI, run the engine, and release the handle.

use std::sync::Arc;

use reqwest::Url;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::estimate::{self, EstimateError};
use crate::filter::{FilterError, PathFilter};
use crate::history::{self, CommitWalk, HistoryError};
use crate::models::{CandidatePathSet, DeploymentEstimate};
use crate::probe::{self, Fetcher, HttpFetcher, ProbeError};
use crate::progress::{NoProgress, ProgressSink};
use crate::repo::git::GitRepository;
use crate::repo::mirror::open_or_clone;
use crate::repo::{RepoError, Repository};
use crate::resolver::{self, ResolveError};

/// Revision whose history the resolver and estimator walk.
const DEFAULT_REV: &str = "HEAD";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Probe(ProbeError),

    /// Nothing live matched history. Reported, not a failure.
    #[error("no deployment match found: {probed} path(s) responded but none matched any commit")]
    NoDeploymentMatch { probed: usize },

    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether this is the "no match" domain outcome rather than a fault.
    pub fn is_no_match(&self) -> bool {
        matches!(self, EngineError::NoDeploymentMatch { .. })
    }
}

impl From<HistoryError> for EngineError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::Repo(e) => EngineError::Repo(e),
            HistoryError::Cancelled => EngineError::Cancelled,
        }
    }
}

impl From<ProbeError> for EngineError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Cancelled => EngineError::Cancelled,
            other => EngineError::Probe(other),
        }
    }
}

impl From<ResolveError> for EngineError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Cancelled => EngineError::Cancelled,
        }
    }
}

impl From<EstimateError> for EngineError {
    fn from(e: EstimateError) -> Self {
        match e {
            EstimateError::NoDeploymentMatch { probed } => {
                EngineError::NoDeploymentMatch { probed }
            }
            EstimateError::Repo(e) => EngineError::Repo(e),
            EstimateError::Cancelled => EngineError::Cancelled,
        }
    }
}

/// Runs the pipeline against one repository and one fetcher.
pub struct Engine {
    repo: Arc<dyn Repository>,
    fetcher: Arc<dyn Fetcher>,
    config: Config,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(repo: Arc<dyn Repository>, fetcher: Arc<dyn Fetcher>, config: Config) -> Self {
        Self {
            repo,
            fetcher,
            config,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn filter(&self) -> Result<PathFilter, FilterError> {
        PathFilter::new(&self.config.patterns.include)
    }

    /// Walk every branch and return the filtered candidate paths.
    pub async fn collect_candidate_paths(&self) -> Result<CandidatePathSet, EngineError> {
        let filter = self.filter()?;
        let candidates = history::collect_candidate_paths(
            Arc::clone(&self.repo),
            &filter,
            self.config.collect.branch_concurrency,
            Arc::clone(&self.progress),
            self.cancel.clone(),
        )
        .await?;
        Ok(candidates)
    }

    /// Full run: collect candidates, then estimate against `host`.
    pub async fn estimate_deployment(&self, host: &Url) -> Result<DeploymentEstimate, EngineError> {
        let candidates = self.collect_candidate_paths().await?;
        self.estimate_from_candidates(host, &candidates).await
    }

    /// Estimate against `host` from a precomputed candidate list.
    ///
    /// The interest filter is applied again, so a hand-edited list cannot
    /// widen the probe set beyond the configured patterns.
    pub async fn estimate_from_candidates(
        &self,
        host: &Url,
        candidates: &CandidatePathSet,
    ) -> Result<DeploymentEstimate, EngineError> {
        let candidates = self.filter()?.apply(candidates);
        tracing::info!(candidates = candidates.len(), %host, "probing live host");

        let probed = probe::probe_paths(
            Arc::clone(&self.fetcher),
            host,
            &candidates,
            self.repo.object_format(),
            &self.config.probe,
            Arc::clone(&self.progress),
            self.cancel.clone(),
        )
        .await?;

        let walk = CommitWalk::chronological(self.repo.as_ref(), DEFAULT_REV).await?;
        tracing::debug!(commits = walk.len(), "walking default branch");

        let resolved = resolver::resolve_blobs(
            self.repo.as_ref(),
            &walk,
            &probed,
            self.progress.as_ref(),
            &self.cancel,
        )
        .await?;

        let estimate = estimate::estimate_range(
            self.repo.as_ref(),
            &walk,
            &probed,
            &resolved,
            self.config.report.top,
            self.progress.as_ref(),
            &self.cancel,
        )
        .await?;
        Ok(estimate)
    }
}

/// Open `repo_uri`, racing the clone against cancellation.
pub async fn open_repository(
    repo_uri: &str,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<Arc<GitRepository>, EngineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        repo = open_or_clone(repo_uri, &config.mirror) => Ok(Arc::new(repo?)),
    }
}

/// Estimate which commit of `repo_uri` is deployed at `host`.
///
/// `patterns` replaces the configured interest patterns. The repository is
/// closed before returning, whatever the outcome.
pub async fn estimate_deployment(
    repo_uri: &str,
    host: &str,
    patterns: &[String],
    config: &Config,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<DeploymentEstimate, EngineError> {
    let host = probe::parse_host(host)?;
    let mut config = config.clone();
    config.patterns.include = patterns.to_vec();
    let fetcher = Arc::new(HttpFetcher::new(&config.probe)?);

    let repo = open_repository(repo_uri, &config, &cancel).await?;
    let engine = Engine::new(repo.clone(), fetcher, config)
        .with_progress(progress)
        .with_cancellation(cancel);
    let result = engine.estimate_deployment(&host).await;
    repo.close();
    result
}

/// Candidate paths of `repo_uri` matching `patterns`, independent of any host.
pub async fn collect_candidate_paths(
    repo_uri: &str,
    patterns: &[String],
    config: &Config,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<CandidatePathSet, EngineError> {
    let filter = PathFilter::new(patterns)?;
    let repo = open_repository(repo_uri, config, &cancel).await?;
    let result = history::collect_candidate_paths(
        repo.clone(),
        &filter,
        config.collect.branch_concurrency,
        progress,
        cancel,
    )
    .await;
    repo.close();
    Ok(result?)
}
