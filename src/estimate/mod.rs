//! Deployment range estimation.
//!
//! Groups resolved paths by commit, ranks commits by match count, and bounds
//! the deployed revision from above with the first later commit (in the same
//! chronological walk) that touches any probed path.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::history::CommitWalk;
use crate::models::{CommitScore, DeploymentEstimate, ObjectId, ProbeResult, ResolvedMap};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::repo::{RepoError, Repository};

#[derive(Error, Debug)]
pub enum EstimateError {
    /// No probed path resolved to any commit. A domain outcome, not a fault.
    #[error("no deployment match found ({probed} path(s) probed, none matched history)")]
    NoDeploymentMatch { probed: usize },

    #[error("failed to read metadata for matched commits: {0}")]
    Repo(#[source] RepoError),

    #[error("estimation cancelled")]
    Cancelled,
}

/// Paths resolved to each commit, paths sorted.
pub fn group_by_commit(resolved: &ResolvedMap) -> BTreeMap<ObjectId, Vec<String>> {
    let mut groups: BTreeMap<ObjectId, Vec<String>> = BTreeMap::new();
    for (path, commit) in resolved {
        groups.entry(commit.clone()).or_default().push(path.clone());
    }
    groups
}

/// Order: more matches first, then more recent author time, then commit id.
pub fn compare_scores(a: &CommitScore, b: &CommitScore) -> Ordering {
    b.matches
        .cmp(&a.matches)
        .then_with(|| b.commit.author_time.cmp(&a.commit.author_time))
        .then_with(|| a.commit.id.cmp(&b.commit.id))
}

pub fn rank_scores(mut scores: Vec<CommitScore>) -> Vec<CommitScore> {
    scores.sort_by(compare_scores);
    scores
}

/// First commit after `lower` in walk order whose first-parent diff touches
/// a monitored path (either side of a rename counts).
pub async fn find_next_change(
    repo: &dyn Repository,
    walk: &CommitWalk,
    lower: &ObjectId,
    monitored: &BTreeSet<&str>,
    cancel: &CancellationToken,
) -> Result<Option<ObjectId>, EstimateError> {
    for commit in walk.after(lower) {
        if cancel.is_cancelled() {
            return Err(EstimateError::Cancelled);
        }
        let changes = match repo.diff(commit.first_parent(), &commit.id).await {
            Ok(changes) => changes,
            Err(e) => {
                tracing::debug!(
                    commit = %commit.id,
                    error = %e,
                    "skipping commit with unreadable diff"
                );
                continue;
            }
        };
        let touches = changes
            .iter()
            .flat_map(|c| c.touched_paths())
            .any(|p| monitored.contains(p));
        if touches {
            return Ok(Some(commit.id.clone()));
        }
    }
    Ok(None)
}

/// Turn resolved paths into a ranked, bounded deployment estimate.
///
/// `top` caps the ranked list (at least the lower bound is kept).
pub async fn estimate_range(
    repo: &dyn Repository,
    walk: &CommitWalk,
    probe: &ProbeResult,
    resolved: &ResolvedMap,
    top: usize,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<DeploymentEstimate, EstimateError> {
    if resolved.is_empty() {
        return Err(EstimateError::NoDeploymentMatch {
            probed: probe.len(),
        });
    }

    let groups = group_by_commit(resolved);
    progress.emit(ProgressEvent::PhaseStarted {
        phase: Phase::Estimate,
        total: groups.len(),
    });

    let mut scores = Vec::with_capacity(groups.len());
    let mut last_err = None;
    for (id, paths) in groups {
        if cancel.is_cancelled() {
            return Err(EstimateError::Cancelled);
        }
        match repo.commit_info(&id).await {
            Ok(commit) => scores.push(CommitScore {
                commit,
                matches: paths.len(),
                paths,
            }),
            Err(e) => {
                tracing::warn!(commit = %id, error = %e, "dropping commit without metadata");
                last_err = Some(e);
            }
        }
    }

    let mut ranked = rank_scores(scores);
    let Some(lower) = ranked.first().cloned() else {
        return Err(match last_err {
            Some(e) => EstimateError::Repo(e),
            None => EstimateError::NoDeploymentMatch {
                probed: probe.len(),
            },
        });
    };

    let monitored: BTreeSet<&str> = probe.keys().map(String::as_str).collect();
    let upper = match find_next_change(repo, walk, &lower.commit.id, &monitored, cancel).await? {
        Some(id) => match repo.commit_info(&id).await {
            Ok(info) => Some(info),
            Err(e) => return Err(EstimateError::Repo(e)),
        },
        None => None,
    };

    ranked.truncate(top.max(1));
    Ok(DeploymentEstimate {
        lower,
        upper,
        ranked,
        probed: probe.len(),
        resolved: resolved.len(),
    })
}
