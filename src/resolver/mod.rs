//! Blob-commit resolution.
//!
//! One pass over the chronological walk, diffing each commit against its
//! first parent. A pending path resolves to the first commit whose diff
//! leaves that path's post-image blob equal to the probed digest. Resolved
//! paths leave the pending set, and the walk stops once nothing is pending.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::history::CommitWalk;
use crate::models::{FileChange, ObjectId, ProbeResult, ResolvedMap};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::repo::Repository;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resolution cancelled")]
    Cancelled,
}

/// Pending and resolved paths for one resolution pass.
///
/// Every probed path is in exactly one of the two maps at all times.
#[derive(Debug, Clone)]
pub struct Resolver {
    pending: BTreeMap<String, ObjectId>,
    resolved: ResolvedMap,
}

impl Resolver {
    pub fn new(probe: &ProbeResult) -> Self {
        Self {
            pending: probe.clone(),
            resolved: ResolvedMap::new(),
        }
    }

    pub fn pending(&self) -> &BTreeMap<String, ObjectId> {
        &self.pending
    }

    pub fn resolved(&self) -> &ResolvedMap {
        &self.resolved
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Match `commit`'s changes against the pending digests.
    ///
    /// Only the post-image path is compared, so a renamed file resolves
    /// under its new name. Returns how many paths resolved.
    pub fn observe(&mut self, commit: &ObjectId, changes: &[FileChange]) -> usize {
        let mut newly = 0;
        for change in changes {
            let Some(ref post) = change.post_blob else {
                continue;
            };
            if self.pending.get(&change.path) == Some(post) {
                self.pending.remove(&change.path);
                self.resolved.insert(change.path.clone(), commit.clone());
                newly += 1;
            }
        }
        newly
    }

    pub fn into_resolved(self) -> ResolvedMap {
        self.resolved
    }
}

/// Resolve each probed path to the commit that introduced its live blob.
///
/// Commits whose diff cannot be computed are skipped. Paths still pending
/// at the end of history are simply absent from the result.
pub async fn resolve_blobs(
    repo: &dyn Repository,
    walk: &CommitWalk,
    probe: &ProbeResult,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<ResolvedMap, ResolveError> {
    let total = probe.len();
    progress.emit(ProgressEvent::PhaseStarted {
        phase: Phase::Resolve,
        total,
    });

    let mut resolver = Resolver::new(probe);
    let mut scanned = 0;
    for commit in walk.iter() {
        if resolver.is_done() {
            break;
        }
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        scanned += 1;

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
        if resolver.observe(&commit.id, &changes) > 0 {
            progress.emit(ProgressEvent::ResolveStep {
                resolved: resolver.resolved().len(),
                total,
                commits_scanned: scanned,
            });
        }
    }

    tracing::info!(
        resolved = resolver.resolved().len(),
        unresolved = resolver.pending().len(),
        commits = scanned,
        "resolution finished"
    );
    Ok(resolver.into_resolved())
}
