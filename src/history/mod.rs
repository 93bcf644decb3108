//! History walking and candidate path collection.
//!
//! [`CommitWalk`] is the single global commit order (oldest first, all
//! parents followed) shared by the resolver and the range estimator.
//! [`collect_candidate_paths`] walks every branch in a bounded worker pool
//! and returns the union of file paths that pass the interest filter.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::filter::PathFilter;
use crate::models::{BranchRef, CandidatePathSet, CommitRef, ObjectId};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::repo::{RepoError, Repository, WalkOrder};

/// Emit a [`ProgressEvent::BranchScanned`] every this many commits.
const PROGRESS_EVERY: usize = 10;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("candidate collection cancelled")]
    Cancelled,
}

/// A materialised commit sequence in chronological order.
#[derive(Debug, Clone, Default)]
pub struct CommitWalk {
    commits: Vec<CommitRef>,
    index: HashMap<ObjectId, usize>,
}

impl CommitWalk {
    /// Every commit reachable from `rev`, oldest first.
    pub async fn chronological(repo: &dyn Repository, rev: &str) -> Result<Self, RepoError> {
        let commits = repo.commits(rev, WalkOrder::Chronological).await?;
        Ok(Self::from_commits(commits))
    }

    /// Wrap an already ordered sequence. Later duplicates are dropped.
    pub fn from_commits(commits: Vec<CommitRef>) -> Self {
        let mut index = HashMap::with_capacity(commits.len());
        let mut unique = Vec::with_capacity(commits.len());
        for commit in commits {
            if index.contains_key(&commit.id) {
                continue;
            }
            index.insert(commit.id.clone(), unique.len());
            unique.push(commit);
        }
        Self {
            commits: unique,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitRef> {
        self.commits.iter()
    }

    /// Position of `id` in walk order.
    pub fn position(&self, id: &ObjectId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Commits strictly after `id`; empty when `id` is not in the walk.
    pub fn after(&self, id: &ObjectId) -> impl Iterator<Item = &CommitRef> {
        let start = self.position(id).map_or(self.commits.len(), |i| i + 1);
        self.commits[start..].iter()
    }
}

/// Distinct file paths present in any commit reachable from `branch`.
///
/// Commits whose tree cannot be read are skipped.
pub async fn walk_branch(
    repo: &dyn Repository,
    branch: &BranchRef,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<BTreeSet<String>, HistoryError> {
    let commits = repo
        .commits(branch.head.as_str(), WalkOrder::Chronological)
        .await?;
    let total = commits.len();
    let mut seen = HashSet::with_capacity(total);
    let mut files = BTreeSet::new();

    for (i, commit) in commits.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        if !seen.insert(&commit.id) {
            continue;
        }
        match repo.tree(&commit.id).await {
            Ok(entries) => {
                files.extend(entries.into_iter().filter(|e| !e.is_dir).map(|e| e.path));
            }
            Err(e) => {
                tracing::debug!(
                    branch = %branch.name,
                    commit = %commit.id,
                    error = %e,
                    "skipping unreadable tree"
                );
            }
        }

        let scanned = i + 1;
        if scanned % PROGRESS_EVERY == 0 || scanned == total {
            progress.emit(ProgressEvent::BranchScanned {
                branch: branch.name.clone(),
                scanned,
                total,
            });
        }
    }

    Ok(files)
}

/// Walk all branches concurrently and return the filtered union of paths.
///
/// At most `concurrency` branches are walked at once. Each worker publishes
/// its file set only when it completes. A branch whose history cannot be
/// listed is skipped with a warning.
pub async fn collect_candidate_paths(
    repo: Arc<dyn Repository>,
    filter: &PathFilter,
    concurrency: usize,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<CandidatePathSet, HistoryError> {
    let mut branches = repo.branches().await?;
    if branches.is_empty() {
        branches.push(repo.head().await?);
    }
    progress.emit(ProgressEvent::PhaseStarted {
        phase: Phase::Collect,
        total: branches.len(),
    });

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let published: Arc<Mutex<HashMap<String, BTreeSet<String>>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let mut join_set = JoinSet::new();

    for branch in branches {
        let repo = Arc::clone(&repo);
        let sem = Arc::clone(&semaphore);
        let published = Arc::clone(&published);
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();

        join_set.spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            match walk_branch(repo.as_ref(), &branch, progress.as_ref(), &cancel).await {
                Ok(files) => {
                    progress.emit(ProgressEvent::BranchFinished {
                        branch: branch.name.clone(),
                        files: files.len(),
                    });
                    published
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(branch.name, files);
                }
                Err(HistoryError::Cancelled) => {}
                Err(e) => {
                    tracing::warn!(branch = %branch.name, error = %e, "skipping branch");
                }
            }
        });
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                join_set.abort_all();
                return Err(HistoryError::Cancelled);
            }
            next = join_set.join_next() => match next {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) => tracing::warn!(error = %e, "branch walk task failed"),
            },
        }
    }

    let published = std::mem::take(&mut *published.lock().unwrap_or_else(|e| e.into_inner()));
    let all_paths = published.into_values().flatten();
    let candidates = filter.apply(all_paths);
    tracing::info!(candidates = candidates.len(), "collected candidate paths");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::repo::memory::MemoryRepository;
    use pretty_assertions::assert_eq;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn walk_collects_paths_from_every_commit() {
        let mut repo = MemoryRepository::new();
        let c1 = repo.commit(&[], &[("old.ts", "1"), ("readme.md", "x")], 100);
        let c2 = repo.commit(&[&c1], &[("new.ts", "2"), ("readme.md", "x")], 200);
        repo.branch("main", &c2);
        let branch = repo.head().await.unwrap();

        let files = walk_branch(&repo, &branch, &NoProgress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(files, set(&["new.ts", "old.ts", "readme.md"]));
    }

    #[tokio::test]
    async fn walk_skips_unreadable_trees() {
        let mut repo = MemoryRepository::new();
        let c1 = repo.commit(&[], &[("lost.ts", "1")], 100);
        let c2 = repo.commit(&[&c1], &[("kept.ts", "2")], 200);
        repo.branch("main", &c2);
        repo.break_tree(&c1);
        let branch = repo.head().await.unwrap();

        let files = walk_branch(&repo, &branch, &NoProgress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(files, set(&["kept.ts"]));
    }

    #[tokio::test]
    async fn walk_handles_diamond_merges_once() {
        let mut repo = MemoryRepository::new();
        let base = repo.commit(&[], &[("a.ts", "1")], 100);
        let left = repo.commit(&[&base], &[("a.ts", "1"), ("l.ts", "l")], 200);
        let right = repo.commit(&[&base], &[("a.ts", "1"), ("r.ts", "r")], 300);
        let merged = [("a.ts", "1"), ("l.ts", "l"), ("r.ts", "r")];
        let merge = repo.commit(&[&left, &right], &merged, 400);
        repo.branch("main", &merge);
        let branch = repo.head().await.unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let events = Arc::clone(&events);
            move |e: ProgressEvent| events.lock().unwrap().push(e)
        };
        walk_branch(&repo, &branch, &sink, &CancellationToken::new())
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::BranchScanned {
                branch: "main".into(),
                scanned: 4,
                total: 4,
            })
        );
    }

    #[tokio::test]
    async fn collect_unions_branches_then_filters() {
        let mut repo = MemoryRepository::new();
        let c1 = repo.commit(&[], &[("a.ts", "1"), ("b.php", "x")], 100);
        let c2 = repo.commit(&[&c1], &[("a.ts", "2"), ("dir/c.ts", "3")], 200);
        let f1 = repo.commit(&[&c1], &[("feature.vue", "f"), ("b.php", "x")], 300);
        repo.branch("main", &c2);
        repo.branch("feature", &f1);

        let filter = PathFilter::new(&["*.ts", "*.vue"]).unwrap();
        let out = collect_candidate_paths(
            Arc::new(repo),
            &filter,
            1,
            Arc::new(NoProgress),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out, set(&["a.ts", "dir/c.ts", "feature.vue"]));
    }

    #[tokio::test]
    async fn collect_stops_when_cancelled() {
        let mut repo = MemoryRepository::new();
        let c1 = repo.commit(&[], &[("a.ts", "1")], 100);
        repo.branch("main", &c1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let filter = PathFilter::new(&["*.ts"]).unwrap();
        let err = collect_candidate_paths(Arc::new(repo), &filter, 3, Arc::new(NoProgress), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Cancelled));
    }

    #[test]
    fn walk_positions_and_after() {
        let ids: Vec<ObjectId> = ["1", "2", "3"]
            .iter()
            .map(|n| n.repeat(40).parse().unwrap())
            .collect();
        let walk = CommitWalk::from_commits(
            ids.iter()
                .chain(std::iter::once(&ids[1]))
                .map(|id| CommitRef {
                    id: id.clone(),
                    parents: vec![],
                })
                .collect(),
        );
        assert_eq!(walk.len(), 3);
        assert_eq!(walk.position(&ids[2]), Some(2));
        let after: Vec<_> = walk.after(&ids[0]).map(|c| c.id.clone()).collect();
        assert_eq!(after, vec![ids[1].clone(), ids[2].clone()]);
        let unknown: ObjectId = "f".repeat(40).parse().unwrap();
        assert_eq!(walk.after(&unknown).count(), 0);
    }
}
