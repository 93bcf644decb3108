//! Repository capability: history, trees, and first-parent diffs.
//!
//! The [`Repository`] trait is what the core consumes. [`git::GitRepository`]
//! implements it by shelling out to the `git` CLI, and [`mirror`] opens a
//! local repository or clones a remote one into an on-disk mirror.

pub mod git;
pub mod github;
#[cfg(test)]
pub(crate) mod memory;
pub mod mirror;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    BranchRef, CommitInfo, CommitRef, FileChange, ObjectFormat, ObjectId, TreeEntry,
};

/// Errors from repository access.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("unexpected git output: {0}")]
    Parse(String),

    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("failed to clone {uri}: {reason}")]
    Clone { uri: String, reason: String },

    #[error("mirror directory unavailable: {0}")]
    MirrorUnavailable(String),

    #[error("unknown revision: {0}")]
    UnknownRevision(String),
}

/// Order in which [`Repository::commits`] yields a history.
///
/// All parents are followed. Both orders are derived from committer date
/// while never placing a parent after its child in the chronological case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Oldest first; parents always precede their children.
    Chronological,
    /// Newest first, git's native log order.
    NewestFirst,
}

/// Read access to a version-controlled history.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Hash function used for object ids in this repository.
    fn object_format(&self) -> ObjectFormat;

    /// All local and remote-tracking branches, sorted by name.
    async fn branches(&self) -> Result<Vec<BranchRef>, RepoError>;

    /// The default branch (what `HEAD` points at).
    async fn head(&self) -> Result<BranchRef, RepoError>;

    /// Every commit reachable from `rev`, each exactly once.
    async fn commits(&self, rev: &str, order: WalkOrder) -> Result<Vec<CommitRef>, RepoError>;

    /// Recursive listing of a commit's root tree.
    async fn tree(&self, commit: &ObjectId) -> Result<Vec<TreeEntry>, RepoError>;

    /// Path-level changes from `from` to `to`, with rename detection.
    ///
    /// `from = None` diffs against the empty tree.
    async fn diff(
        &self,
        from: Option<&ObjectId>,
        to: &ObjectId,
    ) -> Result<Vec<FileChange>, RepoError>;

    /// Author, date, message, and tree of a commit.
    async fn commit_info(&self, commit: &ObjectId) -> Result<CommitInfo, RepoError>;
}
