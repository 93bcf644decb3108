//! Commit, tree, and diff records read from the repository.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::ObjectId;

/// A branch name and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchRef {
    /// Short name, e.g. `main` or `origin/feature`.
    pub name: String,
    pub head: ObjectId,
}

/// A commit in a history walk together with its parents.
///
/// Only `parents[0]` is used for diffing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitRef {
    pub id: ObjectId,
    pub parents: Vec<ObjectId>,
}

impl CommitRef {
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }
}

/// Commit metadata used for ranking and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: ObjectId,
    pub parents: Vec<ObjectId>,
    pub tree: ObjectId,
    pub author: String,
    /// Author time as Unix seconds.
    pub author_time: i64,
    /// Author time in strict ISO 8601, as git formats it.
    pub author_date: String,
    pub message: String,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }
}

/// One entry from a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub id: ObjectId,
    pub is_dir: bool,
}

/// How a path changed between a commit and its first parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
}

impl ChangeKind {
    /// Map a raw diff status letter (`A`, `M`, `R100`, ...) to a kind.
    pub fn from_status(status: &str) -> Option<Self> {
        match status.chars().next()? {
            'A' => Some(ChangeKind::Added),
            'M' => Some(ChangeKind::Modified),
            'D' => Some(ChangeKind::Deleted),
            'R' => Some(ChangeKind::Renamed),
            'C' => Some(ChangeKind::Copied),
            'T' => Some(ChangeKind::TypeChanged),
            _ => None,
        }
    }
}

/// One path-level change from a first-parent diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ChangeKind,
    /// Pre-image path for renames and copies.
    pub old_path: Option<String>,
    /// Post-image path (the deleted path for deletions).
    pub path: String,
    /// Post-image blob id; `None` for deletions.
    pub post_blob: Option<ObjectId>,
}

impl FileChange {
    /// Every path this change touches, pre- and post-image.
    pub fn touched_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.path.as_str()).chain(self.old_path.as_deref())
    }
}
