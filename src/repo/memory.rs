//! In-memory [`Repository`] for unit tests.
//!
//! Commits are recorded in insertion order, which doubles as the
//! chronological walk order. Each commit stores a full file snapshot and
//! diffs are computed by comparing snapshots (no rename detection).

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;

use super::{RepoError, Repository, WalkOrder};
use crate::models::{
    BranchRef, ChangeKind, CommitInfo, CommitRef, FileChange, ObjectFormat, ObjectId, TreeEntry,
};
use crate::probe::digest::blob_id;

struct MemCommit {
    info: CommitInfo,
    files: BTreeMap<String, ObjectId>,
}

#[derive(Default)]
pub(crate) struct MemoryRepository {
    commits: Vec<MemCommit>,
    index: HashMap<ObjectId, usize>,
    branches: BTreeMap<String, ObjectId>,
    broken_trees: HashSet<ObjectId>,
    broken_diffs: HashSet<ObjectId>,
}

impl MemoryRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a commit whose tree is exactly `files` (path, content).
    pub(crate) fn commit(
        &mut self,
        parents: &[&ObjectId],
        files: &[(&str, &str)],
        author_time: i64,
    ) -> ObjectId {
        let n = self.commits.len();
        let id = blob_id(ObjectFormat::Sha1, format!("commit {n} {author_time}").as_bytes());
        let files: BTreeMap<String, ObjectId> = files
            .iter()
            .map(|(path, content)| {
                (path.to_string(), blob_id(ObjectFormat::Sha1, content.as_bytes()))
            })
            .collect();
        let info = CommitInfo {
            id: id.clone(),
            parents: parents.iter().map(|p| (*p).clone()).collect(),
            tree: blob_id(ObjectFormat::Sha1, format!("tree {n}").as_bytes()),
            author: "Test".to_string(),
            author_time,
            author_date: format!("@{author_time}"),
            message: format!("commit {n}"),
        };
        self.index.insert(id.clone(), n);
        self.commits.push(MemCommit { info, files });
        id
    }

    /// Point `name` at `head`. `HEAD` follows `main`, or else the
    /// alphabetically first branch.
    pub(crate) fn branch(&mut self, name: &str, head: &ObjectId) {
        self.branches.insert(name.to_string(), head.clone());
    }

    pub(crate) fn break_tree(&mut self, commit: &ObjectId) {
        self.broken_trees.insert(commit.clone());
    }

    pub(crate) fn break_diff(&mut self, commit: &ObjectId) {
        self.broken_diffs.insert(commit.clone());
    }

    fn get(&self, id: &ObjectId) -> Result<&MemCommit, RepoError> {
        self.index
            .get(id)
            .map(|&i| &self.commits[i])
            .ok_or_else(|| RepoError::UnknownRevision(id.to_string()))
    }

    fn resolve(&self, rev: &str) -> Result<ObjectId, RepoError> {
        if rev == "HEAD" {
            return self
                .branches
                .get("main")
                .or_else(|| self.branches.values().next())
                .cloned()
                .ok_or_else(|| RepoError::UnknownRevision(rev.to_string()));
        }
        if let Some(id) = self.branches.get(rev) {
            return Ok(id.clone());
        }
        rev.parse::<ObjectId>()
            .ok()
            .filter(|id| self.index.contains_key(id))
            .ok_or_else(|| RepoError::UnknownRevision(rev.to_string()))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn object_format(&self) -> ObjectFormat {
        ObjectFormat::Sha1
    }

    async fn branches(&self) -> Result<Vec<BranchRef>, RepoError> {
        Ok(self
            .branches
            .iter()
            .map(|(name, head)| BranchRef {
                name: name.clone(),
                head: head.clone(),
            })
            .collect())
    }

    async fn head(&self) -> Result<BranchRef, RepoError> {
        let head = self.resolve("HEAD")?;
        let name = self
            .branches
            .iter()
            .find(|(_, id)| **id == head)
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| "HEAD".to_string());
        Ok(BranchRef { name, head })
    }

    async fn commits(&self, rev: &str, order: WalkOrder) -> Result<Vec<CommitRef>, RepoError> {
        let start = self.resolve(rev)?;
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        let mut reachable = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let commit = self.get(&id)?;
            stack.extend(commit.info.parents.iter().cloned());
            reachable.push(self.index[&id]);
        }
        reachable.sort_unstable();
        if order == WalkOrder::NewestFirst {
            reachable.reverse();
        }
        Ok(reachable
            .into_iter()
            .map(|i| CommitRef {
                id: self.commits[i].info.id.clone(),
                parents: self.commits[i].info.parents.clone(),
            })
            .collect())
    }

    async fn tree(&self, commit: &ObjectId) -> Result<Vec<TreeEntry>, RepoError> {
        if self.broken_trees.contains(commit) {
            return Err(RepoError::Parse(format!("broken tree for {commit}")));
        }
        let commit = self.get(commit)?;
        let mut entries = Vec::new();
        let mut dirs = HashSet::new();
        for (path, id) in &commit.files {
            let parts: Vec<&str> = path.split('/').collect();
            for depth in 1..parts.len() {
                let dir = parts[..depth].join("/");
                if dirs.insert(dir.clone()) {
                    entries.push(TreeEntry {
                        path: dir,
                        id: commit.info.tree.clone(),
                        is_dir: true,
                    });
                }
            }
            entries.push(TreeEntry {
                path: path.clone(),
                id: id.clone(),
                is_dir: false,
            });
        }
        Ok(entries)
    }

    async fn diff(
        &self,
        from: Option<&ObjectId>,
        to: &ObjectId,
    ) -> Result<Vec<FileChange>, RepoError> {
        if self.broken_diffs.contains(to) {
            return Err(RepoError::Parse(format!("broken diff for {to}")));
        }
        let empty = BTreeMap::new();
        let before = match from {
            Some(id) => &self.get(id)?.files,
            None => &empty,
        };
        let after = &self.get(to)?.files;

        let mut changes = Vec::new();
        for (path, id) in after {
            let kind = match before.get(path) {
                None => ChangeKind::Added,
                Some(old) if old != id => ChangeKind::Modified,
                Some(_) => continue,
            };
            changes.push(FileChange {
                kind,
                old_path: None,
                path: path.clone(),
                post_blob: Some(id.clone()),
            });
        }
        for path in before.keys().filter(|p| !after.contains_key(*p)) {
            changes.push(FileChange {
                kind: ChangeKind::Deleted,
                old_path: None,
                path: path.clone(),
                post_blob: None,
            });
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }

    async fn commit_info(&self, commit: &ObjectId) -> Result<CommitInfo, RepoError> {
        Ok(self.get(commit)?.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn head_prefers_main_then_first_branch_by_name() {
        let mut repo = MemoryRepository::new();
        let first = repo.commit(&[], &[("a.ts", "1")], 100);
        let second = repo.commit(&[&first], &[("a.ts", "2")], 200);
        repo.branch("zeta", &first);
        repo.branch("beta", &second);
        let head = repo.head().await.unwrap();
        assert_eq!(head.name, "beta");
        assert_eq!(head.head, second);

        repo.branch("main", &first);
        let head = repo.head().await.unwrap();
        assert_eq!(head.name, "main");
        assert_eq!(head.head, first);
    }

    #[tokio::test]
    async fn head_without_branches_is_unknown() {
        let repo = MemoryRepository::new();
        let err = repo.head().await.unwrap_err();
        assert!(matches!(err, RepoError::UnknownRevision(ref rev) if rev == "HEAD"));
    }
}
