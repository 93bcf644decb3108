//! Git CLI wrapper implementing [`Repository`].
//!
//! Shells out to `git` via `tokio::process::Command`, always with an explicit
//! `--git-dir` so bare mirrors and work trees are handled alike.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::{RepoError, Repository, WalkOrder};
use crate::models::{
    BranchRef, ChangeKind, CommitInfo, CommitRef, FileChange, ObjectFormat, ObjectId, TreeEntry,
};

/// Build a `git` command that never prompts for credentials.
pub(crate) fn git_command() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);
    cmd
}

/// Run a prepared git command and return stdout.
pub(crate) async fn run(mut cmd: Command, label: &str) -> Result<Vec<u8>, RepoError> {
    let output = cmd.output().await.map_err(RepoError::Spawn)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(RepoError::Command {
            command: label.to_string(),
            stderr,
        });
    }
    Ok(output.stdout)
}

/// An opened git repository.
#[derive(Debug)]
pub struct GitRepository {
    git_dir: PathBuf,
    format: ObjectFormat,
    /// Per-run clone directory removed by [`GitRepository::close`].
    scratch: Option<PathBuf>,
}

impl GitRepository {
    /// Open the repository at `path` (work tree, `.git` dir, or bare repo).
    pub async fn open(path: &Path) -> Result<Self, RepoError> {
        let mut cmd = git_command();
        cmd.arg("-C").arg(path).args(["rev-parse", "--absolute-git-dir"]);
        let stdout = run(cmd, "rev-parse --absolute-git-dir")
            .await
            .map_err(|_| RepoError::NotARepository(path.display().to_string()))?;
        let git_dir = PathBuf::from(String::from_utf8_lossy(&stdout).trim());

        let mut repo = Self {
            git_dir,
            format: ObjectFormat::Sha1,
            scratch: None,
        };
        repo.format = repo.detect_object_format().await;
        Ok(repo)
    }

    /// Mark this repository as a per-run clone to be removed on close.
    pub(crate) fn with_scratch(mut self, dir: PathBuf) -> Self {
        self.scratch = Some(dir);
        self
    }

    /// Absolute path of the git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Release the handle, deleting any per-run clone.
    pub fn close(&self) {
        if let Some(ref dir) = self.scratch {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove scratch clone");
            }
        }
    }

    async fn git<I, S>(&self, args: I) -> Result<Vec<u8>, RepoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let label = args
            .iter()
            .take(2)
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        let mut cmd = git_command();
        cmd.arg("--git-dir").arg(&self.git_dir).args(&args);
        run(cmd, &label).await
    }

    async fn detect_object_format(&self) -> ObjectFormat {
        match self.git(["rev-parse", "--show-object-format"]).await {
            Ok(out) => String::from_utf8_lossy(&out)
                .trim()
                .parse()
                .unwrap_or(ObjectFormat::Sha1),
            // Older git without the flag only supports SHA-1.
            Err(_) => ObjectFormat::Sha1,
        }
    }

    /// Fetch updates for a mirror clone.
    pub(crate) async fn refresh(&self) -> Result<(), RepoError> {
        self.git(["fetch", "--prune", "--quiet", "origin"]).await.map(|_| ())
    }
}

#[async_trait]
impl Repository for GitRepository {
    fn object_format(&self) -> ObjectFormat {
        self.format
    }

    async fn branches(&self) -> Result<Vec<BranchRef>, RepoError> {
        let out = self
            .git([
                "for-each-ref",
                "--format=%(refname:short)%00%(objectname)",
                "refs/heads",
                "refs/remotes",
            ])
            .await?;
        parse_branches(&out)
    }

    async fn head(&self) -> Result<BranchRef, RepoError> {
        let out = self.git(["rev-parse", "--verify", "HEAD^{commit}"]).await?;
        let head = parse_id(String::from_utf8_lossy(&out).trim())?;
        let name = match self.git(["symbolic-ref", "--short", "-q", "HEAD"]).await {
            Ok(out) => String::from_utf8_lossy(&out).trim().to_string(),
            Err(_) => String::new(),
        };
        let name = if name.is_empty() { "HEAD".to_string() } else { name };
        Ok(BranchRef { name, head })
    }

    async fn commits(&self, rev: &str, order: WalkOrder) -> Result<Vec<CommitRef>, RepoError> {
        let mut args = vec!["rev-list", "--parents", "--date-order"];
        if order == WalkOrder::Chronological {
            args.push("--reverse");
        }
        args.push(rev);
        args.push("--");
        let out = self.git(args).await.map_err(|e| match e {
            RepoError::Command { .. } => RepoError::UnknownRevision(rev.to_string()),
            other => other,
        })?;
        parse_rev_list(&out)
    }

    async fn tree(&self, commit: &ObjectId) -> Result<Vec<TreeEntry>, RepoError> {
        let out = self
            .git(["ls-tree", "-r", "-t", "-z", "--full-tree", commit.as_str()])
            .await?;
        parse_ls_tree(&out)
    }

    async fn diff(
        &self,
        from: Option<&ObjectId>,
        to: &ObjectId,
    ) -> Result<Vec<FileChange>, RepoError> {
        let mut args = vec!["diff-tree", "-r", "-z", "-M", "--no-commit-id"];
        match from {
            Some(parent) => {
                args.push(parent.as_str());
                args.push(to.as_str());
            }
            None => {
                args.push("--root");
                args.push(to.as_str());
            }
        }
        let out = self.git(args).await?;
        parse_raw_diff(&out)
    }

    async fn commit_info(&self, commit: &ObjectId) -> Result<CommitInfo, RepoError> {
        let out = self
            .git([
                "show",
                "-s",
                "--format=%H%x00%P%x00%T%x00%an%x00%at%x00%aI%x00%B",
                commit.as_str(),
            ])
            .await?;
        parse_commit_info(&out)
    }
}

fn parse_id(s: &str) -> Result<ObjectId, RepoError> {
    s.parse().map_err(|e| RepoError::Parse(format!("{e}")))
}

/// Parse `for-each-ref` output of `<short>\0<id>` lines.
///
/// Symbolic `*/HEAD` remote refs are skipped and duplicate names collapse.
pub(crate) fn parse_branches(out: &[u8]) -> Result<Vec<BranchRef>, RepoError> {
    let text = String::from_utf8_lossy(out);
    let mut branches = BTreeMap::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let (name, id) = line
            .split_once('\0')
            .ok_or_else(|| RepoError::Parse(format!("branch line: {line}")))?;
        if name == "HEAD" || name.ends_with("/HEAD") {
            continue;
        }
        branches.insert(name.to_string(), parse_id(id.trim())?);
    }
    Ok(branches
        .into_iter()
        .map(|(name, head)| BranchRef { name, head })
        .collect())
}

/// Parse `rev-list --parents` output: one commit per line, parents after it.
pub(crate) fn parse_rev_list(out: &[u8]) -> Result<Vec<CommitRef>, RepoError> {
    let text = String::from_utf8_lossy(out);
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let mut ids = line.split_whitespace().map(parse_id);
            let id = ids
                .next()
                .ok_or_else(|| RepoError::Parse("empty rev-list line".into()))??;
            let parents = ids.collect::<Result<Vec<_>, _>>()?;
            Ok(CommitRef { id, parents })
        })
        .collect()
}

/// Parse `ls-tree -r -t -z` output.
///
/// Records are `<mode> SP <type> SP <id> TAB <path>`. Gitlinks (submodules)
/// are not files and are dropped.
pub(crate) fn parse_ls_tree(out: &[u8]) -> Result<Vec<TreeEntry>, RepoError> {
    let mut entries = Vec::new();
    for record in out.split(|&b| b == 0).filter(|r| !r.is_empty()) {
        let record = String::from_utf8_lossy(record);
        let (meta, path) = record
            .split_once('\t')
            .ok_or_else(|| RepoError::Parse(format!("tree record: {record}")))?;
        let mut fields = meta.split(' ');
        let (_mode, kind, id) = match (fields.next(), fields.next(), fields.next()) {
            (Some(m), Some(k), Some(i)) => (m, k, i),
            _ => return Err(RepoError::Parse(format!("tree record: {record}"))),
        };
        let is_dir = match kind {
            "tree" => true,
            "blob" => false,
            _ => continue,
        };
        entries.push(TreeEntry {
            path: path.to_string(),
            id: parse_id(id)?,
            is_dir,
        });
    }
    Ok(entries)
}

/// Parse `diff-tree -r -z` raw output.
///
/// Each change is a `:<mode> <mode> <old> <new> <status>` token followed by
/// one path, or two (old, new) for renames and copies.
pub(crate) fn parse_raw_diff(out: &[u8]) -> Result<Vec<FileChange>, RepoError> {
    let mut tokens = out
        .split(|&b| b == 0)
        .filter(|t| !t.is_empty())
        .map(|t| String::from_utf8_lossy(t).into_owned());
    let mut changes = Vec::new();

    while let Some(meta) = tokens.next() {
        let meta = meta.trim_start_matches('\n');
        let Some(meta) = meta.strip_prefix(':') else {
            return Err(RepoError::Parse(format!("diff record: {meta}")));
        };
        let fields: Vec<&str> = meta.split(' ').collect();
        if fields.len() < 5 {
            return Err(RepoError::Parse(format!("diff record: {meta}")));
        }
        let new_id = parse_id(fields[3])?;
        let kind = ChangeKind::from_status(fields[4])
            .ok_or_else(|| RepoError::Parse(format!("diff status: {}", fields[4])))?;

        let first = tokens
            .next()
            .ok_or_else(|| RepoError::Parse("diff record without path".into()))?;
        let (old_path, path) = match kind {
            ChangeKind::Renamed | ChangeKind::Copied => {
                let second = tokens
                    .next()
                    .ok_or_else(|| RepoError::Parse("rename without target path".into()))?;
                (Some(first), second)
            }
            _ => (None, first),
        };

        let post_blob = (kind != ChangeKind::Deleted && !new_id.is_null()).then_some(new_id);
        changes.push(FileChange {
            kind,
            old_path,
            path,
            post_blob,
        });
    }
    Ok(changes)
}

/// Parse the NUL-separated `show -s --format` record built in `commit_info`.
pub(crate) fn parse_commit_info(out: &[u8]) -> Result<CommitInfo, RepoError> {
    let text = String::from_utf8_lossy(out);
    let fields: Vec<&str> = text.splitn(7, '\0').collect();
    let [id, parents, tree, author, time, date, message] = fields.as_slice() else {
        return Err(RepoError::Parse(format!("commit record: {text}")));
    };
    let parents = parents
        .split_whitespace()
        .map(parse_id)
        .collect::<Result<Vec<_>, _>>()?;
    let author_time = time
        .trim()
        .parse()
        .map_err(|_| RepoError::Parse(format!("author time: {time}")))?;
    Ok(CommitInfo {
        id: parse_id(id.trim())?,
        parents,
        tree: parse_id(tree.trim())?,
        author: author.to_string(),
        author_time,
        author_date: date.to_string(),
        message: message.trim_end().to_string(),
    })
}
