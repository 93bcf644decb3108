//! Opening repositories by URI, with on-disk mirrors for remote ones.
//!
//! Remote repositories are cloned as bare mirrors under
//! `<data_dir>/deploytrace/mirrors/<host>/<owner>/<repo>.git` and refreshed
//! on later runs. With mirroring disabled, each run clones into a scratch
//! directory that [`GitRepository::close`] removes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use sha2::{Digest, Sha256};

use super::RepoError;
use super::git::{GitRepository, git_command, run};
use crate::config::MirrorConfig;
use crate::constants;

/// Host, owner, and name parsed from a repository URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub host: String,
    /// Everything between the host and the repository name. GitLab
    /// subgroups show up here as `group/sub`.
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Relative mirror location for this repository.
    fn mirror_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.host);
        for part in self.owner.split('/') {
            path.push(part);
        }
        path.push(format!("{}.git", self.name));
        path
    }

    /// Whether the GitHub API can describe this repository.
    pub fn is_github(&self) -> bool {
        self.host.eq_ignore_ascii_case("github.com")
    }
}

/// Parse `https://`, `ssh://`, and scp-style (`git@host:owner/repo`) URIs.
///
/// Returns `None` for local paths and URIs without an owner segment.
pub fn parse_slug(uri: &str) -> Option<RepoSlug> {
    let uri = uri.trim();
    let (host, path) = if uri.contains("://") {
        let url = reqwest::Url::parse(uri).ok()?;
        let host = url.host_str()?.to_string();
        (host, url.path().to_string())
    } else {
        // scp-like syntax: [user@]host:path
        let (authority, path) = uri.split_once(':')?;
        if authority.contains('/') || path.starts_with("//") {
            return None;
        }
        let host = authority.rsplit('@').next()?.to_string();
        (host, path.to_string())
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (name, owner) = segments.split_last()?;
    if owner.is_empty() || host.is_empty() {
        return None;
    }
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(RepoSlug {
        host,
        owner: owner.join("/"),
        name: name.to_string(),
    })
}

/// Default mirror root, `<data_dir>/deploytrace/mirrors`.
pub fn default_mirror_root() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(constants::CONFIG_DIR).join(constants::MIRRORS_DIR))
}

/// Open `uri` as a repository.
///
/// An existing local directory is opened in place. Anything else is cloned:
/// into the mirror store when `config.enabled`, otherwise into a scratch
/// directory owned by the returned handle.
pub async fn open_or_clone(uri: &str, config: &MirrorConfig) -> Result<GitRepository, RepoError> {
    let local = Path::new(uri);
    if local.is_dir() {
        tracing::debug!(path = %local.display(), "opening local repository");
        return GitRepository::open(local).await;
    }

    if !config.enabled {
        return clone_scratch(uri, config.depth).await;
    }

    let root = config
        .dir
        .clone()
        .or_else(default_mirror_root)
        .ok_or_else(|| RepoError::MirrorUnavailable("no data directory".into()))?;
    let dest = root.join(mirror_location(uri));

    if dest.exists() {
        match reuse_mirror(&dest).await {
            Ok(repo) => return Ok(repo),
            Err(e) => {
                tracing::warn!(path = %dest.display(), error = %e, "removing corrupted mirror");
                std::fs::remove_dir_all(&dest)
                    .map_err(|e| RepoError::MirrorUnavailable(format!("{}: {e}", dest.display())))?;
            }
        }
    }

    tracing::info!(uri, path = %dest.display(), "cloning mirror");
    clone_mirror(uri, &dest, config.depth).await?;
    GitRepository::open(&dest).await
}

async fn reuse_mirror(dest: &Path) -> Result<GitRepository, RepoError> {
    let repo = GitRepository::open(dest).await?;
    tracing::info!(path = %dest.display(), "refreshing mirror");
    repo.refresh().await?;
    Ok(repo)
}

/// Relative directory for a URI inside the mirror root.
fn mirror_location(uri: &str) -> PathBuf {
    match parse_slug(uri) {
        Some(slug) => slug.mirror_path(),
        None => {
            let digest = hex::encode(Sha256::digest(uri.as_bytes()));
            PathBuf::from("_other").join(format!("{}.git", &digest[..16]))
        }
    }
}

async fn clone_scratch(uri: &str, depth: Option<u32>) -> Result<GitRepository, RepoError> {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "{}-{}-{}",
        constants::APP_NAME,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    // Removed on error and when the future is dropped mid-clone.
    let scratch = ScratchDir(Some(dir));
    clone_mirror(uri, scratch.path(), depth).await?;
    let repo = GitRepository::open(scratch.path()).await?;
    Ok(repo.with_scratch(scratch.keep()))
}

/// Per-run clone directory, deleted on drop unless kept.
struct ScratchDir(Option<PathBuf>);

impl ScratchDir {
    fn path(&self) -> &Path {
        self.0.as_deref().unwrap_or(Path::new(""))
    }

    fn keep(mut self) -> PathBuf {
        self.0.take().unwrap_or_default()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

async fn clone_mirror(uri: &str, dest: &Path, depth: Option<u32>) -> Result<(), RepoError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| RepoError::MirrorUnavailable(format!("{}: {e}", parent.display())))?;
    }

    let mut cmd = git_command();
    cmd.args(["clone", "--mirror", "--quiet"]);
    if let Some(depth) = depth {
        cmd.arg(format!("--depth={depth}"));
    }
    cmd.arg("--").arg(uri).arg(dest);
    run(cmd, "clone").await.map(|_| ()).map_err(|e| RepoError::Clone {
        uri: uri.to_string(),
        reason: match e {
            RepoError::Command { stderr, .. } => stderr,
            other => other.to_string(),
        },
    })
}

/// Management view over the mirror root.
pub struct MirrorStore {
    root: Option<PathBuf>,
}

impl MirrorStore {
    /// Store rooted at `dir`, or the default data directory.
    pub fn new(dir: Option<&Path>) -> Self {
        let root = dir.map(Path::to_path_buf).or_else(default_mirror_root);
        Self { root }
    }

    /// Count mirrored repositories and their disk usage.
    pub fn stats(&self) -> Result<MirrorStats, std::io::Error> {
        let mut stats = MirrorStats::default();
        let Some(ref root) = self.root else {
            return Ok(stats);
        };
        if !root.exists() {
            return Ok(stats);
        }

        for entry in walkdir::WalkDir::new(root) {
            let entry = entry.map_err(std::io::Error::other)?;
            let file_type = entry.file_type();
            if file_type.is_dir() && entry.file_name().to_string_lossy().ends_with(".git") {
                stats.repositories += 1;
            } else if file_type.is_file() {
                stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(stats)
    }

    /// Delete every mirror. Returns what was removed.
    pub fn clear(&self) -> Result<MirrorStats, std::io::Error> {
        let stats = self.stats()?;
        if let Some(ref root) = self.root {
            if root.exists() {
                std::fs::remove_dir_all(root)?;
            }
        }
        Ok(stats)
    }

    pub fn path(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

/// Mirror store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub repositories: usize,
    pub total_bytes: u64,
}

impl MirrorStats {
    /// Format total_bytes as a human-readable string.
    pub fn human_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;
        const GB: u64 = 1024 * MB;

        if self.total_bytes >= GB {
            format!("{:.1} GiB", self.total_bytes as f64 / GB as f64)
        } else if self.total_bytes >= MB {
            format!("{:.1} MiB", self.total_bytes as f64 / MB as f64)
        } else if self.total_bytes >= KB {
            format!("{:.1} KiB", self.total_bytes as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{Repository, WalkOrder};

    #[test]
    fn scratch_dir_is_removed_when_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("partial");
        std::fs::create_dir_all(dir.join("objects")).unwrap();
        drop(ScratchDir(Some(dir.clone())));
        assert!(!dir.exists());
    }

    #[test]
    fn kept_scratch_dir_survives() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("done");
        std::fs::create_dir_all(&dir).unwrap();
        let kept = ScratchDir(Some(dir.clone())).keep();
        assert_eq!(kept, dir);
        assert!(dir.exists());
    }

    fn slug(host: &str, owner: &str, name: &str) -> RepoSlug {
        RepoSlug {
            host: host.into(),
            owner: owner.into(),
            name: name.into(),
        }
    }

    #[test]
    fn parse_https_uri() {
        assert_eq!(
            parse_slug("https://github.com/acme/storefront"),
            Some(slug("github.com", "acme", "storefront"))
        );
        assert_eq!(
            parse_slug("https://github.com/acme/storefront.git"),
            Some(slug("github.com", "acme", "storefront"))
        );
    }

    #[test]
    fn parse_ssh_and_scp_uris() {
        assert_eq!(
            parse_slug("ssh://git@gitlab.com/group/sub/app.git"),
            Some(slug("gitlab.com", "group/sub", "app"))
        );
        assert_eq!(
            parse_slug("git@github.com:acme/storefront.git"),
            Some(slug("github.com", "acme", "storefront"))
        );
    }

    #[test]
    fn parse_rejects_local_and_ownerless() {
        assert_eq!(parse_slug("/srv/repos/app"), None);
        assert_eq!(parse_slug("./app"), None);
        assert_eq!(parse_slug("https://github.com/acme"), None);
        assert_eq!(parse_slug("file:///srv/repos/app"), None);
    }

    #[test]
    fn mirror_location_layout() {
        assert_eq!(
            mirror_location("https://github.com/acme/storefront"),
            PathBuf::from("github.com/acme/storefront.git")
        );
        let other = mirror_location("file:///srv/repos/app");
        assert!(other.starts_with("_other"));
        assert_eq!(other, mirror_location("file:///srv/repos/app"));
    }

    #[test]
    fn github_detection() {
        assert!(slug("GitHub.com", "a", "b").is_github());
        assert!(!slug("gitlab.com", "a", "b").is_github());
    }

    #[test]
    fn human_size_units() {
        let s = |b| MirrorStats { repositories: 1, total_bytes: b }.human_size();
        assert_eq!(s(500), "500 B");
        assert_eq!(s(2048), "2.0 KiB");
        assert_eq!(s(3 * 1024 * 1024), "3.0 MiB");
        assert_eq!(s(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn store_stats_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mirrors");
        let repo = root.join("github.com/acme/app.git");
        std::fs::create_dir_all(repo.join("objects")).unwrap();
        std::fs::write(repo.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let store = MirrorStore::new(Some(&root));
        assert_eq!(store.path(), Some(root.as_path()));
        let stats = store.stats().unwrap();
        assert_eq!(stats.repositories, 1);
        assert_eq!(stats.total_bytes, "ref: refs/heads/main\n".len() as u64);

        let cleared = store.clear().unwrap();
        assert_eq!(cleared, stats);
        assert!(!root.exists());
        assert_eq!(store.stats().unwrap(), MirrorStats::default());
    }

    async fn git_in(dir: &Path, args: &[&str]) {
        let status = tokio::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@test.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@test.com")
            .status()
            .await
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    async fn source_repo(dir: &Path) {
        git_in(dir, &["init", "-q", "-b", "main"]).await;
        std::fs::write(dir.join("app.ts"), "export {};\n").unwrap();
        git_in(dir, &["add", "."]).await;
        git_in(dir, &["commit", "-q", "-m", "init"]).await;
    }

    fn file_uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    #[tokio::test]
    async fn opens_local_directory_in_place() {
        let dir = tempfile::tempdir().unwrap();
        source_repo(dir.path()).await;

        let repo = open_or_clone(&dir.path().display().to_string(), &MirrorConfig::default())
            .await
            .unwrap();
        assert_eq!(repo.head().await.unwrap().name, "main");
        repo.close();
        assert!(dir.path().join("app.ts").exists());
    }

    #[tokio::test]
    async fn clones_then_reuses_mirror() {
        let src = tempfile::tempdir().unwrap();
        source_repo(src.path()).await;
        let mirrors = tempfile::tempdir().unwrap();
        let config = MirrorConfig {
            enabled: true,
            dir: Some(mirrors.path().to_path_buf()),
            depth: Some(10),
        };
        let uri = file_uri(src.path());

        let first = open_or_clone(&uri, &config).await.unwrap();
        assert!(first.git_dir().starts_with(mirrors.path()));
        assert_eq!(first.branches().await.unwrap().len(), 1);

        std::fs::write(src.path().join("app.ts"), "export const x = 1;\n").unwrap();
        git_in(src.path(), &["commit", "-q", "-am", "second"]).await;

        let second = open_or_clone(&uri, &config).await.unwrap();
        assert_eq!(second.git_dir(), first.git_dir());
        let walk = second.commits("main", WalkOrder::Chronological).await.unwrap();
        assert_eq!(walk.len(), 2);
    }

    #[tokio::test]
    async fn replaces_corrupted_mirror() {
        let src = tempfile::tempdir().unwrap();
        source_repo(src.path()).await;
        let mirrors = tempfile::tempdir().unwrap();
        let config = MirrorConfig {
            enabled: true,
            dir: Some(mirrors.path().to_path_buf()),
            depth: None,
        };
        let uri = file_uri(src.path());
        let dest = mirrors.path().join(mirror_location(&uri));
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("garbage"), "not a repo").unwrap();

        let repo = open_or_clone(&uri, &config).await.unwrap();
        assert!(!dest.join("garbage").exists());
        assert_eq!(repo.head().await.unwrap().name, "main");
    }

    #[tokio::test]
    async fn scratch_clone_is_removed_on_close() {
        let src = tempfile::tempdir().unwrap();
        source_repo(src.path()).await;
        let config = MirrorConfig {
            enabled: false,
            dir: None,
            depth: None,
        };

        let repo = open_or_clone(&file_uri(src.path()), &config).await.unwrap();
        let git_dir = repo.git_dir().to_path_buf();
        assert!(git_dir.exists());
        repo.close();
        assert!(!git_dir.exists());
    }

    #[tokio::test]
    async fn clone_failure_reports_uri() {
        let config = MirrorConfig {
            enabled: false,
            dir: None,
            depth: None,
        };
        let err = open_or_clone("file:///nonexistent/deploytrace/repo", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Clone { .. }), "got: {err}");
    }
}
