//! Shared fixtures: throwaway git repositories with fixed timestamps.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use deploytrace::config::Config;
use deploytrace::models::ObjectId;

/// A work-tree repository in a temp dir whose commits get increasing,
/// deterministic author and committer dates.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    clock: i64,
}

impl TestRepo {
    pub fn new() -> Self {
        let repo = Self {
            dir: tempfile::tempdir().unwrap(),
            clock: 1_700_000_000,
        };
        repo.git(&["init", "-q", "-b", "main"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn uri(&self) -> String {
        self.path().display().to_string()
    }

    /// Run git in the repository and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let date = format!("@{} +0000", self.clock);
        let out = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@test.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@test.com")
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    /// Write `files`, stage everything, and commit.
    pub fn commit(&mut self, files: &[(&str, &str)], message: &str) -> ObjectId {
        for (path, body) in files {
            let full = self.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, body).unwrap();
        }
        self.commit_staged(message)
    }

    /// Delete `path` and commit.
    pub fn remove(&mut self, path: &str, message: &str) -> ObjectId {
        self.git(&["rm", "-q", path]);
        self.commit_staged(message)
    }

    /// Rename `from` to `to` and commit.
    pub fn rename(&mut self, from: &str, to: &str, message: &str) -> ObjectId {
        self.git(&["mv", from, to]);
        self.commit_staged(message)
    }

    fn commit_staged(&mut self, message: &str) -> ObjectId {
        self.clock += 60;
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> ObjectId {
        self.git(&["rev-parse", "HEAD"]).parse().unwrap()
    }
}

/// Defaults with the given patterns and no probe spacing.
pub fn config(patterns: &[&str]) -> Config {
    let mut config = Config::default();
    config.patterns.include = patterns.iter().map(|p| p.to_string()).collect();
    config.probe.delay_ms = 0;
    config.mirror.enabled = false;
    config
}
