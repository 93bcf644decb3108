//! Ranked commit scores and the final deployment estimate.

use serde::{Deserialize, Serialize};

use super::CommitInfo;

/// Match evidence aggregated for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitScore {
    pub commit: CommitInfo,
    /// Number of probed paths resolved to this commit.
    pub matches: usize,
    /// The resolved paths, sorted.
    pub paths: Vec<String>,
}

/// Bounded window in which the deployed revision lies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEstimate {
    /// Best estimate of the deployed commit (top-ranked score).
    pub lower: CommitScore,
    /// First later commit touching a monitored path. `None` means no newer
    /// change was observed before the end of history.
    pub upper: Option<CommitInfo>,
    /// Top-K ranked scores, `lower` first.
    pub ranked: Vec<CommitScore>,
    /// Number of paths with a live digest.
    pub probed: usize,
    /// Number of probed paths resolved to some commit.
    pub resolved: usize,
}

impl DeploymentEstimate {
    /// Probed paths that matched nothing in history.
    pub fn unresolved(&self) -> usize {
        self.probed - self.resolved
    }
}
