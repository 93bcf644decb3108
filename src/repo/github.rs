//! GitHub repository metadata for the run banner.
//!
//! Fails silently: any error yields `None` and never affects the estimate.

use std::time::Duration;

use serde::Deserialize;

use crate::constants;

/// Maximum time we'll wait for the API before giving up.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct RepoInfo {
    /// Repository size in KiB as reported by GitHub.
    size: u64,
}

/// Look up the size (KiB) of `owner/name` on GitHub.
pub async fn repo_size(owner: &str, name: &str, user_agent: &str) -> Option<u64> {
    repo_size_at(constants::GITHUB_API_BASE, owner, name, user_agent).await
}

async fn repo_size_at(api_base: &str, owner: &str, name: &str, user_agent: &str) -> Option<u64> {
    let url = format!("{}/repos/{owner}/{name}", api_base.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()
        .ok()?;
    let resp = client
        .get(&url)
        .header("User-Agent", user_agent)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .map_err(|e| tracing::debug!(error = %e, "repository size lookup failed"))
        .ok()?;

    if !resp.status().is_success() {
        tracing::debug!(status = %resp.status(), "repository size lookup rejected");
        return None;
    }
    let body = resp.text().await.ok()?;
    parse_repo_size(&body)
}

fn parse_repo_size(body: &str) -> Option<u64> {
    serde_json::from_str::<RepoInfo>(body).ok().map(|info| info.size)
}
