//! Gitignore-style inclusion filter over repository paths.
//!
//! Patterns use `.gitignore` syntax, but a match means *include*. A pattern
//! without a slash matches any path component (`*.ts` selects `dir/c.ts`),
//! a trailing slash selects everything under a directory, and a leading `!`
//! excludes paths an earlier pattern selected.

use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;

use crate::models::CandidatePathSet;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Compiled set of interest patterns.
#[derive(Debug, Clone)]
pub struct PathFilter {
    matcher: Gitignore,
    patterns: Vec<String>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let mut builder = GitignoreBuilder::new("");
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }
            builder
                .add_line(None, pattern)
                .map_err(|e| FilterError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            kept.push(pattern.to_string());
        }
        let matcher = builder.build().map_err(|e| FilterError::InvalidPattern {
            pattern: kept.join(","),
            reason: e.to_string(),
        })?;
        Ok(Self {
            matcher,
            patterns: kept,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `path` (repository-relative, `/`-separated) is of interest.
    pub fn is_match(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return false;
        }
        matches!(
            self.matcher.matched_path_or_any_parents(path, false),
            Match::Ignore(_)
        )
    }

    /// Keep the paths of interest. Output is independent of input order.
    pub fn apply<I, S>(&self, paths: I) -> CandidatePathSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths
            .into_iter()
            .filter(|p| self.is_match(p.as_ref()))
            .map(|p| p.as_ref().trim_start_matches('/').to_string())
            .collect()
    }
}

/// Filter `paths` by `patterns` in one step.
pub fn filter_paths<I, S, P>(paths: I, patterns: &[P]) -> Result<CandidatePathSet, FilterError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    P: AsRef<str>,
{
    Ok(PathFilter::new(patterns)?.apply(paths))
}

/// Parse a candidate list file: one path per line, `#` comments and blank
/// lines skipped.
pub fn parse_path_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Render a candidate list in the format [`parse_path_list`] reads.
pub fn format_path_list(paths: &CandidatePathSet) -> String {
    let mut out = String::new();
    for path in paths {
        out.push_str(path);
        out.push('\n');
    }
    out
}
