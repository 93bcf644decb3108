//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and URLs so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "deploytrace";

/// Crate version, baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Target triple this binary was built for (set by `build.rs`).
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.deploytrace.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".deploytrace.toml";

/// Directory name under `~/.config/` and the platform data dir.
pub const CONFIG_DIR: &str = "deploytrace";

/// Subdirectory of the data dir holding bare repository mirrors.
pub const MIRRORS_DIR: &str = "mirrors";

/// GitHub REST API base, used for the repository size lookup.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Default `User-Agent` for probes and API calls.
pub fn default_user_agent() -> String {
    format!("{APP_NAME}/{VERSION}")
}

// ── Environment variable names ──────────────────────────────────────

pub const ENV_LOG: &str = "DEPLOYTRACE_LOG";
pub const ENV_PATTERNS: &str = "DEPLOYTRACE_PATTERNS";
pub const ENV_PROBE_CONCURRENCY: &str = "DEPLOYTRACE_PROBE_CONCURRENCY";
pub const ENV_PROBE_DELAY_MS: &str = "DEPLOYTRACE_PROBE_DELAY_MS";
pub const ENV_TIMEOUT_SECS: &str = "DEPLOYTRACE_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "DEPLOYTRACE_USER_AGENT";
pub const ENV_MIRROR_DIR: &str = "DEPLOYTRACE_MIRROR_DIR";
pub const ENV_NO_MIRROR: &str = "DEPLOYTRACE_NO_MIRROR";
