//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags (applied by the binary)
//! 2. Environment variables
//! 3. `.deploytrace.toml` in the working directory
//! 4. `~/.config/deploytrace/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants;
use crate::env::Env;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub patterns: PatternConfig,
    pub collect: CollectConfig,
    pub probe: ProbeConfig,
    pub report: ReportConfig,
    pub mirror: MirrorConfig,
}

/// Which repository paths are worth probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Gitignore-style globs; a path is a candidate when one matches.
    pub include: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            include: vec!["*.vue".to_string(), "*.ts".to_string()],
        }
    }
}

/// Branch walking during candidate collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Max branches walked at once.
    pub branch_concurrency: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            branch_concurrency: 3,
        }
    }
}

/// Live host probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Max requests in flight.
    pub concurrency: usize,
    /// Minimum gap between request starts, in milliseconds.
    pub delay_ms: u64,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            delay_ms: 50,
            timeout_secs: 10,
            user_agent: constants::default_user_agent(),
        }
    }
}

impl ProbeConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Result presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// How many ranked commits to report.
    pub top: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top: 5 }
    }
}

/// On-disk repository mirrors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Keep clones between runs. When off, each run clones into a scratch
    /// directory that is removed afterwards.
    pub enabled: bool,
    /// Override for the mirror root directory.
    pub dir: Option<PathBuf>,
    /// Shallow clone depth; `None` clones full history.
    pub depth: Option<u32>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            depth: Some(10_000),
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads the global config, then `.deploytrace.toml` in `work_dir`,
    /// then applies environment variable overrides.
    pub fn load(work_dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: working-directory config
        if let Some(dir) = work_dir {
            let local_path = dir.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one; only non-default values in
    /// `other` take effect.
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.patterns.include != defaults.patterns.include {
            self.patterns.include = other.patterns.include;
        }
        if other.collect.branch_concurrency != defaults.collect.branch_concurrency {
            self.collect.branch_concurrency = other.collect.branch_concurrency;
        }

        if other.probe.concurrency != defaults.probe.concurrency {
            self.probe.concurrency = other.probe.concurrency;
        }
        if other.probe.delay_ms != defaults.probe.delay_ms {
            self.probe.delay_ms = other.probe.delay_ms;
        }
        if other.probe.timeout_secs != defaults.probe.timeout_secs {
            self.probe.timeout_secs = other.probe.timeout_secs;
        }
        if other.probe.user_agent != defaults.probe.user_agent {
            self.probe.user_agent = other.probe.user_agent;
        }

        if other.report.top != defaults.report.top {
            self.report.top = other.report.top;
        }

        // Disabled overrides enabled
        if !other.mirror.enabled {
            self.mirror.enabled = false;
        }
        if other.mirror.dir.is_some() {
            self.mirror.dir = other.mirror.dir;
        }
        if other.mirror.depth != defaults.mirror.depth {
            self.mirror.depth = other.mirror.depth;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(patterns) = env.list(constants::ENV_PATTERNS) {
            self.patterns.include = patterns;
        }

        match env.parsed::<usize>(constants::ENV_PROBE_CONCURRENCY) {
            Some(Ok(n)) if n > 0 => self.probe.concurrency = n,
            Some(_) => warn_invalid(constants::ENV_PROBE_CONCURRENCY, env),
            None => {}
        }
        match env.parsed::<u64>(constants::ENV_PROBE_DELAY_MS) {
            Some(Ok(ms)) => self.probe.delay_ms = ms,
            Some(Err(_)) => warn_invalid(constants::ENV_PROBE_DELAY_MS, env),
            None => {}
        }
        match env.parsed::<u64>(constants::ENV_TIMEOUT_SECS) {
            Some(Ok(secs)) if secs > 0 => self.probe.timeout_secs = secs,
            Some(_) => warn_invalid(constants::ENV_TIMEOUT_SECS, env),
            None => {}
        }
        if let Some(agent) = env.var(constants::ENV_USER_AGENT) {
            self.probe.user_agent = agent;
        }

        if let Some(dir) = env.var(constants::ENV_MIRROR_DIR) {
            self.mirror.dir = Some(PathBuf::from(dir));
        }
        match env.flag(constants::ENV_NO_MIRROR) {
            Some(Ok(no_mirror)) => self.mirror.enabled = !no_mirror,
            Some(Err(_)) => warn_invalid(constants::ENV_NO_MIRROR, env),
            None => {}
        }
    }
}

fn warn_invalid(name: &str, env: &Env) {
    let value = env.var(name).unwrap_or_default();
    tracing::warn!("ignoring invalid {name} value: {value}");
}
