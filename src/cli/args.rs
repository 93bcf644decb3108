//! Clap argument types and config overrides.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use deploytrace::config::Config;
use deploytrace::models::DeploymentEstimate;

/// Pin down which commit a live website is running.
#[derive(Parser, Debug)]
#[command(
    name = "deploytrace",
    version = deploytrace::constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Estimate the commit range deployed at a host.
    Estimate(Box<EstimateArgs>),

    /// List candidate paths from repository history without probing.
    Candidates(CandidatesArgs),

    /// Manage the local repository mirrors.
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },

    /// Print version and build information.
    Version,
}

/// Mirror management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum MirrorAction {
    /// Remove all mirrored repositories.
    Clear,
    /// Show mirror statistics (repository count and size).
    Stats,
    /// Print the mirror directory path.
    Path,
}

/// Arguments for the `candidates` subcommand.
#[derive(Parser, Debug)]
pub struct CandidatesArgs {
    /// Git repository: local path, https URL, or git@host:owner/repo.
    #[arg(long = "git", value_name = "URI")]
    pub git: String,

    /// Comma-separated gitignore-style patterns selecting files of interest.
    #[arg(long, value_delimiter = ',')]
    pub pattern: Vec<String>,

    /// Write the list to this file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Clone into a temporary directory instead of the mirror store.
    #[arg(long, default_value_t = false)]
    pub no_mirror: bool,

    /// Disable the live progress display.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

/// Arguments for the `estimate` subcommand.
#[derive(Parser, Debug)]
pub struct EstimateArgs {
    // --- Inputs ---
    /// Git repository: local path, https URL, or git@host:owner/repo.
    #[arg(long = "git", value_name = "URI")]
    pub git: String,

    /// Live host to probe, e.g. https://shop.example.com (scheme defaults to https).
    #[arg(long, value_name = "HOST")]
    pub url: String,

    /// Comma-separated gitignore-style patterns selecting files of interest.
    #[arg(long, value_delimiter = ',')]
    pub pattern: Vec<String>,

    /// Read candidate paths from this file instead of walking every branch.
    #[arg(long, value_name = "FILE")]
    pub enumeration_file: Option<PathBuf>,

    // --- Output ---
    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Number of ranked candidate commits to report.
    #[arg(long)]
    pub top: Option<usize>,

    // --- Probing ---
    /// Max concurrent requests to the live host.
    #[arg(long)]
    pub probe_concurrency: Option<usize>,

    /// Minimum delay between request starts, in milliseconds.
    #[arg(long)]
    pub probe_delay_ms: Option<u64>,

    /// Per-request timeout in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    // --- Repository ---
    /// Clone into a temporary directory instead of the mirror store.
    #[arg(long, default_value_t = false)]
    pub no_mirror: bool,

    /// Disable the live progress display.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl EstimateArgs {
    /// Apply the flags that were given on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if !self.pattern.is_empty() {
            config.patterns.include = self.pattern.clone();
        }
        if let Some(top) = self.top {
            config.report.top = top;
        }
        if let Some(n) = self.probe_concurrency {
            config.probe.concurrency = n;
        }
        if let Some(ms) = self.probe_delay_ms {
            config.probe.delay_ms = ms;
        }
        if let Some(secs) = self.timeout {
            config.probe.timeout_secs = secs;
        }
        if self.no_mirror {
            config.mirror.enabled = false;
        }
    }
}

impl CandidatesArgs {
    pub fn apply_to(&self, config: &mut Config) {
        if !self.pattern.is_empty() {
            config.patterns.include = self.pattern.clone();
        }
        if self.no_mirror {
            config.mirror.enabled = false;
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    /// Render the estimate using the renderer for this format.
    pub fn render(&self, estimate: &DeploymentEstimate) -> String {
        use deploytrace::output::OutputRenderer;
        match self {
            OutputFormat::Terminal => {
                deploytrace::output::terminal::TerminalRenderer.render(estimate)
            }
            OutputFormat::Json => deploytrace::output::json::JsonRenderer.render(estimate),
        }
    }
}
