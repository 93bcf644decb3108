//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so they never mix with rendered results on stdout.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::constants::ENV_LOG;
use crate::env::Env;

/// Filter used when neither `-v` nor the log env var is given.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Pick the filter directive: `-v`/`-vv` beat the env var, which beats the default.
pub fn filter_directive(verbose: u8, env: &Env) -> String {
    match verbose {
        0 => env.var(ENV_LOG).unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(verbose: u8, env: &Env) {
    let directive = filter_directive(verbose, env);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("ignoring invalid log filter '{directive}': {e}");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}
