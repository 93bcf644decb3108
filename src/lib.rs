//! deploytrace: estimate which commit of a git repository a live site runs.
//!
//! Re-exports public modules for integration tests and external use.

pub mod config;
pub mod constants;
pub mod env;
pub mod estimate;
pub mod filter;
pub mod history;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod repo;
pub mod resolver;
