//! Configuration loading and layering.
//!
//! Handles `.deploytrace.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{
    CollectConfig, Config, ConfigError, MirrorConfig, PatternConfig, ProbeConfig, ReportConfig,
};
