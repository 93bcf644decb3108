//! Progress events emitted by the engine.
//!
//! The engine reports coarse progress through an injected [`ProgressSink`]
//! and has no knowledge of how events are rendered. [`TerminalProgress`] is
//! the live stderr display used by the binary.

pub mod terminal;

use serde::Serialize;
use strum::Display;

pub use terminal::TerminalProgress;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Collect,
    Probe,
    Resolve,
    Estimate,
}

/// A structured progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A phase began; `total` counts its work items (branches, paths, ...).
    PhaseStarted { phase: Phase, total: usize },
    /// `scanned` of `total` commits on `branch` have been listed.
    BranchScanned {
        branch: String,
        scanned: usize,
        total: usize,
    },
    /// A branch walk completed with `files` distinct paths.
    BranchFinished { branch: String, files: usize },
    /// One probe finished; `ok` is false for any fetch failure.
    FileChecked {
        path: String,
        ok: bool,
        done: usize,
        total: usize,
    },
    /// The resolver matched another path.
    ResolveStep {
        resolved: usize,
        total: usize,
        commits_scanned: usize,
    },
}

/// Receiver for [`ProgressEvent`]s. Must tolerate calls from many tasks.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}
