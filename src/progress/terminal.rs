//! Live-updating progress display on stderr.
//!
//! Redraws a status block (one line per branch during collection, one line
//! per later phase) in place using ANSI cursor movement. Silenced with
//! `--no-progress`, for JSON output, and when stderr is not a terminal.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use colored::Colorize;

use super::{Phase, ProgressEvent, ProgressSink};

/// Renders [`ProgressEvent`]s to an interactive terminal.
///
/// Thread-safe; share it across tasks via `Arc`.
pub struct TerminalProgress {
    inner: Mutex<DisplayState>,
    /// If false, all output is suppressed.
    enabled: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BranchLine {
    scanned: usize,
    total: usize,
    /// Set once the walk completes.
    files: Option<usize>,
}

#[derive(Debug, Default)]
struct DisplayState {
    phase: Option<Phase>,
    branches: BTreeMap<String, BranchLine>,
    probe_total: usize,
    probe_done: usize,
    probe_ok: usize,
    resolve_total: usize,
    resolved: usize,
    commits_scanned: usize,
    /// Number of lines we last printed (for clearing).
    rendered_lines: usize,
}

impl TerminalProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Mutex::new(DisplayState::default()),
            enabled,
        }
    }

    fn state(&self) -> MutexGuard<'_, DisplayState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear the live block and leave a one-line summary per phase.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        let mut state = self.state();
        clear_lines(state.rendered_lines);
        state.rendered_lines = 0;

        let stderr = io::stderr();
        let mut handle = stderr.lock();
        if !state.branches.is_empty() {
            let files: usize = state.branches.values().filter_map(|b| b.files).sum();
            let _ = writeln!(
                handle,
                "  {} Scanned {} branch(es), {files} path(s) seen",
                "✔".green().bold(),
                state.branches.len(),
            );
        }
        if state.probe_total > 0 {
            let _ = writeln!(
                handle,
                "  {} Probed {} path(s), {} responded",
                "✔".green().bold(),
                state.probe_done,
                state.probe_ok,
            );
        }
        if state.resolve_total > 0 {
            let _ = writeln!(
                handle,
                "  {} Resolved {}/{} path(s) over {} commit(s)",
                "✔".green().bold(),
                state.resolved,
                state.resolve_total,
                state.commits_scanned,
            );
        }
        let _ = handle.flush();
    }

    fn apply(state: &mut DisplayState, event: ProgressEvent) {
        match event {
            ProgressEvent::PhaseStarted { phase, total } => {
                state.phase = Some(phase);
                match phase {
                    Phase::Probe => state.probe_total = total,
                    Phase::Resolve => state.resolve_total = total,
                    Phase::Collect | Phase::Estimate => {}
                }
            }
            ProgressEvent::BranchScanned {
                branch,
                scanned,
                total,
            } => {
                let line = state.branches.entry(branch).or_default();
                line.scanned = scanned;
                line.total = total;
            }
            ProgressEvent::BranchFinished { branch, files } => {
                let line = state.branches.entry(branch).or_default();
                line.scanned = line.total;
                line.files = Some(files);
            }
            ProgressEvent::FileChecked { ok, done, total, .. } => {
                state.probe_done = done;
                state.probe_total = total;
                if ok {
                    state.probe_ok += 1;
                }
            }
            ProgressEvent::ResolveStep {
                resolved,
                total,
                commits_scanned,
            } => {
                state.resolved = resolved;
                state.resolve_total = total;
                state.commits_scanned = commits_scanned;
            }
        }
    }

    /// Render the current state to stderr, clearing previous output.
    fn render(state: &mut DisplayState) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        clear_lines(state.rendered_lines);

        let mut lines = 0;
        if !state.branches.is_empty() {
            let _ = writeln!(
                handle,
                "  {} Collecting candidate paths from {} branch(es)",
                "▸".cyan().bold(),
                state.branches.len(),
            );
            lines += 1;
            for (branch, line) in &state.branches {
                let (icon, status) = match line.files {
                    Some(files) => (
                        "✔".green().bold().to_string(),
                        format!("{} commits, {files} files", line.total).green().to_string(),
                    ),
                    None => (
                        "◌".cyan().bold().to_string(),
                        format!("{}/{} commits", line.scanned, line.total).cyan().to_string(),
                    ),
                };
                let _ = writeln!(handle, "    {icon} {} {status}", branch.dimmed());
                lines += 1;
            }
        }
        if state.probe_total > 0 {
            let _ = writeln!(
                handle,
                "  {} Probing {}/{} path(s), {} responded",
                "▸".cyan().bold(),
                state.probe_done,
                state.probe_total,
                state.probe_ok.to_string().green(),
            );
            lines += 1;
        }
        if state.phase == Some(Phase::Resolve) || state.resolved > 0 {
            let _ = writeln!(
                handle,
                "  {} Resolving {}/{} path(s), {} commit(s) walked",
                "▸".cyan().bold(),
                state.resolved,
                state.resolve_total,
                state.commits_scanned,
            );
            lines += 1;
        }

        let _ = handle.flush();
        state.rendered_lines = lines;
    }
}

impl ProgressSink for TerminalProgress {
    fn emit(&self, event: ProgressEvent) {
        let mut state = self.state();
        Self::apply(&mut state, event);
        if self.enabled {
            Self::render(&mut state);
        }
    }
}

/// Move cursor up and clear `n` lines.
fn clear_lines(n: usize) {
    if n == 0 {
        return;
    }
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    for _ in 0..n {
        let _ = write!(handle, "\x1b[1A\x1b[2K");
    }
    let _ = handle.flush();
}
