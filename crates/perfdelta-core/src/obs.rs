//! Structured observability hooks for the perfdelta run lifecycle.
//!
//! This module provides:
//! - The run-scoped tracing span (`run_span`)
//! - Emission functions for key lifecycle events: run start, per-commit
//!   progress, skipped reports, salient commits and run completion

use tracing::{info, warn};

/// Span that tags every event of one run with its `run_id`.
///
/// The pipeline instruments its run future with it, so the span follows the
/// run across await points.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("perfdelta.run", run_id = %run_id)
}

/// Emit event: run started over `commit_count` commits of `branch`.
pub fn emit_run_started(run_id: &str, branch: &str, commit_count: usize, invocations: u32) {
    info!(
        event = "run.started",
        run_id = %run_id,
        branch = %branch,
        commit_count = commit_count,
        invocations = invocations,
    );
}

/// Emit event: a commit was checked out and is about to be tested.
pub fn emit_commit_started(commit: &str, position: usize, total: usize) {
    info!(event = "commit.started", commit = %commit, position = position, total = total);
}

/// Emit event: one test invocation at a commit finished.
pub fn emit_invocation_finished(commit: &str, invocation: u32, duration_ms: u64, reports: usize) {
    info!(
        event = "commit.invocation_finished",
        commit = %commit,
        invocation = invocation,
        duration_ms = duration_ms,
        reports = reports,
    );
}

/// Emit event: a report artifact could not be parsed and was skipped.
pub fn emit_report_skipped(commit: &str, path: &std::path::Path, error: &dyn std::fmt::Display) {
    warn!(
        event = "report.skipped",
        commit = %commit,
        path = %path.display(),
        error = %error,
    );
}

/// Emit event: a commit crossed a threshold for a test.
pub fn emit_salient_commit(commit: &str, test_name: &str, runtime_delta: f64, speedup: f64) {
    info!(
        event = "commit.salient",
        commit = %commit,
        test_name = %test_name,
        runtime_delta = runtime_delta,
        speedup = speedup,
    );
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, records: usize, salient: usize, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        records = records,
        salient_commits = salient,
        success = success,
    );
}

/// Emit event: the original checkout could not be restored (warning level).
pub fn emit_restore_error(branch: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.restore_error", branch = %branch, error = %error);
}

/// Emit event: results of an aborted run could not be written (warning level).
pub fn emit_persist_error(error: &anyhow::Error) {
    warn!(event = "run.persist_error", error = %format_args!("{error:#}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = run_span("test-run-id");
        let _entered = span.enter();
        emit_commit_started("c1", 1, 3);
        emit_persist_error(&anyhow::anyhow!("disk full"));
    }
}
