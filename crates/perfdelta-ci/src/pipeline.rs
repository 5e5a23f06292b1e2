//! Commit-by-commit test runtime pipeline.
//!
//! One run resolves the commit selection, then for each commit checks it
//! out, lets the executor prepare the build, runs the test suite
//! `invocations` times and parses every report the suite leaves behind. The original checkout is restored before the
//! collected records are grouped, analysed and handed to a [`ReportSink`].

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use perfdelta_core::obs;
use perfdelta_core::{
    Analysis, AnalysisConfig, CommitId, PartialResultsPolicy, ReportRecord, ReportSink,
    ValidationError, VcsError, VersionControl,
};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::checkout::CheckoutGuard;
use crate::collab::{ReportParser, TestExecutor};
use crate::runner::StageResult;
use crate::selection::{CommitSelection, SelectionError};

/// Lines of build output kept in an execution failure message.
const OUTPUT_TAIL_LINES: usize = 20;

/// What to test and how.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Root of the project under test (the repository working tree).
    pub project: PathBuf,

    /// Branch the selection is resolved against.
    pub branch: String,

    pub selection: CommitSelection,

    /// Restrict the run to these tests.
    pub tests: Option<Vec<String>>,

    pub config: AnalysisConfig,
}

/// Per-commit step in which an execution failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Checkout,
    Prepare,
    Execute,
    Collect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Checkout => "checkout",
            Stage::Prepare => "prepare",
            Stage::Execute => "execute",
            Stage::Collect => "collect",
        };
        f.write_str(name)
    }
}

/// A failure that aborted the traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionFailure {
    pub commit: CommitId,
    pub stage: Stage,
    pub message: String,
}

impl ExecutionFailure {
    fn new(commit: &CommitId, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            commit: commit.clone(),
            stage,
            message: message.into(),
        }
    }

    /// A step that ran but did not pass.
    fn exited(commit: &CommitId, stage: Stage, result: &StageResult) -> Self {
        Self::new(
            commit,
            stage,
            format!(
                "{} exited with code {}\n{}",
                result.stage_name,
                result.exit_code,
                result.output_tail(OUTPUT_TAIL_LINES)
            ),
        )
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed at commit {}: {}",
            self.stage, self.commit, self.message
        )
    }
}

/// A report artifact that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedReport {
    pub commit: CommitId,
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,

    /// Commits in the order they were tested.
    pub commits: Vec<CommitId>,

    pub analysis: Analysis,

    pub skipped_reports: Vec<SkippedReport>,

    pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("version control error: {0}")]
    Vcs(#[from] VcsError),

    /// `partial` holds what was collected before the failure when the
    /// partial-results policy keeps it (and anything was collected).
    /// `persist_error` is set when writing `partial` to the sink failed.
    #[error("{failure}")]
    Execution {
        failure: ExecutionFailure,
        partial: Option<Box<Analysis>>,
        persist_error: Option<anyhow::Error>,
    },

    /// Every commit was tested but the original checkout could not be put
    /// back. The results are still analysed and persisted into `results`.
    #[error("could not restore checkout of {branch}: {source}")]
    Restore {
        branch: String,
        #[source]
        source: VcsError,
        results: Option<Box<Analysis>>,
        persist_error: Option<anyhow::Error>,
    },

    #[error("failed to persist results: {0:#}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Default)]
struct Collected {
    records: Vec<ReportRecord>,
    skipped: Vec<SkippedReport>,
}

/// Pipeline orchestrator over the three collaborator seams.
pub struct PerfPipeline<'a> {
    vcs: &'a dyn VersionControl,
    executor: &'a dyn TestExecutor,
    parser: &'a dyn ReportParser,
}

impl<'a> PerfPipeline<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        executor: &'a dyn TestExecutor,
        parser: &'a dyn ReportParser,
    ) -> Self {
        Self {
            vcs,
            executor,
            parser,
        }
    }

    /// Run the whole pipeline and persist the results into `sink`.
    ///
    /// The selection is resolved before anything is checked out. Whatever
    /// happens afterwards, the original checkout is restored before this
    /// returns.
    pub async fn run(
        &self,
        request: &PipelineRequest,
        sink: &mut dyn ReportSink,
    ) -> Result<PipelineOutcome, PipelineError> {
        request.config.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_inner(run_id, request, sink).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: String,
        request: &PipelineRequest,
        sink: &mut dyn ReportSink,
    ) -> Result<PipelineOutcome, PipelineError> {
        let start = Instant::now();
        let config = &request.config;

        let commits = request.selection.resolve(self.vcs, &request.branch)?;
        obs::emit_run_started(&run_id, &request.branch, commits.len(), config.invocations);

        let guard = CheckoutGuard::acquire(self.vcs)?;
        let original = guard.original().to_string();
        let mut collected = Collected::default();
        let traversal = self
            .traverse(&guard, &commits, request, &mut collected)
            .await;
        let restored = guard.restore();

        let elapsed_ms = || start.elapsed().as_millis() as u64;

        if let Err(failure) = traversal {
            if let Err(e) = restored {
                obs::emit_restore_error(&original, &e);
            }
            info!(commit = %failure.commit.short(), stage = %failure.stage, "run aborted");

            let (partial, persist_error) = match config.partial_results {
                PartialResultsPolicy::Keep => salvage(collected.records, config, sink),
                PartialResultsPolicy::Discard => (None, None),
            };
            let records = partial.as_ref().map(|a| a.record_count()).unwrap_or(0);
            let salient = partial.as_ref().map(|a| a.salient.len()).unwrap_or(0);
            obs::emit_run_finished(&run_id, elapsed_ms(), records, salient, false);
            return Err(PipelineError::Execution {
                failure,
                partial,
                persist_error,
            });
        }

        if let Err(source) = restored {
            obs::emit_restore_error(&original, &source);
            let (results, persist_error) = salvage(collected.records, config, sink);
            let records = results.as_ref().map(|a| a.record_count()).unwrap_or(0);
            let salient = results.as_ref().map(|a| a.salient.len()).unwrap_or(0);
            obs::emit_run_finished(&run_id, elapsed_ms(), records, salient, false);
            return Err(PipelineError::Restore {
                branch: original,
                source,
                results,
                persist_error,
            });
        }

        let analysis = Analysis::from_records(collected.records, config);
        analysis.persist(sink).map_err(PipelineError::Persist)?;

        let duration_ms = elapsed_ms();
        obs::emit_run_finished(
            &run_id,
            duration_ms,
            analysis.record_count(),
            analysis.salient.len(),
            true,
        );

        Ok(PipelineOutcome {
            run_id,
            commits,
            analysis,
            skipped_reports: collected.skipped,
            duration_ms,
        })
    }

    async fn traverse(
        &self,
        guard: &CheckoutGuard<'_>,
        commits: &[CommitId],
        request: &PipelineRequest,
        collected: &mut Collected,
    ) -> Result<(), ExecutionFailure> {
        for (index, commit) in commits.iter().enumerate() {
            guard
                .checkout(commit)
                .map_err(|e| ExecutionFailure::new(commit, Stage::Checkout, e.to_string()))?;
            obs::emit_commit_started(commit.short(), index + 1, commits.len());

            let prepared = self
                .bounded(request, "build preparation", self.executor.prepare(&request.project))
                .await
                .map_err(|e| ExecutionFailure::new(commit, Stage::Prepare, format!("{e:#}")))?;
            if let Some(result) = prepared.filter(|r| !r.passed()) {
                return Err(ExecutionFailure::exited(commit, Stage::Prepare, &result));
            }

            for invocation in 1..=request.config.invocations {
                let run = self
                    .executor
                    .run_tests(&request.project, request.tests.as_deref());
                let result = self
                    .bounded(request, "test run", run)
                    .await
                    .map_err(|e| ExecutionFailure::new(commit, Stage::Execute, format!("{e:#}")))?;
                if !result.passed() {
                    return Err(ExecutionFailure::exited(commit, Stage::Execute, &result));
                }

                let parsed = self
                    .collect(commit, &request.project, collected)
                    .map_err(|e| ExecutionFailure::new(commit, Stage::Collect, e.to_string()))?;
                obs::emit_invocation_finished(
                    commit.short(),
                    invocation,
                    result.duration_ms,
                    parsed,
                );
            }
        }
        Ok(())
    }

    /// Await one executor step, bounded by the configured timeout.
    async fn bounded<T>(
        &self,
        request: &PipelineRequest,
        what: &str,
        step: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match request.config.stage_timeout_secs {
            0 => step.await,
            secs => tokio::time::timeout(Duration::from_secs(secs), step)
                .await
                .map_err(|_| anyhow!("{what} timed out after {secs}s"))?,
        }
    }

    /// Parse every report artifact under `project`, skipping the ones that
    /// fail to parse. Returns how many were parsed.
    fn collect(
        &self,
        commit: &CommitId,
        project: &Path,
        collected: &mut Collected,
    ) -> std::io::Result<usize> {
        let mut parsed = 0;
        for path in self.parser.discover(project)? {
            match self.parser.parse(&path) {
                Ok(report) => {
                    collected
                        .records
                        .push(ReportRecord::new(commit.clone(), report));
                    parsed += 1;
                }
                Err(e) => {
                    obs::emit_report_skipped(commit.as_str(), &path, &e);
                    collected.skipped.push(SkippedReport {
                        commit: commit.clone(),
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(parsed)
    }
}

/// Analyse and persist the records of a run that did not complete.
///
/// A persist failure is logged and handed back instead of replacing the
/// error that ended the run.
fn salvage(
    records: Vec<ReportRecord>,
    config: &AnalysisConfig,
    sink: &mut dyn ReportSink,
) -> (Option<Box<Analysis>>, Option<anyhow::Error>) {
    if records.is_empty() {
        return (None, None);
    }
    let analysis = Analysis::from_records(records, config);
    let persist_error = analysis.persist(sink).err();
    if let Some(e) = &persist_error {
        obs::emit_persist_error(e);
    }
    (Some(Box::new(analysis)), persist_error)
}
