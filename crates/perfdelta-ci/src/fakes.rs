//! In-memory fakes for the pipeline collaborators (testing only)
//!
//! Provides `FakeVcs`, `ScriptedExecutor` and `MemorySink`, which satisfy
//! the collaborator contracts without git or Maven. `ScriptedExecutor` writes
//! real Surefire text reports so the production parser can be used with it.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use perfdelta_core::{
    BenchmarkStatistics, CommitId, ReportSink, SalientCommits, TestSeries, VcsError,
    VersionControl,
};

use crate::collab::TestExecutor;
use crate::runner::StageResult;
use crate::surefire::{SUREFIRE_REPORTS_DIR, TARGET_DIR};

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct VcsState {
    head: String,
    checkouts: Vec<String>,
}

/// Single-branch repository whose checkouts only move a HEAD pointer.
///
/// Clones share state, so a clone handed to a [`ScriptedExecutor`] sees the
/// commit the pipeline checked out.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    branch: String,
    commits: Vec<CommitId>,
    extra: Vec<CommitId>,
    failing: HashSet<String>,
    state: Arc<Mutex<VcsState>>,
}

impl FakeVcs {
    /// `commits` are given newest first; HEAD starts on `branch`.
    pub fn new(branch: &str, commits: &[&str]) -> Self {
        Self {
            branch: branch.to_string(),
            commits: commits.iter().map(|c| CommitId::from(*c)).collect(),
            extra: Vec::new(),
            failing: HashSet::new(),
            state: Arc::new(Mutex::new(VcsState {
                head: branch.to_string(),
                checkouts: Vec::new(),
            })),
        }
    }

    /// A resolvable commit that is not on the branch.
    pub fn with_extra_commit(mut self, id: &str) -> Self {
        self.extra.push(CommitId::from(id));
        self
    }

    /// Make checking out `rev` fail.
    pub fn failing_checkout(mut self, rev: &str) -> Self {
        self.failing.insert(rev.to_string());
        self
    }

    /// What HEAD points at right now.
    pub fn head(&self) -> String {
        self.state.lock().unwrap().head.clone()
    }

    /// Every successful checkout, in order.
    pub fn checkouts(&self) -> Vec<String> {
        self.state.lock().unwrap().checkouts.clone()
    }

    fn knows(&self, rev: &str) -> bool {
        rev == self.branch
            || self
                .commits
                .iter()
                .chain(&self.extra)
                .any(|c| c.as_str() == rev)
    }
}

impl VersionControl for FakeVcs {
    fn list_commits(&self, branch: &str) -> Result<Vec<CommitId>, VcsError> {
        if branch != self.branch {
            return Err(VcsError::UnknownRevision(branch.to_string()));
        }
        Ok(self.commits.clone())
    }

    fn resolve_commit(&self, id: &str) -> Result<CommitId, VcsError> {
        self.commits
            .iter()
            .chain(&self.extra)
            .find(|c| c.as_str() == id)
            .cloned()
            .ok_or_else(|| VcsError::UnknownRevision(id.to_string()))
    }

    fn checkout(&self, rev: &str) -> Result<(), VcsError> {
        if self.failing.contains(rev) {
            return Err(VcsError::CheckoutFailed {
                rev: rev.to_string(),
                message: "scripted failure".to_string(),
            });
        }
        if !self.knows(rev) {
            return Err(VcsError::UnknownRevision(rev.to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.head = rev.to_string();
        state.checkouts.push(rev.to_string());
        Ok(())
    }

    fn current_branch(&self) -> Result<String, VcsError> {
        Ok(self.head())
    }
}

// ---------------------------------------------------------------------------
// ScriptedExecutor
// ---------------------------------------------------------------------------

/// Render a minimal Surefire text report.
pub fn surefire_report(test_name: &str, time_elapsed: f64) -> String {
    format!(
        "-------------------------------------------------------------------------------\n\
         Test set: {test_name}\n\
         -------------------------------------------------------------------------------\n\
         Tests run: 1, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: {time_elapsed} s - in {test_name}\n"
    )
}

/// Test executor that "runs" a commit by writing scripted Surefire reports
/// into `<project>/target/surefire-reports/`, replacing the previous ones.
#[derive(Debug)]
pub struct ScriptedExecutor {
    vcs: FakeVcs,
    reports: HashMap<String, Vec<(String, String)>>,
    failures: HashSet<String>,
    prepare_failures: HashSet<String>,
    invocations: Mutex<Vec<String>>,
    prepares: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(vcs: FakeVcs) -> Self {
        Self {
            vcs,
            reports: HashMap::new(),
            failures: HashSet::new(),
            prepare_failures: HashSet::new(),
            invocations: Mutex::new(Vec::new()),
            prepares: Mutex::new(Vec::new()),
        }
    }

    /// At `commit`, `test_name` takes `time_elapsed` seconds.
    pub fn with_report(self, commit: &str, test_name: &str, time_elapsed: f64) -> Self {
        let content = surefire_report(test_name, time_elapsed);
        self.with_raw_report(commit, &format!("{test_name}.txt"), &content)
    }

    /// At `commit`, write `content` verbatim as report `file_name`.
    pub fn with_raw_report(mut self, commit: &str, file_name: &str, content: &str) -> Self {
        self.reports
            .entry(commit.to_string())
            .or_default()
            .push((file_name.to_string(), content.to_string()));
        self
    }

    /// The build fails (non-zero exit) at `commit`.
    pub fn fail_at(mut self, commit: &str) -> Self {
        self.failures.insert(commit.to_string());
        self
    }

    /// The build preparation fails (non-zero exit) at `commit`.
    pub fn fail_prepare_at(mut self, commit: &str) -> Self {
        self.prepare_failures.insert(commit.to_string());
        self
    }

    /// Commits that were prepared, one entry per preparation.
    pub fn prepares(&self) -> Vec<String> {
        self.prepares.lock().unwrap().clone()
    }

    /// Commits at which tests were run, one entry per invocation.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn prepare(&self, _project: &Path) -> anyhow::Result<Option<StageResult>> {
        let commit = self.vcs.head();
        self.prepares.lock().unwrap().push(commit.clone());
        let failed = self.prepare_failures.contains(&commit);
        Ok(Some(StageResult {
            stage_name: "scripted_prepare".to_string(),
            exit_code: i32::from(failed),
            stdout: String::new(),
            stderr: if failed {
                format!("INSTALL FAILURE at {commit}")
            } else {
                String::new()
            },
            duration_ms: 1,
            success: !failed,
        }))
    }

    async fn run_tests(
        &self,
        project: &Path,
        _tests: Option<&[String]>,
    ) -> anyhow::Result<StageResult> {
        let commit = self.vcs.head();
        self.invocations.lock().unwrap().push(commit.clone());

        let reports_dir = project.join(TARGET_DIR).join(SUREFIRE_REPORTS_DIR);
        if reports_dir.exists() {
            std::fs::remove_dir_all(&reports_dir)?;
        }

        if self.failures.contains(&commit) {
            return Ok(StageResult {
                stage_name: "scripted".to_string(),
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("BUILD FAILURE at {commit}"),
                duration_ms: 1,
                success: false,
            });
        }

        std::fs::create_dir_all(&reports_dir)?;
        for (file_name, content) in self.reports.get(&commit).into_iter().flatten() {
            std::fs::write(reports_dir.join(file_name), content)?;
        }

        Ok(StageResult {
            stage_name: "scripted".to_string(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
            success: true,
        })
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Report sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub series: Vec<(String, TestSeries)>,
    pub statistics: Vec<BenchmarkStatistics>,
    pub salient: Option<SalientCommits>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn write_series(&mut self, test_name: &str, series: &TestSeries) -> anyhow::Result<()> {
        self.series.push((test_name.to_string(), series.clone()));
        Ok(())
    }

    fn write_benchmark_statistics(&mut self, stats: &BenchmarkStatistics) -> anyhow::Result<()> {
        self.statistics.push(stats.clone());
        Ok(())
    }

    fn write_salient_commits(&mut self, salient: &SalientCommits) -> anyhow::Result<()> {
        self.salient = Some(salient.clone());
        Ok(())
    }
}
