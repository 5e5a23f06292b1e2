//! perfdelta Core Library
//!
//! Report records, per-test runtime statistics across commits, salience
//! detection, git access and result persistence.

pub mod analysis;
pub mod config;
pub mod domain;
pub mod git;
pub mod obs;
pub mod reporting;
pub mod salience;
pub mod series;
pub mod statistics;
pub mod telemetry;
pub mod vcs;

pub use analysis::{analyze_results_dir, load_results_dir, Analysis};
pub use config::{AnalysisConfig, DeltaMode, PartialResultsPolicy, Thresholds};
pub use domain::{
    BenchmarkStatistics, CommitId, CommitStatistics, PerfError, ReportRecord, Result,
    SalientEntry, TestReport, TestSeries, ValidationError,
};
pub use git::{capture_head_sha, is_git_repo, GitRepository};
pub use obs::run_span;
pub use reporting::{DirectorySink, ReportSink, SalientCommitsArtifact, StreamSink};
pub use salience::{find_salient_commits, is_salient, SalientCommits};
pub use series::group_by_test_name;
pub use statistics::compute_statistics;
pub use telemetry::init_tracing;
pub use vcs::{VcsError, VersionControl};

/// perfdelta version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
