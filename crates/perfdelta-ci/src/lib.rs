//! perfdelta CI - commit traversal and test execution
//!
//! Provides the pipeline that:
//! - Resolves a commit selection against a branch
//! - Checks out each commit and runs the test suite through Maven
//! - Collects Surefire reports and hands them to the analysis in
//!   `perfdelta-core`

pub mod checkout;
pub mod collab;
pub mod fakes;
pub mod maven;
pub mod pipeline;
pub mod runner;
pub mod selection;
pub mod stage;
pub mod surefire;

// Re-export key types
pub use checkout::CheckoutGuard;
pub use collab::{ParseError, ReportParser, TestExecutor};
pub use maven::MavenExecutor;
pub use pipeline::{
    ExecutionFailure, PerfPipeline, PipelineError, PipelineOutcome, PipelineRequest,
    SkippedReport, Stage,
};
pub use runner::{CiRunner, StageResult};
pub use selection::{CommitSelection, SelectionError};
pub use stage::StageConfig;
pub use surefire::SurefireParser;
