//! Collaborator seams for test execution and report parsing.
//!
//! The pipeline drives these through trait objects so it can be exercised
//! against scripted fakes (see [`crate::fakes`]).

use async_trait::async_trait;
use perfdelta_core::{TestReport, ValidationError};
use std::path::{Path, PathBuf};

use crate::runner::StageResult;

/// Runs the project's test suite once.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Build step run once per checked-out commit, before its test
    /// invocations. `Ok(None)` means there is nothing to prepare.
    async fn prepare(&self, _project: &Path) -> anyhow::Result<Option<StageResult>> {
        Ok(None)
    }

    /// Run the tests of `project`, optionally restricted to `tests`.
    ///
    /// An `Err` means the step could not be run at all (spawn failure,
    /// timeout); a non-passing [`StageResult`] means it ran and failed.
    async fn run_tests(
        &self,
        project: &Path,
        tests: Option<&[String]>,
    ) -> anyhow::Result<StageResult>;
}

/// Errors raised while reading one report artifact.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("cannot read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {path} does not match the expected format: {message}")]
    Format { path: PathBuf, message: String },

    #[error("report {path} holds invalid values: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// Finds and parses the report artifacts a test run leaves behind.
pub trait ReportParser: Send + Sync {
    /// All report artifacts below `project`, across every sub-module, in a
    /// stable order.
    fn discover(&self, project: &Path) -> std::io::Result<Vec<PathBuf>>;

    /// Parse one artifact.
    fn parse(&self, path: &Path) -> Result<TestReport, ParseError>;
}
