//! Domain models for perfdelta.
//!
//! Canonical definitions for the core entities:
//! - `ReportRecord`: one parsed test report tagged with its commit
//! - `TestSeries`: the newest-first history of one test
//! - `BenchmarkStatistics`: per-test runtime deltas and speedups
//! - `SalientEntry`: a commit flagged for one test

pub mod error;
pub mod record;
pub mod stats;

pub use error::{PerfError, Result, ValidationError};
pub use record::{CommitId, ReportRecord, TestReport, TestSeries};
pub use stats::{BenchmarkStatistics, CommitStatistics, SalientEntry};
