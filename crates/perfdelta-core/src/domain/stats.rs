//! Derived statistics and salience results.

use serde::{Deserialize, Serialize};

use super::record::CommitId;

/// Runtime comparison between a commit and the next older commit of the same
/// test series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitStatistics {
    /// The newer commit of the pair.
    #[serde(rename = "hexsha")]
    pub commit: CommitId,
    /// Elapsed time at `commit`.
    pub runtime: f64,
    /// `runtime / older runtime`, or `0.0` when the older runtime is zero.
    pub speedup: f64,
    /// `runtime - older runtime`. Positive means `commit` got slower.
    pub runtime_delta: f64,
}

/// Statistics over the whole history of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub test_name: String,
    /// Sample standard deviation of all runtimes; `0.0` below two samples.
    pub std_dev: f64,
    pub delta_threshold: f64,
    pub speedup_threshold: f64,
    /// One entry per adjacent pair, newest first.
    pub commits: Vec<CommitStatistics>,
}

/// One commit flagged for one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalientEntry {
    #[serde(rename = "hexsha")]
    pub commit: CommitId,
    pub test_name: String,
    pub runtime_delta: f64,
    pub speedup: f64,
}
