//! Flags commits whose runtime change crossed a threshold.

use std::collections::BTreeMap;

use crate::config::DeltaMode;
use crate::domain::{BenchmarkStatistics, CommitId, CommitStatistics, SalientEntry};

/// Salient entries keyed by commit. Entries under one commit keep the order
/// in which they were discovered.
pub type SalientCommits = BTreeMap<CommitId, Vec<SalientEntry>>;

/// Whether one commit comparison crosses either threshold of its series.
pub fn is_salient(stats: &CommitStatistics, bench: &BenchmarkStatistics, mode: DeltaMode) -> bool {
    mode.magnitude(stats.runtime_delta) > bench.delta_threshold
        || stats.speedup > bench.speedup_threshold
}

/// Collect every salient commit across all benchmarks.
///
/// Each benchmark is judged against the thresholds embedded in it.
pub fn find_salient_commits<'a, I>(benchmarks: I, mode: DeltaMode) -> SalientCommits
where
    I: IntoIterator<Item = &'a BenchmarkStatistics>,
{
    let mut result = SalientCommits::new();
    for bench in benchmarks {
        for stats in bench.commits.iter().filter(|c| is_salient(c, bench, mode)) {
            result
                .entry(stats.commit.clone())
                .or_default()
                .push(SalientEntry {
                    commit: stats.commit.clone(),
                    test_name: bench.test_name.clone(),
                    runtime_delta: stats.runtime_delta,
                    speedup: stats.speedup,
                });
        }
    }
    result
}
