//! Per-test runtime statistics across commits.
//!
//! Every series is ordered newest commit first. Each commit is compared with
//! the next older one, so a positive `runtime_delta` means the newer commit
//! is slower. Reordering a series flips the sign and meaning of every value.

use crate::config::Thresholds;
use crate::domain::{BenchmarkStatistics, CommitId, CommitStatistics, TestSeries};

/// Compute the statistics of one series.
///
/// Thresholds are copied into the result untouched; interpreting them is the
/// salience filter's job.
pub fn compute_statistics(series: &TestSeries, thresholds: Thresholds) -> BenchmarkStatistics {
    let runtimes: Vec<f64> = series.runtimes().collect();
    let records = series.records();

    let commits = records
        .windows(2)
        .map(|pair| {
            let (current, next) = (&pair[0], &pair[1]);
            compare(current.commit.clone(), current.time_elapsed(), next.time_elapsed())
        })
        .collect();

    BenchmarkStatistics {
        test_name: series.test_name().to_string(),
        std_dev: sample_std_dev(&runtimes),
        delta_threshold: thresholds.delta_threshold,
        speedup_threshold: thresholds.speedup_threshold,
        commits,
    }
}

fn compare(commit: CommitId, runtime: f64, older: f64) -> CommitStatistics {
    CommitStatistics {
        commit,
        runtime,
        speedup: speedup(runtime, older),
        runtime_delta: runtime - older,
    }
}

/// `current / older`, defined as `0.0` when `older` is exactly zero.
pub fn speedup(current: f64, older: f64) -> f64 {
    if older == 0.0 {
        0.0
    } else {
        current / older
    }
}

/// Bessel-corrected sample standard deviation; `0.0` below two samples.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}
