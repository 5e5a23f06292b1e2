//! Aggregation of collected records into statistics and salient commits,
//! and offline re-analysis of a results directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::domain::{BenchmarkStatistics, PerfError, ReportRecord, TestSeries};
use crate::obs;
use crate::reporting::ReportSink;
use crate::salience::{find_salient_commits, SalientCommits};
use crate::series::{flatten, group_by_test_name};
use crate::statistics::compute_statistics;

/// Everything derived from one set of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub series: BTreeMap<String, TestSeries>,
    pub statistics: Vec<BenchmarkStatistics>,
    pub salient: SalientCommits,
}

impl Analysis {
    /// Group records (newest commit first), compute per-test statistics and
    /// find salient commits.
    pub fn from_records<I>(records: I, config: &AnalysisConfig) -> Self
    where
        I: IntoIterator<Item = ReportRecord>,
    {
        Self::from_series(group_by_test_name(records), config)
    }

    pub fn from_series(series: BTreeMap<String, TestSeries>, config: &AnalysisConfig) -> Self {
        let statistics: Vec<BenchmarkStatistics> = series
            .values()
            .map(|s| compute_statistics(s, config.thresholds))
            .collect();
        let salient = find_salient_commits(&statistics, config.delta_mode);

        for entry in salient.values().flatten() {
            obs::emit_salient_commit(
                entry.commit.as_str(),
                &entry.test_name,
                entry.runtime_delta,
                entry.speedup,
            );
        }

        Self {
            series,
            statistics,
            salient,
        }
    }

    /// Total number of records across all series.
    pub fn record_count(&self) -> usize {
        self.series.values().map(TestSeries::len).sum()
    }

    /// Write series, statistics and salient commits.
    pub fn persist(&self, sink: &mut dyn ReportSink) -> Result<()> {
        for (name, series) in &self.series {
            sink.write_series(name, series)?;
        }
        self.persist_statistics(sink)
    }

    /// Write statistics and salient commits only.
    pub fn persist_statistics(&self, sink: &mut dyn ReportSink) -> Result<()> {
        for stats in &self.statistics {
            sink.write_benchmark_statistics(stats)?;
        }
        sink.write_salient_commits(&self.salient)
    }
}

/// Top-level `*.json` files of a results directory, sorted by name.
pub fn result_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every series file of a results directory.
///
/// A file that is not a valid series is skipped with a warning. Fails when
/// the directory holds no JSON files at all.
pub fn load_results_dir(dir: &Path) -> crate::domain::Result<Vec<TestSeries>> {
    let files = result_files(dir)?;
    if files.is_empty() {
        return Err(PerfError::NoResults(dir.display().to_string()));
    }

    let mut loaded = Vec::with_capacity(files.len());
    for path in files {
        let parsed = std::fs::read_to_string(&path)
            .map_err(PerfError::from)
            .and_then(|raw| serde_json::from_str::<TestSeries>(&raw).map_err(PerfError::from));
        match parsed {
            Ok(series) => loaded.push(series),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable series file"),
        }
    }
    Ok(loaded)
}

/// Recompute statistics for a results directory written by an earlier run
/// and persist them to `sink`.
pub fn analyze_results_dir(
    dir: &Path,
    config: &AnalysisConfig,
    sink: &mut dyn ReportSink,
) -> Result<Analysis> {
    let loaded = load_results_dir(dir).with_context(|| format!("load results from {:?}", dir))?;
    info!(dir = %dir.display(), series = loaded.len(), "analyzing stored results");

    let analysis = Analysis::from_records(flatten(loaded), config);
    analysis.persist_statistics(sink)?;
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::domain::{CommitId, TestReport};
    use crate::reporting::{write_json, DirectorySink, STATISTICS_DIR};

    fn record(commit: &str, name: &str, t: f64) -> ReportRecord {
        ReportRecord::new(
            CommitId::from(commit),
            TestReport::new(name, 1, 0, 0, 0, t).unwrap(),
        )
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            thresholds: Thresholds::new(2.0, 1.5),
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn from_records_runs_whole_aggregation() {
        let records = vec![
            record("c3", "A", 10.0),
            record("c3", "B", 1.0),
            record("c2", "A", 5.0),
            record("c2", "B", 1.0),
            record("c1", "A", 5.0),
        ];
        let analysis = Analysis::from_records(records, &config());

        assert_eq!(analysis.series.len(), 2);
        assert_eq!(analysis.record_count(), 5);
        assert_eq!(analysis.statistics.len(), 2);
        assert_eq!(analysis.salient.len(), 1);
        assert_eq!(analysis.salient[&CommitId::from("c3")][0].test_name, "A");
    }

    #[test]
    fn load_results_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let series = TestSeries::new(vec![record("c2", "A", 2.0), record("c1", "A", 1.0)]).unwrap();
        write_json(&dir.path().join("A.json"), &series).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_results_dir(dir.path()).unwrap();
        assert_eq!(loaded, vec![series]);
    }

    #[test]
    fn load_results_dir_without_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_results_dir(dir.path()).unwrap_err();
        assert!(matches!(err, PerfError::NoResults(_)));
    }

    #[test]
    fn analyze_results_dir_writes_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let series = TestSeries::new(vec![
            record("c3", "A", 10.0),
            record("c2", "A", 5.0),
            record("c1", "A", 5.0),
        ])
        .unwrap();
        write_json(&dir.path().join("A.json"), &series).unwrap();

        let mut sink = DirectorySink::create(dir.path(), "main").unwrap();
        let analysis = analyze_results_dir(dir.path(), &config(), &mut sink).unwrap();

        assert_eq!(analysis.statistics[0].commits.len(), 2);
        let stats_dir = dir.path().join(STATISTICS_DIR);
        assert!(stats_dir.join("A").is_file());
        assert!(stats_dir.join("salient_commits.txt").is_file());

        // statistics live below statistics/, so a second pass sees the same input
        let again = analyze_results_dir(dir.path(), &config(), &mut sink).unwrap();
        assert_eq!(again, analysis);
    }
}
