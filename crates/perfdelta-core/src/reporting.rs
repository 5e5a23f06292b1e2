//! Persistence and rendering of series, statistics and salient commits.
//!
//! A [`ReportSink`] receives results at the end of a run. [`DirectorySink`]
//! writes one artifact per test into a results directory; [`StreamSink`]
//! renders everything to a writer (stdout when no destination is set).

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BenchmarkStatistics, TestSeries};
use crate::salience::SalientCommits;

/// Subdirectory of a results directory holding statistics artifacts.
pub const STATISTICS_DIR: &str = "statistics";

/// Base name of the salient commits artifacts.
pub const SALIENT_COMMITS_FILE: &str = "salient_commits";

/// Destination for pipeline results.
pub trait ReportSink {
    /// Persist the raw record history of one test.
    fn write_series(&mut self, test_name: &str, series: &TestSeries) -> Result<()>;

    /// Persist the statistics of one test.
    fn write_benchmark_statistics(&mut self, stats: &BenchmarkStatistics) -> Result<()>;

    /// Persist the salient commits of the whole run.
    fn write_salient_commits(&mut self, salient: &SalientCommits) -> Result<()>;
}

/// Persisted form of the salient commits map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalientCommitsArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub branch: String,
    pub commits: SalientCommits,
}

impl SalientCommitsArtifact {
    pub fn new(branch: &str, commits: SalientCommits) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            generated_at: Utc::now(),
            branch: branch.to_string(),
            commits,
        }
    }
}

/// Writes artifacts below a results directory:
///
/// - `<root>/<test_name>.json`: record series
/// - `<root>/statistics/<test_name>` and `<test_name>.json`: statistics
/// - `<root>/statistics/salient_commits.txt` and `.json`
///
/// Directories are created on the first write, so a run that fails before
/// producing results leaves nothing behind.
pub struct DirectorySink {
    root: PathBuf,
    branch: String,
}

impl DirectorySink {
    /// Create the sink. Fails if `root` exists and is not a directory.
    pub fn create(root: impl AsRef<Path>, branch: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() && !root.is_dir() {
            anyhow::bail!("results path {:?} is not a directory", root);
        }
        Ok(Self {
            root,
            branch: branch.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stats_dir(&self) -> Result<PathBuf> {
        let dir = self.root.join(STATISTICS_DIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create results directory {:?}", dir))?;
        Ok(dir)
    }
}

impl ReportSink for DirectorySink {
    fn write_series(&mut self, test_name: &str, series: &TestSeries) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create results directory {:?}", self.root))?;
        let path = self.root.join(format!("{}.json", artifact_name(test_name)));
        write_json(&path, series)
    }

    fn write_benchmark_statistics(&mut self, stats: &BenchmarkStatistics) -> Result<()> {
        let name = artifact_name(&stats.test_name);
        let stats_dir = self.stats_dir()?;
        let text_path = stats_dir.join(&name);
        std::fs::write(&text_path, render_benchmark_statistics(stats))
            .with_context(|| format!("write {:?}", text_path))?;
        write_json(&stats_dir.join(format!("{name}.json")), stats)
    }

    fn write_salient_commits(&mut self, salient: &SalientCommits) -> Result<()> {
        let stats_dir = self.stats_dir()?;
        let text_path = stats_dir.join(format!("{SALIENT_COMMITS_FILE}.txt"));
        std::fs::write(&text_path, render_salient_commits(salient, &self.branch))
            .with_context(|| format!("write {:?}", text_path))?;

        let artifact = SalientCommitsArtifact::new(&self.branch, salient.clone());
        write_json(&stats_dir.join(format!("{SALIENT_COMMITS_FILE}.json")), &artifact)
    }
}

/// Renders every artifact as text into a writer.
pub struct StreamSink<W: Write> {
    out: W,
    branch: String,
}

impl StreamSink<std::io::Stdout> {
    pub fn stdout(branch: impl Into<String>) -> Self {
        Self::new(std::io::stdout(), branch)
    }
}

impl<W: Write> StreamSink<W> {
    pub fn new(out: W, branch: impl Into<String>) -> Self {
        Self {
            out,
            branch: branch.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for StreamSink<W> {
    fn write_series(&mut self, test_name: &str, series: &TestSeries) -> Result<()> {
        let json = serde_json::to_string_pretty(series).context("serialize series")?;
        writeln!(self.out, "# {test_name}\n{json}\n").context("write series")?;
        Ok(())
    }

    fn write_benchmark_statistics(&mut self, stats: &BenchmarkStatistics) -> Result<()> {
        writeln!(self.out, "{}", render_benchmark_statistics(stats)).context("write statistics")?;
        Ok(())
    }

    fn write_salient_commits(&mut self, salient: &SalientCommits) -> Result<()> {
        write!(self.out, "{}", render_salient_commits(salient, &self.branch))
            .context("write salient commits")?;
        self.out.flush().context("flush output")?;
        Ok(())
    }
}

/// Write a value as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("serialize artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// File-system safe artifact name for a test.
///
/// Path separators, `:` and NUL are percent-encoded, as is `%` itself, so
/// distinct test names always map to distinct file names.
pub fn artifact_name(test_name: &str) -> String {
    let mut name = String::with_capacity(test_name.len());
    for c in test_name.chars() {
        match c {
            '%' | '/' | '\\' | ':' | '\0' => name.push_str(&format!("%{:02X}", c as u32)),
            other => name.push(other),
        }
    }
    name
}

/// Render the statistics of one test: header plus a table of commits.
pub fn render_benchmark_statistics(stats: &BenchmarkStatistics) -> String {
    let mut out = format!(
        "{}\n\nStd deviation: {}\nDelta threshold: {}\nSpeedup threshold: {}\n\n",
        stats.test_name, stats.std_dev, stats.delta_threshold, stats.speedup_threshold
    );

    let rows: Vec<[String; 4]> = stats
        .commits
        .iter()
        .map(|c| {
            [
                c.commit.to_string(),
                format_number(c.runtime),
                format_number(c.speedup),
                format_number(c.runtime_delta),
            ]
        })
        .collect();
    out.push_str(&render_table(
        ["hexsha", "runtime", "speedup", "runtime_delta"],
        &rows,
    ));
    out
}

/// Render the salient commits, one table per commit.
pub fn render_salient_commits(salient: &SalientCommits, branch: &str) -> String {
    let mut out = format!(
        "The following commits introduced changes that changed the runtime of some test \
         classes on branch {branch}.\n\n"
    );
    if salient.is_empty() {
        out.push_str("No salient commits.\n");
        return out;
    }

    for (commit, entries) in salient {
        out.push_str(&format!("{commit}:\n\n"));
        let rows: Vec<[String; 3]> = entries
            .iter()
            .map(|e| {
                [
                    e.test_name.clone(),
                    format_number(e.runtime_delta),
                    format_number(e.speedup),
                ]
            })
            .collect();
        out.push_str(&render_table(["test_name", "runtime_delta", "speedup"], &rows));
        out.push_str("\n\n");
    }
    out
}

fn format_number(v: f64) -> String {
    format!("{v:.3}")
}

/// Left-aligned first column, right-aligned numeric columns.
fn render_table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i == 0 {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut lines = vec![
        line(&headers),
        line(&rule.iter().map(String::as_str).collect::<Vec<_>>()),
    ];
    for row in rows {
        lines.push(line(&row.iter().map(String::as_str).collect::<Vec<_>>()));
    }
    lines.join("\n")
}
