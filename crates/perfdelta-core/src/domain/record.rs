//! Commit identifiers, parsed test reports and per-test series.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Opaque revision identifier.
///
/// Ordering between commits is defined by version-control history, never by
/// this type; the derived `Ord` exists only so commits can key sorted maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        CommitId(id.into())
    }

    /// Return the full identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 chars), for log lines and table headers.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CommitId {
    fn from(id: String) -> Self {
        CommitId(id)
    }
}

impl From<&str> for CommitId {
    fn from(id: &str) -> Self {
        CommitId(id.to_string())
    }
}

/// Execution counts and elapsed time of one test suite, as read from a
/// single report artifact.
///
/// Serialized field names are an external contract (`test_run`, not
/// `tests_run`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TestReportFields")]
pub struct TestReport {
    #[serde(rename = "test_run")]
    tests_run: u32,
    failures: u32,
    errors: u32,
    skipped: u32,
    time_elapsed: f64,
    test_name: String,
}

#[derive(Deserialize)]
struct TestReportFields {
    test_run: u32,
    failures: u32,
    errors: u32,
    skipped: u32,
    time_elapsed: f64,
    test_name: String,
}

impl TryFrom<TestReportFields> for TestReport {
    type Error = ValidationError;

    fn try_from(f: TestReportFields) -> std::result::Result<Self, Self::Error> {
        TestReport::new(
            f.test_name,
            f.test_run,
            f.failures,
            f.errors,
            f.skipped,
            f.time_elapsed,
        )
    }
}

impl TestReport {
    /// Build a report, rejecting empty names and negative or non-finite times.
    pub fn new(
        test_name: impl Into<String>,
        tests_run: u32,
        failures: u32,
        errors: u32,
        skipped: u32,
        time_elapsed: f64,
    ) -> std::result::Result<Self, ValidationError> {
        let test_name = test_name.into();
        if test_name.trim().is_empty() {
            return Err(ValidationError::EmptyTestName);
        }
        if !time_elapsed.is_finite() || time_elapsed < 0.0 {
            return Err(ValidationError::InvalidTimeElapsed(time_elapsed));
        }
        Ok(Self {
            tests_run,
            failures,
            errors,
            skipped,
            time_elapsed,
            test_name,
        })
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn tests_run(&self) -> u32 {
        self.tests_run
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Wall-clock seconds spent in the suite.
    pub fn time_elapsed(&self) -> f64 {
        self.time_elapsed
    }
}

/// A [`TestReport`] tagged with the commit it was produced at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub commit: CommitId,
    pub report: TestReport,
}

impl ReportRecord {
    pub fn new(commit: CommitId, report: TestReport) -> Self {
        Self { commit, report }
    }

    pub fn test_name(&self) -> &str {
        self.report.test_name()
    }

    pub fn time_elapsed(&self) -> f64 {
        self.report.time_elapsed()
    }
}

/// The history of one test across the selected commits, newest commit first.
///
/// A series is never empty and every record shares the same test name; both
/// are checked on construction, so statistics code can index `records()[0]`
/// without guarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ReportRecord>", into = "Vec<ReportRecord>")]
pub struct TestSeries {
    records: Vec<ReportRecord>,
}

impl TestSeries {
    /// Build a series from records already ordered newest-first.
    pub fn new(records: Vec<ReportRecord>) -> std::result::Result<Self, ValidationError> {
        let first = records.first().ok_or(ValidationError::EmptySeries)?;
        let expected = first.test_name();
        if let Some(other) = records.iter().find(|r| r.test_name() != expected) {
            return Err(ValidationError::MixedSeries {
                expected: expected.to_string(),
                found: other.test_name().to_string(),
            });
        }
        Ok(Self { records })
    }

    /// Start a series with a single record.
    pub fn single(record: ReportRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// Append an older record. Fails if the record belongs to another test.
    pub fn push(&mut self, record: ReportRecord) -> std::result::Result<(), ValidationError> {
        if record.test_name() != self.test_name() {
            return Err(ValidationError::MixedSeries {
                expected: self.test_name().to_string(),
                found: record.test_name().to_string(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn test_name(&self) -> &str {
        self.records[0].test_name()
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Elapsed times in series order.
    pub fn runtimes(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(ReportRecord::time_elapsed)
    }

    pub fn into_records(self) -> Vec<ReportRecord> {
        self.records
    }
}

impl TryFrom<Vec<ReportRecord>> for TestSeries {
    type Error = ValidationError;

    fn try_from(records: Vec<ReportRecord>) -> std::result::Result<Self, Self::Error> {
        TestSeries::new(records)
    }
}

impl From<TestSeries> for Vec<ReportRecord> {
    fn from(series: TestSeries) -> Self {
        series.records
    }
}
