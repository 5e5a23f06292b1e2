//! Maven Surefire plain-text report discovery and parsing.
//!
//! Surefire writes one `<TestClass>.txt` per test class into
//! `target/surefire-reports/` of every module:
//!
//! ```text
//! -------------------------------------------------------------------------------
//! Test set: org.rascat.TermsOfSumTest
//! -------------------------------------------------------------------------------
//! Tests run: 1, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 0.049 s - in org.rascat.TermsOfSumTest
//! ```

use perfdelta_core::TestReport;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::collab::{ParseError, ReportParser};

/// Build output directory of a Maven module.
pub const TARGET_DIR: &str = "target";

/// Surefire report directory inside [`TARGET_DIR`].
pub const SUREFIRE_REPORTS_DIR: &str = "surefire-reports";

fn summary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"Tests run:\s*(\d+),\s*Failures:\s*(\d+),\s*Errors:\s*(\d+),\s*Skipped:\s*(\d+),\s*Time elapsed:\s*([0-9][0-9.,]*)\s*(?:s|sec)\b(?:.*?\s-\s*in\s+(\S+))?",
        )
        .expect("valid surefire summary pattern")
    })
}

fn test_set_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Test set:\s*(\S+)").expect("valid test set pattern"))
}

/// Parser for Surefire `.txt` reports.
#[derive(Debug, Clone, Default)]
pub struct SurefireParser;

impl SurefireParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the text of one report. `path` is only used for error context.
    pub fn parse_str(&self, path: &Path, content: &str) -> Result<TestReport, ParseError> {
        let format_error = |message: &str| ParseError::Format {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        let caps = summary_pattern()
            .captures(content)
            .ok_or_else(|| format_error("no `Tests run:` summary line"))?;

        let count = |i: usize| -> Result<u32, ParseError> {
            caps[i]
                .parse::<u32>()
                .map_err(|e| format_error(&format!("bad count {:?}: {e}", &caps[i])))
        };
        let tests_run = count(1)?;
        let failures = count(2)?;
        let errors = count(3)?;
        let skipped = count(4)?;

        let time_elapsed = parse_elapsed(&caps[5])
            .ok_or_else(|| format_error(&format!("bad elapsed time {:?}", &caps[5])))?;

        let test_name = caps
            .get(6)
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                test_set_pattern()
                    .captures(content)
                    .map(|c| c[1].to_string())
            })
            .ok_or_else(|| format_error("no test name"))?;

        TestReport::new(test_name, tests_run, failures, errors, skipped, time_elapsed).map_err(
            |source| ParseError::Invalid {
                path: path.to_path_buf(),
                source,
            },
        )
    }
}

/// Parse a Surefire elapsed time.
///
/// A comma is only accepted as a thousands separator in front of a `.`
/// decimal part (`1,234.5`). A comma decimal (`0,049`) is rejected rather
/// than read as a different number.
fn parse_elapsed(raw: &str) -> Option<f64> {
    if !raw.contains(',') {
        return raw.parse().ok();
    }
    let (int_part, fraction) = raw.split_once('.')?;
    let mut groups = int_part.split(',');
    let lead = groups.next()?;
    let lead_ok = (1..=3).contains(&lead.len()) && !lead.starts_with('0');
    if !lead_ok || !groups.all(|g| g.len() == 3) {
        return None;
    }
    format!("{}.{fraction}", int_part.replace(',', "")).parse().ok()
}

impl ReportParser for SurefireParser {
    fn discover(&self, project: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut reports = Vec::new();
        find_reports(project, &mut reports)?;
        reports.sort();
        Ok(reports)
    }

    fn parse(&self, path: &Path) -> Result<TestReport, ParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(path, &content)
    }
}

/// Walk `dir` for `target/surefire-reports/*.txt`, skipping hidden
/// directories and everything else under `target/`.
fn find_reports(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        if name == TARGET_DIR {
            collect_txt(&path.join(SUREFIRE_REPORTS_DIR), out)?;
        } else {
            find_reports(&path, out)?;
        }
    }
    Ok(())
}

fn collect_txt(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "txt").unwrap_or(false) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
-------------------------------------------------------------------------------
Test set: org.rascat.TermsOfSumTest
-------------------------------------------------------------------------------
Tests run: 1, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 0.049 s - in org.rascat.TermsOfSumTest
";

    fn parse(content: &str) -> Result<TestReport, ParseError> {
        SurefireParser::new().parse_str(Path::new("r.txt"), content)
    }

    #[test]
    fn parses_standard_report() {
        let report = parse(REPORT).unwrap();
        assert_eq!(report.test_name(), "org.rascat.TermsOfSumTest");
        assert_eq!(report.tests_run(), 1);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.skipped(), 0);
        assert_eq!(report.time_elapsed(), 0.049);
    }

    #[test]
    fn parses_failure_report_with_sec_unit() {
        let content = "\
-------------------------------------------------------------------------------
Test set: org.a.FooTest
-------------------------------------------------------------------------------
Tests run: 4, Failures: 1, Errors: 2, Skipped: 1, Time elapsed: 1,234.5 sec <<< FAILURE! - in org.a.FooTest
org.a.FooTest.bar  Time elapsed: 0.01 sec  <<< FAILURE!
";
        let report = parse(content).unwrap();
        assert_eq!(report.test_name(), "org.a.FooTest");
        assert_eq!(report.tests_run(), 4);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.errors(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.time_elapsed(), 1234.5);
    }

    #[test]
    fn comma_decimal_time_is_format_error() {
        let content = "Tests run: 1, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 0,049 s - in org.a.FooTest\n";
        let err = parse(content).unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));
        assert!(err.to_string().contains("0,049"));
    }

    #[test]
    fn elapsed_time_grouping() {
        assert_eq!(parse_elapsed("0.049"), Some(0.049));
        assert_eq!(parse_elapsed("12"), Some(12.0));
        assert_eq!(parse_elapsed("1,234.5"), Some(1234.5));
        assert_eq!(parse_elapsed("12,345,678.25"), Some(12345678.25));
        assert_eq!(parse_elapsed("0,049"), None);
        assert_eq!(parse_elapsed("1,234"), None);
        assert_eq!(parse_elapsed("1,23.4"), None);
        assert_eq!(parse_elapsed("0,123.4"), None);
    }

    #[test]
    fn falls_back_to_test_set_header() {
        let content = "Test set: org.a.BarTest\nTests run: 2, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 3 s\n";
        let report = parse(content).unwrap();
        assert_eq!(report.test_name(), "org.a.BarTest");
        assert_eq!(report.time_elapsed(), 3.0);
    }

    #[test]
    fn rejects_report_without_summary() {
        let err = parse("Test set: org.a.BarTest\nsomething else\n").unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));
    }

    #[test]
    fn rejects_report_without_name() {
        let err = parse("Tests run: 2, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 3 s\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SurefireParser::new()
            .parse(Path::new("/nonexistent/report.txt"))
            .unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn discovers_reports_across_modules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for module in ["", "core", "web/api"] {
            let reports = root.join(module).join(TARGET_DIR).join(SUREFIRE_REPORTS_DIR);
            std::fs::create_dir_all(&reports).unwrap();
            std::fs::write(reports.join("A.txt"), REPORT).unwrap();
            std::fs::write(reports.join("A.xml"), "<xml/>").unwrap();
        }
        // not a surefire directory
        let classes = root.join("core").join(TARGET_DIR).join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("notes.txt"), "").unwrap();
        // hidden directories are skipped
        let hidden = root.join(".git").join(TARGET_DIR).join(SUREFIRE_REPORTS_DIR);
        std::fs::create_dir_all(&hidden).unwrap();
        std::fs::write(hidden.join("B.txt"), REPORT).unwrap();

        let found = SurefireParser::new().discover(root).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| p.extension().unwrap() == "txt"));
        assert!(found.iter().all(|p| p.parent().unwrap().ends_with(SUREFIRE_REPORTS_DIR)));
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
    }

    #[test]
    fn discover_on_missing_project_is_empty() {
        let found = SurefireParser::new()
            .discover(Path::new("/nonexistent/project"))
            .unwrap();
        assert!(found.is_empty());
    }
}
