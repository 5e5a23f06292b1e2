//! Analysis configuration.
//!
//! Thresholds and policies are plain values handed to the statistics engine
//! and salience filter at call time. [`AnalysisConfig`] can be loaded from a
//! TOML file; the CLI layers flags and environment variables on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{PerfError, Result, ValidationError};

/// Default seconds a runtime may move before a commit is flagged.
pub const DEFAULT_DELTA_THRESHOLD: f64 = 2.0;

/// Default runtime ratio (newer / older) above which a commit is flagged.
pub const DEFAULT_SPEEDUP_THRESHOLD: f64 = 2.0;

/// Name of the directory, next to the project, that receives results.
pub const RESULTS_DIRECTORY: &str = "perfdelta-results";

/// Salience thresholds, carried through into every `BenchmarkStatistics`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub delta_threshold: f64,
    pub speedup_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            speedup_threshold: DEFAULT_SPEEDUP_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(delta_threshold: f64, speedup_threshold: f64) -> Self {
        Self {
            delta_threshold,
            speedup_threshold,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for (name, value) in [
            ("delta_threshold", self.delta_threshold),
            ("speedup_threshold", self.speedup_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// How a runtime delta is compared against the delta threshold.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeltaMode {
    /// `|delta| > threshold`: slowdowns and speedups are both flagged.
    #[default]
    Absolute,
    /// `delta > threshold`: only slowdowns are flagged by delta.
    Signed,
}

impl DeltaMode {
    /// The value compared against the delta threshold.
    pub fn magnitude(self, runtime_delta: f64) -> f64 {
        match self {
            DeltaMode::Absolute => runtime_delta.abs(),
            DeltaMode::Signed => runtime_delta,
        }
    }
}

impl std::str::FromStr for DeltaMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute" | "abs" => Ok(DeltaMode::Absolute),
            "signed" => Ok(DeltaMode::Signed),
            other => Err(format!("unknown delta mode: {other} (expected absolute|signed)")),
        }
    }
}

/// What happens to already collected records when a run aborts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartialResultsPolicy {
    /// Aggregate and persist what was collected before the failure.
    #[default]
    Keep,
    /// Drop everything collected so far.
    Discard,
}

/// Full analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub thresholds: Thresholds,
    pub delta_mode: DeltaMode,
    pub partial_results: PartialResultsPolicy,
    /// Test runs per commit.
    pub invocations: u32,
    /// Per-invocation timeout in seconds (0 = no timeout).
    pub stage_timeout_secs: u64,
    /// Where artifacts are written; `None` means next to the project.
    pub results_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            delta_mode: DeltaMode::default(),
            partial_results: PartialResultsPolicy::default(),
            invocations: 1,
            stage_timeout_secs: 0,
            results_dir: None,
        }
    }
}

impl AnalysisConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AnalysisConfig =
            toml::from_str(raw).map_err(|e| PerfError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| PerfError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.thresholds.validate()?;
        if self.invocations == 0 {
            return Err(ValidationError::ZeroInvocations);
        }
        Ok(())
    }

    /// Results directory for a project: the configured one, or
    /// `<parent of project>/perfdelta-results`.
    pub fn results_dir_for(&self, project: &Path) -> PathBuf {
        if let Some(dir) = &self.results_dir {
            return dir.clone();
        }
        default_results_dir(project)
    }
}

/// `<parent of project>/perfdelta-results`, or `./perfdelta-results` when the
/// project has no parent.
pub fn default_results_dir(project: &Path) -> PathBuf {
    let absolute = std::path::absolute(project).unwrap_or_else(|_| project.to_path_buf());
    match absolute.parent() {
        Some(parent) => parent.join(RESULTS_DIRECTORY),
        None => PathBuf::from(RESULTS_DIRECTORY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.thresholds.delta_threshold, 2.0);
        assert_eq!(config.thresholds.speedup_threshold, 2.0);
        assert_eq!(config.delta_mode, DeltaMode::Absolute);
        assert_eq!(config.partial_results, PartialResultsPolicy::Keep);
        assert_eq!(config.invocations, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_delta_mode_magnitude() {
        assert_eq!(DeltaMode::Absolute.magnitude(-3.0), 3.0);
        assert_eq!(DeltaMode::Signed.magnitude(-3.0), -3.0);
        assert_eq!("Signed".parse::<DeltaMode>().unwrap(), DeltaMode::Signed);
        assert!("both".parse::<DeltaMode>().is_err());
    }

    #[test]
    fn test_from_toml_partial_document() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            delta_mode = "signed"
            invocations = 3

            [thresholds]
            speedup_threshold = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.delta_mode, DeltaMode::Signed);
        assert_eq!(config.invocations, 3);
        assert_eq!(config.thresholds.speedup_threshold, 1.5);
        assert_eq!(config.thresholds.delta_threshold, DEFAULT_DELTA_THRESHOLD);
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        assert!(AnalysisConfig::from_toml_str("invocations = 0").is_err());
        assert!(AnalysisConfig::from_toml_str("[thresholds]\ndelta_threshold = -1.0").is_err());
        assert!(AnalysisConfig::from_toml_str("delta_mode = \"sideways\"").is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perfdelta.toml");
        std::fs::write(&path, "partial_results = \"discard\"\n").unwrap();

        let config = AnalysisConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.partial_results, PartialResultsPolicy::Discard);
    }

    #[test]
    fn test_results_dir_next_to_project() {
        let config = AnalysisConfig::default();
        let dir = config.results_dir_for(Path::new("/work/projects/app"));
        assert_eq!(dir, PathBuf::from("/work/projects/perfdelta-results"));

        let config = AnalysisConfig {
            results_dir: Some(PathBuf::from("/tmp/out")),
            ..AnalysisConfig::default()
        };
        assert_eq!(
            config.results_dir_for(Path::new("/work/projects/app")),
            PathBuf::from("/tmp/out")
        );
    }
}
