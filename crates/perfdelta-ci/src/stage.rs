//! Build/test stage definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maven file name looked up in the project root.
pub const POM: &str = "pom.xml";

/// Configuration for one external build/test step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Directory to run the command in (inherits the caller's when `None`).
    pub working_dir: Option<PathBuf>,

    /// Timeout in seconds (0 = wait indefinitely).
    pub timeout_secs: u64,
}

impl StageConfig {
    /// Create a custom stage configuration.
    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            working_dir: None,
            timeout_secs,
        }
    }

    /// `mvn clean test` for the project described by `pom`.
    ///
    /// Test failures do not fail the build; they are counted in the reports.
    /// With a test filter only the named classes run, and modules without a
    /// matching test do not fail the build.
    pub fn maven_test(
        executable: &str,
        pom: &Path,
        tests: Option<&[String]>,
        extra_args: &[String],
        timeout_secs: u64,
    ) -> Self {
        let mut command = vec![
            executable.to_string(),
            "clean".to_string(),
            "test".to_string(),
            "-f".to_string(),
            pom.to_string_lossy().to_string(),
            "-q".to_string(),
            "-Dmaven.test.failure.ignore=true".to_string(),
        ];
        if let Some(tests) = tests.filter(|t| !t.is_empty()) {
            command.push("-DfailIfNoTests=false".to_string());
            command.push("-Dsurefire.failIfNoSpecifiedTests=false".to_string());
            command.push(format!("-Dtest={}", tests.join(",")));
            command.push("-am".to_string());
        }
        command.extend(extra_args.iter().cloned());

        Self::custom("maven_test".to_string(), command, timeout_secs).in_pom_dir(pom)
    }

    /// `mvn install -DskipTests` for the project described by `pom`.
    ///
    /// Puts every module of the checked-out commit into the local
    /// repository, so a filtered `-am` test run resolves sibling modules
    /// from the same commit.
    pub fn maven_install(
        executable: &str,
        pom: &Path,
        extra_args: &[String],
        timeout_secs: u64,
    ) -> Self {
        let mut command = vec![
            executable.to_string(),
            "install".to_string(),
            "-f".to_string(),
            pom.to_string_lossy().to_string(),
            "-DskipTests".to_string(),
            "-q".to_string(),
        ];
        command.extend(extra_args.iter().cloned());

        Self::custom("maven_install".to_string(), command, timeout_secs).in_pom_dir(pom)
    }

    fn in_pom_dir(mut self, pom: &Path) -> Self {
        self.working_dir = pom.parent().map(Path::to_path_buf);
        self
    }

    /// Run the stage in `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}
