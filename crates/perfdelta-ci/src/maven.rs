//! Maven-backed test execution.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collab::TestExecutor;
use crate::runner::{CiRunner, StageResult};
use crate::stage::{StageConfig, POM};

/// Runs `mvn clean test` in the project under test.
#[derive(Debug, Clone)]
pub struct MavenExecutor {
    /// Maven executable (`mvn`, `./mvnw`, ...).
    pub executable: String,

    /// POM to build; defaults to `<project>/pom.xml`.
    pub pom: Option<PathBuf>,

    /// Extra arguments appended to every invocation.
    pub extra_args: Vec<String>,

    /// Run `mvn install -DskipTests` once per commit before its tests.
    pub install_first: bool,
}

impl Default for MavenExecutor {
    fn default() -> Self {
        Self {
            executable: "mvn".to_string(),
            pom: None,
            extra_args: Vec::new(),
            install_first: false,
        }
    }
}

impl MavenExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_install_first(mut self, install_first: bool) -> Self {
        self.install_first = install_first;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn pom_for(&self, project: &Path) -> PathBuf {
        self.pom.clone().unwrap_or_else(|| project.join(POM))
    }

    /// The test stage that will be run for `project`.
    ///
    /// Timeouts are enforced by the pipeline around the whole step, so the
    /// stage itself waits indefinitely.
    pub fn stage_for(&self, project: &Path, tests: Option<&[String]>) -> StageConfig {
        StageConfig::maven_test(
            &self.executable,
            &self.pom_for(project),
            tests,
            &self.extra_args,
            0,
        )
        .in_dir(project)
    }

    /// The per-commit install stage, if enabled.
    pub fn install_stage_for(&self, project: &Path) -> Option<StageConfig> {
        self.install_first.then(|| {
            StageConfig::maven_install(&self.executable, &self.pom_for(project), &self.extra_args, 0)
                .in_dir(project)
        })
    }
}

#[async_trait]
impl TestExecutor for MavenExecutor {
    async fn prepare(&self, project: &Path) -> anyhow::Result<Option<StageResult>> {
        let Some(stage) = self.install_stage_for(project) else {
            return Ok(None);
        };
        info!(project = %project.display(), "installing project modules");
        CiRunner::execute_stage(&stage).await.map(Some)
    }

    async fn run_tests(
        &self,
        project: &Path,
        tests: Option<&[String]>,
    ) -> anyhow::Result<StageResult> {
        let stage = self.stage_for(project, tests);
        info!(project = %project.display(), "running test suite");
        CiRunner::execute_stage(&stage).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_uses_project_pom_by_default() {
        let executor = MavenExecutor::new();
        let stage = executor.stage_for(Path::new("/work/app"), None);
        assert!(stage.command.contains(&"/work/app/pom.xml".to_string()));
        assert_eq!(stage.working_dir, Some(PathBuf::from("/work/app")));
        assert_eq!(stage.timeout_secs, 0);
        assert!(executor.install_stage_for(Path::new("/work/app")).is_none());
    }

    #[test]
    fn extra_args_reach_test_and_install_stages() {
        let executor = MavenExecutor::new()
            .with_extra_args(vec!["-Pci".to_string(), "-DskipITs".to_string()])
            .with_install_first(true);
        let project = Path::new("/work/app");

        let test = executor.stage_for(project, None);
        assert!(test.command.ends_with(&["-Pci".to_string(), "-DskipITs".to_string()]));

        let install = executor.install_stage_for(project).unwrap();
        assert_eq!(install.name, "maven_install");
        assert!(install.command.contains(&"-DskipTests".to_string()));
        assert!(install.command.ends_with(&["-Pci".to_string(), "-DskipITs".to_string()]));
    }

    #[tokio::test]
    async fn prepare_is_noop_without_install() {
        let dir = tempfile::tempdir().unwrap();
        let executor = MavenExecutor::new().with_executable("perfdelta-no-such-maven");
        assert!(executor.prepare(dir.path()).await.unwrap().is_none());
    }

    #[test]
    fn stage_honours_custom_pom_and_executable() {
        let executor = MavenExecutor {
            pom: Some(PathBuf::from("/work/app/build/pom.xml")),
            ..MavenExecutor::new().with_executable("./mvnw")
        };
        let tests = vec!["FooTest".to_string()];
        let stage = executor.stage_for(Path::new("/work/app"), Some(&tests));
        assert_eq!(stage.command[0], "./mvnw");
        assert!(stage.command.contains(&"/work/app/build/pom.xml".to_string()));
        assert!(stage.command.contains(&"-Dtest=FooTest".to_string()));
    }

    #[tokio::test]
    async fn run_tests_reports_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let executor = MavenExecutor::new().with_executable("perfdelta-no-such-maven");
        assert!(executor.run_tests(dir.path(), None).await.is_err());
    }
}
