//! perfdelta - commit-by-commit test runtime regression finder
//!
//! ## Commands
//!
//! - `run`: Check out a range of commits, run the test suite at each one and
//!   report commits whose test runtimes moved past the thresholds
//! - `analyze`: Recompute statistics and salient commits from a results
//!   directory written by an earlier run

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use perfdelta_ci::{
    CommitSelection, MavenExecutor, PerfPipeline, PipelineError, PipelineRequest,
    SurefireParser,
};
use perfdelta_core::reporting::render_salient_commits;
use perfdelta_core::{
    analyze_results_dir, Analysis, AnalysisConfig, DeltaMode, DirectorySink, GitRepository,
    PartialResultsPolicy, ReportSink, StreamSink, VersionControl,
};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "perfdelta")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find the commits that changed your test runtimes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test suite at every selected commit and analyse the runtimes
    #[command(group(
        ArgGroup::new("selection")
            .required(true)
            .args(["range", "commits", "latest"]),
    ))]
    Run {
        /// Project under test (a git working tree with a Maven build)
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Branch the selection refers to (default: the checked out branch)
        #[arg(short, long, env = "PERFDELTA_BRANCH")]
        branch: Option<String>,

        /// Newest and oldest commit of an inclusive range
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        range: Option<Vec<String>>,

        /// Explicit commits, tested in the given order
        #[arg(long, value_delimiter = ',')]
        commits: Option<Vec<String>>,

        /// The N newest commits of the branch
        #[arg(long, value_name = "N")]
        latest: Option<usize>,

        /// Only run these test classes
        #[arg(short, long, value_delimiter = ',')]
        tests: Option<Vec<String>>,

        /// Test runs per commit
        #[arg(short = 'n', long, env = "PERFDELTA_INVOCATIONS")]
        invocations: Option<u32>,

        /// Per-run timeout in seconds (0 = none)
        #[arg(long, env = "PERFDELTA_TIMEOUT")]
        timeout: Option<u64>,

        /// Drop collected results when a run aborts
        #[arg(long)]
        discard_partial: bool,

        /// Results directory (default: <project parent>/perfdelta-results)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write results to stdout instead of a directory
        #[arg(long, conflicts_with = "output")]
        stdout: bool,

        /// Maven executable
        #[arg(long, env = "PERFDELTA_MVN", default_value = "mvn")]
        mvn: String,

        /// POM to build (default: <project>/pom.xml)
        #[arg(long)]
        pom: Option<PathBuf>,

        /// Extra argument passed to every Maven call (repeatable)
        #[arg(long = "mvn-arg", value_name = "ARG", allow_hyphen_values = true)]
        mvn_args: Vec<String>,

        /// Run `mvn install -DskipTests` at each commit before its tests
        #[arg(long)]
        install: bool,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Recompute statistics from a results directory
    Analyze {
        /// Results directory holding `<test>.json` series files
        dir: PathBuf,

        /// Branch name used in the salient commits report
        #[arg(short, long, default_value = "unknown")]
        branch: String,

        /// Write results to stdout instead of back into the directory
        #[arg(long)]
        stdout: bool,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
}

/// Analysis options shared by `run` and `analyze`.
#[derive(Args, Debug, Default)]
struct AnalysisArgs {
    /// TOML configuration file
    #[arg(short, long, env = "PERFDELTA_CONFIG")]
    config: Option<PathBuf>,

    /// Runtime delta (seconds) above which a commit is salient
    #[arg(long, env = "PERFDELTA_DELTA_THRESHOLD")]
    delta_threshold: Option<f64>,

    /// Speedup above which a commit is salient
    #[arg(long, env = "PERFDELTA_SPEEDUP_THRESHOLD")]
    speedup_threshold: Option<f64>,

    /// How deltas are compared: absolute or signed
    #[arg(long, env = "PERFDELTA_DELTA_MODE")]
    delta_mode: Option<DeltaMode>,
}

impl AnalysisArgs {
    /// Config file (or defaults) with command line overrides applied.
    fn load(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => AnalysisConfig::default(),
        };
        if let Some(value) = self.delta_threshold {
            config.thresholds.delta_threshold = value;
        }
        if let Some(value) = self.speedup_threshold {
            config.thresholds.speedup_threshold = value;
        }
        if let Some(mode) = self.delta_mode {
            config.delta_mode = mode;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    perfdelta_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            project,
            branch,
            range,
            commits,
            latest,
            tests,
            invocations,
            timeout,
            discard_partial,
            output,
            stdout,
            mvn,
            pom,
            mvn_args,
            install,
            analysis,
        } => {
            let mut config = analysis.load()?;
            if let Some(n) = invocations {
                config.invocations = n;
            }
            if let Some(secs) = timeout {
                config.stage_timeout_secs = secs;
            }
            if discard_partial {
                config.partial_results = PartialResultsPolicy::Discard;
            }
            if let Some(dir) = output {
                config.results_dir = Some(dir);
            }
            let selection = selection_from_args(range, commits, latest)?;
            let executor = maven_executor(mvn, pom, mvn_args, install);
            cmd_run(&project, branch, selection, tests, config, &executor, stdout).await
        }
        Commands::Analyze {
            dir,
            branch,
            stdout,
            analysis,
        } => cmd_analyze(&dir, &branch, &analysis.load()?, stdout),
    }
}

fn maven_executor(
    mvn: String,
    pom: Option<PathBuf>,
    mvn_args: Vec<String>,
    install: bool,
) -> MavenExecutor {
    MavenExecutor {
        pom,
        ..MavenExecutor::new()
            .with_executable(mvn)
            .with_extra_args(mvn_args)
            .with_install_first(install)
    }
}

fn selection_from_args(
    range: Option<Vec<String>>,
    commits: Option<Vec<String>>,
    latest: Option<usize>,
) -> Result<CommitSelection> {
    if let Some(range) = range {
        let [start, end]: [String; 2] = range
            .try_into()
            .map_err(|_| anyhow::anyhow!("--range takes exactly two commits"))?;
        return Ok(CommitSelection::Range { start, end });
    }
    if let Some(ids) = commits {
        return Ok(CommitSelection::List { ids });
    }
    match latest {
        Some(count) => Ok(CommitSelection::Latest { count }),
        None => anyhow::bail!("one of --range, --commits or --latest is required"),
    }
}

/// Run the pipeline over the selected commits of `project`.
async fn cmd_run(
    project: &Path,
    branch: Option<String>,
    selection: CommitSelection,
    tests: Option<Vec<String>>,
    config: AnalysisConfig,
    executor: &MavenExecutor,
    to_stdout: bool,
) -> Result<()> {
    let vcs = GitRepository::open(project)
        .with_context(|| format!("Failed to open repository at {:?}", project))?;
    let branch = match branch {
        Some(b) => b,
        None => vcs
            .current_branch()
            .context("Failed to determine the current branch")?,
    };
    let parser = SurefireParser::new();

    let results_dir = config.results_dir_for(project);
    let mut sink: Box<dyn ReportSink> = if to_stdout {
        Box::new(StreamSink::stdout(branch.clone()))
    } else {
        Box::new(
            DirectorySink::create(&results_dir, branch.clone())
                .with_context(|| format!("Failed to create results dir {:?}", results_dir))?,
        )
    };

    let request = PipelineRequest {
        project: project.to_path_buf(),
        branch: branch.clone(),
        selection,
        tests,
        config,
    };

    let pipeline = PerfPipeline::new(&vcs, executor, &parser);
    match pipeline.run(&request, sink.as_mut()).await {
        Ok(outcome) => {
            info!(
                run_id = %outcome.run_id,
                commits = outcome.commits.len(),
                skipped_reports = outcome.skipped_reports.len(),
                "run complete"
            );
            if !to_stdout {
                print!("{}", render_salient_commits(&outcome.analysis.salient, &branch));
                println!("Results written to {}", results_dir.display());
            }
            Ok(())
        }
        Err(PipelineError::Execution {
            failure,
            partial,
            persist_error,
        }) => {
            report_unfinished(
                partial.as_deref(),
                persist_error.as_ref(),
                &branch,
                &results_dir,
                to_stdout,
            );
            anyhow::bail!("Run aborted: {}", failure)
        }
        Err(PipelineError::Restore {
            branch: original,
            source,
            results,
            persist_error,
        }) => {
            report_unfinished(
                results.as_deref(),
                persist_error.as_ref(),
                &branch,
                &results_dir,
                to_stdout,
            );
            Err(source).with_context(|| {
                format!("Run finished but {original} could not be checked out again")
            })
        }
        Err(e) => Err(e).context("Run failed"),
    }
}

/// Tell the user what became of the results of a run that did not finish.
fn report_unfinished(
    analysis: Option<&Analysis>,
    persist_error: Option<&anyhow::Error>,
    branch: &str,
    results_dir: &Path,
    to_stdout: bool,
) {
    let Some(analysis) = analysis else {
        return;
    };
    if let Some(e) = persist_error {
        eprintln!(
            "Collected results ({} records) could not be written: {e:#}",
            analysis.record_count()
        );
    } else if !to_stdout {
        print!("{}", render_salient_commits(&analysis.salient, branch));
        println!(
            "Collected results ({} records) written to {}",
            analysis.record_count(),
            results_dir.display()
        );
    }
}

/// Re-analyse the series files stored in `dir`.
fn cmd_analyze(dir: &Path, branch: &str, config: &AnalysisConfig, to_stdout: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let analysis = if to_stdout {
        let mut sink = StreamSink::stdout(branch);
        analyze_results_dir(dir, config, &mut sink)?
    } else {
        let mut sink = DirectorySink::create(dir, branch)?;
        let analysis = analyze_results_dir(dir, config, &mut sink)?;
        print!("{}", render_salient_commits(&analysis.salient, branch));
        println!("Statistics written to {}", sink.root().display());
        analysis
    };

    info!(
        series = analysis.series.len(),
        salient_commits = analysis.salient.len(),
        "analysis complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use perfdelta_core::reporting::{write_json, SALIENT_COMMITS_FILE, STATISTICS_DIR};
    use perfdelta_core::{CommitId, ReportRecord, TestReport, TestSeries};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_requires_a_selection() {
        assert!(Cli::try_parse_from(["perfdelta", "run", "."]).is_err());
        assert!(
            Cli::try_parse_from(["perfdelta", "run", "--latest", "3", "--commits", "a,b"])
                .is_err()
        );
    }

    #[test]
    fn test_run_range_selection() {
        let cli = parse(&[
            "perfdelta", "-v", "run", "/work/app", "--range", "abc", "def", "-n", "3",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                project,
                range,
                commits,
                latest,
                invocations,
                ..
            } => {
                assert_eq!(project, PathBuf::from("/work/app"));
                assert_eq!(invocations, Some(3));
                let selection = selection_from_args(range, commits, latest).unwrap();
                assert_eq!(
                    selection,
                    CommitSelection::Range {
                        start: "abc".to_string(),
                        end: "def".to_string()
                    }
                );
            }
            Commands::Analyze { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_commit_list_and_tests() {
        let cli = parse(&[
            "perfdelta",
            "run",
            "--commits",
            "c1,c3,c2",
            "--tests",
            "FooTest,BarTest",
            "--discard-partial",
        ]);
        match cli.command {
            Commands::Run {
                range,
                commits,
                latest,
                tests,
                discard_partial,
                ..
            } => {
                assert!(discard_partial);
                assert_eq!(
                    tests,
                    Some(vec!["FooTest".to_string(), "BarTest".to_string()])
                );
                let selection = selection_from_args(range, commits, latest).unwrap();
                assert_eq!(
                    selection,
                    CommitSelection::List {
                        ids: vec!["c1".to_string(), "c3".to_string(), "c2".to_string()]
                    }
                );
            }
            Commands::Analyze { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_maven_args_reach_executor() {
        let cli = parse(&[
            "perfdelta",
            "run",
            "--latest",
            "2",
            "--mvn",
            "./mvnw",
            "--mvn-arg",
            "-Pci",
            "--mvn-arg",
            "-DskipITs",
            "--install",
        ]);
        match cli.command {
            Commands::Run {
                mvn,
                pom,
                mvn_args,
                install,
                ..
            } => {
                let executor = maven_executor(mvn, pom, mvn_args, install);
                assert_eq!(executor.executable, "./mvnw");
                assert_eq!(executor.extra_args, vec!["-Pci", "-DskipITs"]);
                assert!(executor.install_first);
                let stage = executor.stage_for(Path::new("/work/app"), None);
                assert!(stage
                    .command
                    .ends_with(&["-Pci".to_string(), "-DskipITs".to_string()]));
                assert!(executor.install_stage_for(Path::new("/work/app")).is_some());
            }
            Commands::Analyze { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perfdelta.toml");
        std::fs::write(
            &path,
            "delta_mode = \"signed\"\ninvocations = 4\n\n[thresholds]\ndelta_threshold = 7.5\nspeedup_threshold = 3.0\n",
        )
        .unwrap();

        let args = AnalysisArgs {
            config: Some(path),
            delta_threshold: Some(1.0),
            ..AnalysisArgs::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.thresholds.delta_threshold, 1.0);
        assert_eq!(config.thresholds.speedup_threshold, 3.0);
        assert_eq!(config.delta_mode, DeltaMode::Signed);
        assert_eq!(config.invocations, 4);
    }

    #[test]
    fn test_delta_mode_flag_parses() {
        let cli = parse(&["perfdelta", "analyze", "results", "--delta-mode", "signed"]);
        match cli.command {
            Commands::Analyze { dir, analysis, .. } => {
                assert_eq!(dir, PathBuf::from("results"));
                assert_eq!(analysis.delta_mode, Some(DeltaMode::Signed));
            }
            Commands::Run { .. } => panic!("expected analyze"),
        }
        assert!(
            Cli::try_parse_from(["perfdelta", "analyze", "r", "--delta-mode", "sideways"])
                .is_err()
        );
    }

    #[test]
    fn test_analyze_writes_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let series = TestSeries::new(
            [("c3", 10.0), ("c2", 5.0), ("c1", 5.0)]
                .into_iter()
                .map(|(commit, t)| {
                    ReportRecord::new(
                        CommitId::from(commit),
                        TestReport::new("org.a.SumTest", 1, 0, 0, 0, t).unwrap(),
                    )
                })
                .collect(),
        )
        .unwrap();
        write_json(&dir.path().join("org.a.SumTest.json"), &series).unwrap();

        cmd_analyze(dir.path(), "main", &AnalysisConfig::default(), false).unwrap();

        let statistics = dir.path().join(STATISTICS_DIR);
        assert!(statistics.join("org.a.SumTest.json").is_file());
        assert!(statistics
            .join(format!("{SALIENT_COMMITS_FILE}.json"))
            .is_file());
    }

    #[test]
    fn test_analyze_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cmd_analyze(dir.path(), "main", &AnalysisConfig::default(), false).is_err());
    }
}
