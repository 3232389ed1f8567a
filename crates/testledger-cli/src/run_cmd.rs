//! `testledger run` command: run the suite without unhealthy specs, or one
//! claimed batch of an orchestration session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use testledger_api::models::{ExclusionCategory, HealthReport};
use testledger_api::{Coordinator, HttpCoordinator};
use testledger_core::claim::{ClaimSettings, DEFAULT_BATCH_SIZE};
use testledger_core::exclusion::{ExclusionPolicy, FlakyMode, HealthThresholds};
use testledger_core::executor::{ProcessExecutor, TestExecutor};
use testledger_core::run::{self, RunOptions, RunOutcome, RunPlan};
use testledger_core::AdapterRegistry;

use crate::config::ResolvedConfig;

/// Excluded specs listed before the summary is cut off.
const MAX_LISTED: usize = 10;

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Test framework: webdriverio (wdio), playwright (pw) or cypress (cy).
    /// Detected from the project when omitted
    #[arg(long, short = 'f')]
    pub framework: Option<String>,
    /// How to treat flaky specs: skip, warn or fail
    #[arg(long, default_value_t = FlakyMode::Skip)]
    pub flaky_mode: FlakyMode,
    /// Run quarantined specs too
    #[arg(long)]
    pub include_quarantined: bool,
    /// Application version the health data is scoped to
    #[arg(long = "version")]
    pub app_version: Option<String>,
    /// Minimum flaky occurrences before a spec counts as flaky
    #[arg(long)]
    pub min_flaky_count: Option<u32>,
    /// Minimum flaky percentage before a spec counts as flaky
    #[arg(long)]
    pub min_flaky_percent: Option<f64>,
    /// Minimum recorded runs before health data is trusted
    #[arg(long)]
    pub min_total_runs: Option<u32>,
    /// Print the command that would run without running it
    #[arg(long)]
    pub dry_run: bool,
    /// Orchestration session to claim specs from
    #[arg(long, env = "TESTLEDGER_SESSION_ID")]
    pub session_id: Option<String>,
    /// Identity of this node within the session (default: hostname-pid)
    #[arg(long, env = "TESTLEDGER_NODE_ID")]
    pub node_id: Option<String>,
    /// Specs to claim per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u32,
    /// Project directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
    /// Test command to run instead of the framework default, after `--`
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn into_options(self, project_id: i64) -> RunOptions {
        let parallel = self.session_id.map(|session_id| {
            let node_id = self.node_id.unwrap_or_else(default_node_id);
            ClaimSettings::new(session_id, node_id).batch_size(self.batch_size)
        });
        RunOptions {
            project_id,
            version: self.app_version,
            policy: ExclusionPolicy {
                flaky_mode: self.flaky_mode,
                include_quarantined: self.include_quarantined,
                thresholds: HealthThresholds {
                    min_flaky_count: self.min_flaky_count,
                    min_flaky_percent: self.min_flaky_percent,
                    min_total_runs: self.min_total_runs,
                },
            },
            framework: self.framework,
            command: self.command,
            dry_run: self.dry_run,
            parallel,
            project_dir: self.dir,
        }
    }
}

/// `<hostname>-<pid>`, unique enough to tell CI nodes apart.
pub fn default_node_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "node".to_owned());
    format!("{host}-{}", std::process::id())
}

/// Run the run command. Returns the exit code for the process.
pub async fn run_tests(config: &ResolvedConfig, args: RunArgs) -> Result<i32> {
    let project_id = config.require_project_id()?;
    let coordinator =
        HttpCoordinator::new(config.api_config()?).context("failed to build API client")?;
    let executor = ProcessExecutor::new(&args.dir).announce(true);
    run_with(&coordinator, &executor, project_id, args).await
}

async fn run_with(
    coordinator: &dyn Coordinator,
    executor: &dyn TestExecutor,
    project_id: i64,
    args: RunArgs,
) -> Result<i32> {
    let options = args.into_options(project_id);
    let registry = AdapterRegistry::new();

    let plan = run::prepare_run(coordinator, &registry, &options).await?;
    print_plan(&plan);

    let outcome = run::execute_run(coordinator, executor, &plan, &options).await?;
    print_outcome(&outcome, &options);
    Ok(outcome.exit_code())
}

fn print_plan(plan: &RunPlan) {
    match plan.detection.as_ref().and_then(|d| d.config_path.as_ref()) {
        Some(path) => println!(
            "Framework: {} (detected from {})",
            plan.adapter,
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        ),
        None if plan.detection.is_some() => {
            println!("Framework: {} (detected from package.json)", plan.adapter)
        }
        None => println!("Framework: {}", plan.adapter),
    }
    print_skip_summary(&plan.report, plan.exclusions.flaky(), plan.exclusions.quarantined());
}

fn print_skip_summary(report: &HealthReport, flaky: &[String], quarantined: &[String]) {
    if flaky.is_empty() && quarantined.is_empty() {
        println!("No specs excluded.");
        println!();
        return;
    }

    println!(
        "Excluding {} spec(s): {} flaky, {} quarantined",
        flaky.len() + quarantined.len(),
        flaky.len(),
        quarantined.len()
    );
    let listed = quarantined
        .iter()
        .map(|s| (s, ExclusionCategory::Quarantined))
        .chain(flaky.iter().map(|s| (s, ExclusionCategory::Flaky)));
    let total = flaky.len() + quarantined.len();
    for (spec, category) in listed.take(MAX_LISTED) {
        let marker = match category {
            ExclusionCategory::Flaky => "flaky",
            ExclusionCategory::Quarantined => "quarantined",
        };
        let runs = report
            .skip_specs
            .iter()
            .find(|s| &s.spec_file == spec)
            .and_then(|s| s.total_runs)
            .map(|n| format!(" ({n} runs)"))
            .unwrap_or_default();
        println!("  [{marker}] {spec}{runs}");
    }
    if total > MAX_LISTED {
        println!("  ... and {} more", total - MAX_LISTED);
    }
    println!();
}

fn print_outcome(outcome: &RunOutcome, options: &RunOptions) {
    match outcome {
        RunOutcome::DryRun { command } => {
            println!("Dry run, would execute:");
            println!("  {}", command.display());
            if options.parallel.is_some() {
                println!("(no specs were claimed; claimed specs are appended at run time)");
            }
        }
        RunOutcome::Exhausted => {
            let session = options
                .parallel
                .as_ref()
                .map(|p| p.session_id.as_str())
                .unwrap_or_default();
            println!("No more specs to claim in session {session}.");
        }
        RunOutcome::Finished {
            exit_code, batch, ..
        } => {
            println!();
            if let Some(batch) = batch {
                println!(
                    "Ran {} claimed spec(s), {} remaining in session; reported {}/{}",
                    batch.specs.len(),
                    batch.remaining,
                    batch.reported,
                    batch.specs.len()
                );
            }
            if *exit_code == 0 {
                println!("Tests passed.");
            } else {
                println!("Tests failed with exit code {exit_code}.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use testledger_api::models::{HealthStatus, SkipSpec};
    use testledger_test_utils::{FakeCoordinator, RecordingExecutor, project_with};

    fn args(dir: &std::path::Path) -> RunArgs {
        RunArgs {
            framework: None,
            flaky_mode: FlakyMode::Skip,
            include_quarantined: false,
            app_version: None,
            min_flaky_count: None,
            min_flaky_percent: None,
            min_total_runs: None,
            dry_run: false,
            session_id: None,
            node_id: None,
            batch_size: DEFAULT_BATCH_SIZE,
            dir: dir.to_path_buf(),
            command: Vec::new(),
        }
    }

    #[test]
    fn session_id_enables_parallel_mode() {
        let mut run_args = args(std::path::Path::new("."));
        run_args.session_id = Some("s-1".to_string());
        run_args.node_id = Some("ci-3".to_string());
        run_args.batch_size = 4;
        let options = run_args.into_options(9);

        let parallel = options.parallel.unwrap();
        assert_eq!(parallel.session_id, "s-1");
        assert_eq!(parallel.node_id, "ci-3");
        assert_eq!(parallel.batch_size, 4);
        assert_eq!(options.project_id, 9);
    }

    #[test]
    fn node_id_defaults_to_host_and_pid() {
        let mut run_args = args(std::path::Path::new("."));
        run_args.session_id = Some("s-1".to_string());
        let options = run_args.into_options(1);
        let node_id = options.parallel.unwrap().node_id;
        assert!(node_id.ends_with(&format!("-{}", std::process::id())));
    }

    #[test]
    fn thresholds_flow_into_the_policy() {
        let mut run_args = args(std::path::Path::new("."));
        run_args.min_flaky_count = Some(3);
        run_args.min_total_runs = Some(20);
        run_args.flaky_mode = FlakyMode::Warn;
        let options = run_args.into_options(1);
        assert_eq!(options.policy.thresholds.min_flaky_count, Some(3));
        assert_eq!(options.policy.thresholds.min_total_runs, Some(20));
        assert_eq!(options.policy.flaky_mode, FlakyMode::Warn);
        assert!(options.parallel.is_none());
    }

    #[tokio::test]
    async fn run_returns_child_exit_code() {
        let project = project_with(&[("playwright.config.ts", "")]);
        let coordinator = FakeCoordinator::new().with_health(HealthReport {
            skip_specs: vec![SkipSpec::new("e2e/login.spec.ts", HealthStatus::Flaky)],
            ..HealthReport::default()
        });
        let executor = RecordingExecutor::exiting_with(4);

        let code = run_with(&coordinator, &executor, 1, args(project.path()))
            .await
            .unwrap();
        assert_eq!(code, 4);
        assert_eq!(
            executor.commands()[0].display(),
            "npx playwright test --grep-invert login"
        );
    }

    #[tokio::test]
    async fn warn_mode_keeps_the_child_exit_code() {
        let project = project_with(&[("playwright.config.ts", "")]);
        let coordinator = FakeCoordinator::new().with_health(HealthReport {
            skip_specs: vec![
                SkipSpec::new("e2e/login.spec.ts", HealthStatus::Flaky),
                SkipSpec::new("e2e/cart.spec.ts", HealthStatus::Quarantined),
            ],
            ..HealthReport::default()
        });
        let executor = RecordingExecutor::exiting_with(3);

        let mut run_args = args(project.path());
        run_args.flaky_mode = FlakyMode::Warn;
        let code = run_with(&coordinator, &executor, 1, run_args)
            .await
            .unwrap();
        assert_eq!(code, 3);
        assert_eq!(
            executor.commands()[0].display(),
            "npx playwright test --grep-invert cart"
        );
    }

    #[tokio::test]
    async fn user_command_replaces_the_default() {
        let project = project_with(&[("cypress.config.ts", "")]);
        let coordinator = FakeCoordinator::new();
        let executor = RecordingExecutor::exiting_with(0);

        let mut run_args = args(project.path());
        run_args.command = vec!["yarn".to_string(), "cy:run".to_string()];
        run_with(&coordinator, &executor, 1, run_args).await.unwrap();
        assert_eq!(executor.commands()[0].display(), "yarn cy:run");
    }

    #[tokio::test]
    async fn unknown_framework_fails_with_alternatives() {
        let project = project_with(&[]);
        let coordinator = FakeCoordinator::new();
        let executor = RecordingExecutor::exiting_with(0);

        let mut run_args = args(project.path());
        run_args.framework = Some("mocha".to_string());
        let err = run_with(&coordinator, &executor, 1, run_args)
            .await
            .unwrap_err();
        assert!(
            format!("{err:#}").contains("unknown framework: mocha"),
            "unexpected error: {err:#}"
        );
    }
}
