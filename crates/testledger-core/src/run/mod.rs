//! Run orchestration: resolve the adapter, compute exclusions, then either
//! run the whole suite once or take part in a multi-node session for one
//! claim/run/report cycle.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use testledger_api::Coordinator;
use testledger_api::models::HealthReport;

use crate::adapter::{Adapter, AdapterRegistry, Detection};
use crate::claim::{BatchReport, ClaimSettings, CycleOutcome, CyclePlan, NodeCycle};
use crate::error::RunError;
use crate::exclusion::{ExclusionPolicy, ExclusionSet, FlakyMode};
use crate::executor::{TestCommand, TestExecutor};

/// Everything a `run` invocation needs, resolved up front.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_id: i64,
    pub version: Option<String>,
    pub policy: ExclusionPolicy,
    /// Explicit framework name or alias; detected when `None`.
    pub framework: Option<String>,
    /// User-supplied test command; the adapter default when empty.
    pub command: Vec<String>,
    pub dry_run: bool,
    /// Session membership for multi-node runs.
    pub parallel: Option<ClaimSettings>,
    pub project_dir: PathBuf,
}

/// The decisions made before anything is executed.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub adapter: Adapter,
    /// Present when the adapter was auto-detected.
    pub detection: Option<Detection>,
    pub report: HealthReport,
    pub exclusions: ExclusionSet,
    pub exclude_args: Vec<String>,
    pub base_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing was spawned or claimed.
    DryRun { command: TestCommand },
    /// The session had no specs left for this node.
    Exhausted,
    Finished {
        exit_code: i32,
        /// Set for multi-node runs.
        batch: Option<BatchReport>,
        warnings: Vec<String>,
    },
}

impl RunOutcome {
    /// Exit code for the CLI: the child's code verbatim, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DryRun { .. } | Self::Exhausted => 0,
            Self::Finished { exit_code, .. } => *exit_code,
        }
    }
}

/// Pick the adapter: an explicit name must resolve, otherwise detection
/// must find one.
pub fn resolve_adapter(
    registry: &AdapterRegistry,
    framework: Option<&str>,
    project_dir: &Path,
) -> Result<(Adapter, Option<Detection>), RunError> {
    let available = registry.list().join(", ");
    match framework {
        Some(name) => registry
            .resolve(name)
            .map(|adapter| (adapter, None))
            .ok_or_else(|| RunError::UnknownFramework {
                name: name.to_owned(),
                available,
            }),
        None => registry
            .detect_framework(project_dir)
            .map(|(adapter, detection)| (adapter, Some(detection)))
            .ok_or_else(|| RunError::FrameworkNotDetected {
                dir: project_dir.display().to_string(),
                available,
            }),
    }
}

/// Resolve the adapter and fetch exclusions. No process is spawned and no
/// session state is touched.
pub async fn prepare_run(
    coordinator: &dyn Coordinator,
    registry: &AdapterRegistry,
    options: &RunOptions,
) -> Result<RunPlan, RunError> {
    let (adapter, detection) =
        resolve_adapter(registry, options.framework.as_deref(), &options.project_dir)?;

    let query = options
        .policy
        .health_query(options.project_id, options.version.as_deref());
    let report = coordinator
        .health_config(&query)
        .await
        .map_err(RunError::HealthConfig)?;

    let exclusions = options.policy.exclusions_from(&report);
    let exclude_args = adapter.exclude_args(&exclusions);
    let base_command = if options.command.is_empty() {
        adapter.default_command(&options.project_dir)
    } else {
        options.command.clone()
    };

    info!(
        adapter = %adapter,
        flaky = exclusions.flaky().len(),
        quarantined = exclusions.quarantined().len(),
        "prepared run"
    );

    Ok(RunPlan {
        adapter,
        detection,
        report,
        exclusions,
        exclude_args,
        base_command,
    })
}

/// Execute a prepared plan: a whole-suite run, or one claim cycle when the
/// options carry session settings.
pub async fn execute_run(
    coordinator: &dyn Coordinator,
    executor: &dyn TestExecutor,
    plan: &RunPlan,
    options: &RunOptions,
) -> Result<RunOutcome, RunError> {
    if options.dry_run {
        let command = TestCommand::assemble(&plan.base_command, &plan.exclude_args, &[])?;
        return Ok(RunOutcome::DryRun { command });
    }

    let (exit_code, batch) = match &options.parallel {
        None => {
            let command = TestCommand::assemble(&plan.base_command, &plan.exclude_args, &[])?;
            let execution = executor.execute(&command).await?;
            (execution.exit_code, None)
        }
        Some(settings) => {
            let cycle_plan = CyclePlan {
                adapter: plan.adapter,
                base_command: plan.base_command.clone(),
                exclude_args: plan.exclude_args.clone(),
            };
            let mut cycle = NodeCycle::new(coordinator, executor, settings);
            match cycle.run(&cycle_plan).await? {
                CycleOutcome::Exhausted => return Ok(RunOutcome::Exhausted),
                CycleOutcome::Ran(report) => (report.exit_code, Some(report)),
            }
        }
    };

    let mut warnings = Vec::new();
    if let Some(report) = batch.as_ref().filter(|r| !r.report_failures.is_empty()) {
        let message = format!(
            "{} of {} completion reports failed; session progress may be incomplete",
            report.report_failures.len(),
            report.specs.len()
        );
        warn!("{message}");
        warnings.push(message);
    }
    if exit_code != 0 && options.policy.flaky_mode == FlakyMode::Warn {
        let message = format!(
            "tests failed (exit code {exit_code}) in warn mode; check for flaky tests"
        );
        warn!("{message}");
        warnings.push(message);
    }

    Ok(RunOutcome::Finished {
        exit_code,
        batch,
        warnings,
    })
}

/// [`prepare_run`] followed by [`execute_run`].
pub async fn run(
    coordinator: &dyn Coordinator,
    executor: &dyn TestExecutor,
    registry: &AdapterRegistry,
    options: &RunOptions,
) -> Result<RunOutcome, RunError> {
    let plan = prepare_run(coordinator, registry, options).await?;
    execute_run(coordinator, executor, &plan, options).await
}
