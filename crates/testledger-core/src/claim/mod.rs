//! One node's claim/run/report cycle against a coordination session.
//!
//! The session service owns all cross-node state. A node is a pure client
//! driving this state machine once per invocation:
//!
//! ```text
//! unclaimed -> claiming -> claimed  -> running -> reporting -> done
//!                       -> exhausted
//! (any state) -> failed
//! ```
//!
//! Reporting is best-effort and at-most-once: a failed completion call is
//! logged and skipped, never retried, and never changes the exit code.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use testledger_api::Coordinator;
use testledger_api::models::{ClaimRequest, CompletionReport, SpecResult};

use crate::adapter::Adapter;
use crate::error::RunError;
use crate::executor::{TestCommand, TestExecutor};

/// Specs requested per claim unless overridden.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Where a node is in its single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Unclaimed,
    Claiming,
    Claimed,
    Exhausted,
    Running,
    Reporting,
    Done,
    Failed,
}

impl ClaimState {
    /// Check whether `from -> to` is an edge of the cycle graph.
    pub fn is_valid_transition(from: ClaimState, to: ClaimState) -> bool {
        use ClaimState::*;
        matches!(
            (from, to),
            (Unclaimed, Claiming)
                | (Claiming, Claimed)
                | (Claiming, Exhausted)
                | (Claimed, Running)
                | (Running, Reporting)
                | (Reporting, Done)
        ) || (to == Failed && !from.is_terminal())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Done | Self::Failed)
    }
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unclaimed => "unclaimed",
            Self::Claiming => "claiming",
            Self::Claimed => "claimed",
            Self::Exhausted => "exhausted",
            Self::Running => "running",
            Self::Reporting => "reporting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identifies this node within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSettings {
    pub session_id: String,
    pub node_id: String,
    pub batch_size: u32,
}

impl ClaimSettings {
    pub fn new(session_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            node_id: node_id.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// What to run once specs are claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    pub adapter: Adapter,
    /// User command, or the adapter default.
    pub base_command: Vec<String>,
    /// Health-based exclusions, already translated by the adapter.
    pub exclude_args: Vec<String>,
}

/// A completion call that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFailure {
    pub spec_file: String,
    pub error: String,
}

/// Everything observed while running one claimed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub specs: Vec<String>,
    /// Specs left unclaimed in the session after this claim.
    pub remaining: u64,
    pub command: TestCommand,
    pub exit_code: i32,
    pub duration: Duration,
    /// Completion calls acknowledged by the service.
    pub reported: usize,
    pub report_failures: Vec<ReportFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The claim came back empty: other nodes took everything.
    Exhausted,
    Ran(BatchReport),
}

impl CycleOutcome {
    /// The process exit code for this node.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exhausted => 0,
            Self::Ran(report) => report.exit_code,
        }
    }
}

/// Drives a single claim/run/report cycle.
pub struct NodeCycle<'a> {
    coordinator: &'a dyn Coordinator,
    executor: &'a dyn TestExecutor,
    settings: &'a ClaimSettings,
    state: ClaimState,
}

impl<'a> NodeCycle<'a> {
    pub fn new(
        coordinator: &'a dyn Coordinator,
        executor: &'a dyn TestExecutor,
        settings: &'a ClaimSettings,
    ) -> Self {
        Self {
            coordinator,
            executor,
            settings,
            state: ClaimState::Unclaimed,
        }
    }

    pub fn state(&self) -> ClaimState {
        self.state
    }

    fn advance(&mut self, to: ClaimState) -> Result<(), RunError> {
        if !ClaimState::is_valid_transition(self.state, to) {
            return Err(RunError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(from = %self.state, to = %to, node_id = %self.settings.node_id, "claim state");
        self.state = to;
        Ok(())
    }

    /// Run the cycle to a terminal state.
    ///
    /// On error the cycle ends in [`ClaimState::Failed`]. Specs claimed
    /// before a failure stay claimed on the server.
    pub async fn run(&mut self, plan: &CyclePlan) -> Result<CycleOutcome, RunError> {
        match self.drive(plan).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if !self.state.is_terminal() {
                    self.state = ClaimState::Failed;
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, plan: &CyclePlan) -> Result<CycleOutcome, RunError> {
        self.advance(ClaimState::Claiming)?;
        let request = ClaimRequest {
            session_id: self.settings.session_id.clone(),
            node_id: self.settings.node_id.clone(),
            batch_size: self.settings.batch_size,
        };
        let batch = self
            .coordinator
            .claim(&request)
            .await
            .map_err(|source| RunError::Claim {
                session_id: self.settings.session_id.clone(),
                source,
            })?;

        if batch.is_exhausted() {
            self.advance(ClaimState::Exhausted)?;
            info!(session_id = %self.settings.session_id, "no more specs to claim");
            return Ok(CycleOutcome::Exhausted);
        }

        if batch.specs.len() > self.settings.batch_size as usize {
            warn!(
                claimed = batch.specs.len(),
                batch_size = self.settings.batch_size,
                "service returned more specs than requested"
            );
        }
        self.advance(ClaimState::Claimed)?;
        info!(
            claimed = batch.specs.len(),
            remaining = batch.remaining,
            node_id = %self.settings.node_id,
            "claimed specs"
        );

        let selection = plan.adapter.spec_selection_args(&batch.specs);
        let command = TestCommand::assemble(&plan.base_command, &plan.exclude_args, &selection)?;

        self.advance(ClaimState::Running)?;
        let execution = self.executor.execute(&command).await?;

        self.advance(ClaimState::Reporting)?;
        let result = if execution.exit_code == 0 {
            SpecResult::Passed
        } else {
            SpecResult::Failed
        };
        let per_spec_ms = per_spec_duration_ms(execution.duration, batch.specs.len());

        let mut reported = 0;
        let mut report_failures = Vec::new();
        for spec in &batch.specs {
            let report = CompletionReport {
                session_id: self.settings.session_id.clone(),
                spec_file: spec.clone(),
                result,
                duration: Some(per_spec_ms),
            };
            match self.coordinator.complete(&report).await {
                Ok(_) => reported += 1,
                Err(e) => {
                    warn!(spec_file = %spec, error = %e, "failed to report spec completion");
                    report_failures.push(ReportFailure {
                        spec_file: spec.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.advance(ClaimState::Done)?;
        Ok(CycleOutcome::Ran(BatchReport {
            specs: batch.specs,
            remaining: batch.remaining,
            command,
            exit_code: execution.exit_code,
            duration: execution.duration,
            reported,
            report_failures,
        }))
    }
}

/// Batch wall-clock time split evenly across its specs.
fn per_spec_duration_ms(total: Duration, specs: usize) -> u64 {
    let total_ms = u64::try_from(total.as_millis()).unwrap_or(u64::MAX);
    total_ms / specs.max(1) as u64
}
