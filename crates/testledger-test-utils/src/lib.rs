//! Shared test utilities for testledger integration tests.
//!
//! [`FakeCoordinator`] is an in-memory session service that enforces the
//! same invariants as the real one: claims are handed out in session order,
//! a spec is never claimed twice, and the remaining count is exact.
//! [`RecordingExecutor`] stands in for the test process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use testledger_api::models::{
    Ack, ClaimBatch, ClaimRequest, CompletionReport, HealthQuery, HealthReport, NewSession,
    NodeProgress, SessionCreated, SessionState, SessionStatus, SessionStrategy, SessionSummary,
    SpecResult,
};
use testledger_api::{ApiError, Coordinator};
use testledger_core::RunError;
use testledger_core::executor::{ExecutionResult, TestCommand, TestExecutor};

// ---------------------------------------------------------------------------
// FakeCoordinator
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeSession {
    project_id: i64,
    strategy: SessionStrategy,
    state: SessionState,
    specs: Vec<String>,
    next: usize,
    /// node id -> specs claimed, in claim order.
    claims: Vec<(String, Vec<String>)>,
    completions: Vec<CompletionReport>,
}

impl FakeSession {
    fn node_entry(&mut self, node_id: &str) -> &mut Vec<String> {
        let index = match self.claims.iter().position(|(id, _)| id == node_id) {
            Some(index) => index,
            None => {
                self.claims.push((node_id.to_owned(), Vec::new()));
                self.claims.len() - 1
            }
        };
        &mut self.claims[index].1
    }

    fn owner_of(&self, spec: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(_, specs)| specs.iter().any(|s| s == spec))
            .map(|(node, _)| node.as_str())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    health: HealthReport,
    health_queries: Vec<HealthQuery>,
    sessions: HashMap<String, FakeSession>,
    next_session: u32,
    fail_health_config: bool,
    fail_completions: bool,
    reject_credentials: bool,
}

/// In-memory [`Coordinator`].
#[derive(Debug, Default)]
pub struct FakeCoordinator {
    state: Mutex<FakeState>,
    claim_calls: AtomicUsize,
}

fn server_error(message: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        body: message.to_owned(),
    }
}

fn not_found(session_id: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        body: format!("session {session_id} not found"),
    }
}

impl FakeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this report from the health config endpoint.
    pub fn with_health(self, report: HealthReport) -> Self {
        self.lock().health = report;
        self
    }

    /// Make every health config call fail with a 500.
    pub fn fail_health_config(&self) {
        self.lock().fail_health_config = true;
    }

    /// Make every completion call fail with a 500.
    pub fn fail_completions(&self) {
        self.lock().fail_completions = true;
    }

    /// Make the credential check answer "rejected".
    pub fn reject_credentials(&self) {
        self.lock().reject_credentials = true;
    }

    /// Open a session over `specs` directly, bypassing the trait.
    pub fn open_session(&self, specs: &[&str]) -> String {
        let mut state = self.lock();
        state.next_session += 1;
        let id = format!("session-{}", state.next_session);
        state.sessions.insert(
            id.clone(),
            FakeSession {
                project_id: 1,
                strategy: SessionStrategy::RoundRobin,
                state: SessionState::Open,
                specs: specs.iter().map(|s| (*s).to_owned()).collect(),
                next: 0,
                claims: Vec::new(),
                completions: Vec::new(),
            },
        );
        id
    }

    pub fn health_queries(&self) -> Vec<HealthQuery> {
        self.lock().health_queries.clone()
    }

    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    /// Completions recorded for a session, in arrival order.
    pub fn completions(&self, session_id: &str) -> Vec<CompletionReport> {
        self.lock()
            .sessions
            .get(session_id)
            .map(|s| s.completions.clone())
            .unwrap_or_default()
    }

    /// Every spec claimed in a session, across all nodes.
    pub fn claimed_specs(&self, session_id: &str) -> Vec<String> {
        self.lock()
            .sessions
            .get(session_id)
            .map(|s| s.claims.iter().flat_map(|(_, specs)| specs.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Coordinator for FakeCoordinator {
    async fn health_config(&self, query: &HealthQuery) -> Result<HealthReport, ApiError> {
        let mut state = self.lock();
        state.health_queries.push(query.clone());
        if state.fail_health_config {
            return Err(server_error("health config unavailable"));
        }
        Ok(state.health.clone())
    }

    async fn create_session(&self, session: &NewSession) -> Result<SessionCreated, ApiError> {
        let specs: Vec<&str> = session.total_specs.iter().map(String::as_str).collect();
        let session_id = self.open_session(&specs);
        let mut state = self.lock();
        if let Some(created) = state.sessions.get_mut(&session_id) {
            created.project_id = session.project_id;
            created.strategy = session.strategy;
        }
        Ok(SessionCreated {
            session_id,
            total_specs_count: session.total_specs.len(),
        })
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimBatch, ApiError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(&request.session_id)
            .ok_or_else(|| not_found(&request.session_id))?;
        if session.state == SessionState::Closed {
            return Ok(ClaimBatch::default());
        }

        let end = (session.next + request.batch_size as usize).min(session.specs.len());
        let specs = session.specs[session.next..end].to_vec();
        session.next = end;
        let remaining = (session.specs.len() - session.next) as u64;
        session.node_entry(&request.node_id).extend(specs.iter().cloned());

        Ok(ClaimBatch { specs, remaining })
    }

    async fn complete(&self, report: &CompletionReport) -> Result<Ack, ApiError> {
        let mut state = self.lock();
        if state.fail_completions {
            return Err(server_error("completion store unavailable"));
        }
        let session = state
            .sessions
            .get_mut(&report.session_id)
            .ok_or_else(|| not_found(&report.session_id))?;
        if session.owner_of(&report.spec_file).is_none() {
            return Err(ApiError::Status {
                status: 409,
                body: format!("{} was never claimed", report.spec_file),
            });
        }
        session.completions.push(report.clone());
        Ok(Ack {
            status: "ok".to_owned(),
        })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError> {
        let state = self.lock();
        let session = state
            .sessions
            .get(session_id)
            .ok_or_else(|| not_found(session_id))?;

        let count = |node: Option<&str>, result: Option<SpecResult>| {
            session
                .completions
                .iter()
                .filter(|c| node.is_none_or(|n| session.owner_of(&c.spec_file) == Some(n)))
                .filter(|c| result.is_none_or(|r| c.result == r))
                .count() as u64
        };

        let nodes = session
            .claims
            .iter()
            .map(|(node_id, specs)| NodeProgress {
                node_id: node_id.clone(),
                claimed: specs.len() as u64,
                completed: count(Some(node_id.as_str()), None),
                passed: count(Some(node_id.as_str()), Some(SpecResult::Passed)),
                failed: count(Some(node_id.as_str()), Some(SpecResult::Failed)),
            })
            .collect();

        Ok(SessionStatus {
            session: SessionSummary {
                session_id: session_id.to_owned(),
                project_id: Some(session.project_id),
                status: session.state,
                strategy: session.strategy,
                total_specs: session.specs.len() as u64,
                claimed_count: session.next as u64,
                completed_count: count(None, None),
                passed_count: count(None, Some(SpecResult::Passed)),
                failed_count: count(None, Some(SpecResult::Failed)),
                created_at: None,
            },
            nodes,
        })
    }

    async fn close_session(&self, session_id: &str) -> Result<Ack, ApiError> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found(session_id))?;
        session.state = SessionState::Closed;
        Ok(Ack {
            status: "closed".to_owned(),
        })
    }

    async fn verify_credentials(&self) -> Result<bool, ApiError> {
        Ok(!self.lock().reject_credentials)
    }
}

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// [`TestExecutor`] that records commands instead of spawning them.
#[derive(Debug)]
pub struct RecordingExecutor {
    exit_code: i32,
    duration: Duration,
    commands: Mutex<Vec<TestCommand>>,
}

impl RecordingExecutor {
    /// Every execution exits with `exit_code` after a nominal second.
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            duration: Duration::from_secs(1),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn commands(&self) -> Vec<TestCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestExecutor for RecordingExecutor {
    async fn execute(&self, command: &TestCommand) -> Result<ExecutionResult, RunError> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(ExecutionResult {
            exit_code: self.exit_code,
            duration: self.duration,
        })
    }
}

// ---------------------------------------------------------------------------
// Project fixtures
// ---------------------------------------------------------------------------

/// A temporary project directory containing the given files.
pub fn project_with(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (relative, contents) in files {
        write_file(dir.path(), relative, contents);
    }
    dir
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
