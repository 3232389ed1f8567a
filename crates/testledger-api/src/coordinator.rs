//! The `Coordinator` trait -- the contract of the remote session service.
//!
//! All cross-node invariants (a spec is claimed by at most one node, the
//! remaining count is accurate) are enforced behind this trait. Callers
//! treat it as the single source of truth and hold no local session state.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{
    Ack, ClaimBatch, ClaimRequest, CompletionReport, HealthQuery, HealthReport, NewSession,
    SessionCreated, SessionStatus,
};

/// Request/response operations offered by the coordination service.
///
/// Every call is a single attempt. Implementations must not retry.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Fetch the specs to skip for a project.
    async fn health_config(&self, query: &HealthQuery) -> Result<HealthReport, ApiError>;

    /// Open a session over an ordered list of specs.
    async fn create_session(&self, session: &NewSession) -> Result<SessionCreated, ApiError>;

    /// Ask for up to `batch_size` unclaimed specs. An empty batch means the
    /// session is exhausted.
    async fn claim(&self, request: &ClaimRequest) -> Result<ClaimBatch, ApiError>;

    /// Record the outcome of one claimed spec.
    async fn complete(&self, report: &CompletionReport) -> Result<Ack, ApiError>;

    /// Aggregate counts plus the per-node breakdown.
    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, ApiError>;

    /// Close a session so no further claims succeed.
    async fn close_session(&self, session_id: &str) -> Result<Ack, ApiError>;

    /// Check whether the configured credentials are accepted.
    ///
    /// Returns `Ok(false)` when the service rejects them and `Err` for any
    /// other failure.
    async fn verify_credentials(&self) -> Result<bool, ApiError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Coordinator) {}
};
