use thiserror::Error;

use testledger_api::ApiError;

use crate::claim::ClaimState;

/// Fatal failures of a run. Each message names what failed and, where one
/// exists, the flag or command that fixes it.
///
/// Completion-report failures are deliberately absent: they are warnings.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("unknown framework: {name}. Available: {available}")]
    UnknownFramework { name: String, available: String },

    #[error(
        "could not detect a test framework in {dir}. Use --framework to specify one of: {available}"
    )]
    FrameworkNotDetected { dir: String, available: String },

    #[error("test command is empty")]
    EmptyCommand,

    #[error(
        "failed to fetch flaky and quarantined tests; check --api-url (TESTLEDGER_API_URL), --project-id and the API token (TESTLEDGER_API_TOKEN)"
    )]
    HealthConfig(#[source] ApiError),

    #[error("failed to claim specs for session {session_id}")]
    Claim {
        session_id: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to start test process `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on test process `{command}`")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid claim state transition: {from} -> {to}")]
    InvalidTransition { from: ClaimState, to: ClaimState },
}
