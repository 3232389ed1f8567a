use thiserror::Error;

/// Failure of a call against the coordination service.
///
/// No variant is retried by the client; callers decide whether a failure is
/// fatal.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

impl ApiError {
    /// `true` when the service rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}
