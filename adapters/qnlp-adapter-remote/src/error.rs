//! Error types for the remote adapter.

use qnlp_hal::HalError;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur when talking to a remote executor service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No endpoint configured.
    #[error("Missing endpoint: remote backend requires an endpoint URL")]
    MissingEndpoint,

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Session handshake was rejected or malformed.
    #[error("Session handshake failed: {0}")]
    Handshake(String),

    /// Execution response carried neither counts nor expectations.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// Whether the failure was a request timing out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Http(e) if e.is_timeout())
    }
}

impl From<RemoteError> for HalError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::ApiError {
                status: 401 | 403, ..
            } => HalError::AuthenticationFailed(e.to_string()),
            RemoteError::MissingEndpoint => HalError::Configuration(e.to_string()),
            RemoteError::Handshake(msg) => HalError::Initialization(msg),
            RemoteError::Http(ref inner) if inner.is_timeout() => HalError::Timeout(e.to_string()),
            RemoteError::Http(ref inner) if inner.is_connect() => {
                HalError::BackendUnavailable(e.to_string())
            }
            _ => HalError::Backend(e.to_string()),
        }
    }
}
