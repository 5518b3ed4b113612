//! Remote service errors.

use serdes_guard_core::GuardError;
use thiserror::Error;

/// Errors talking to the remote validation service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Non-success HTTP status.
    #[error("HTTP error: {status} - {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request could not be sent.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not a valid payload.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Required configuration is absent.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
}

impl RemoteError {
    /// Create an HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }
}

impl From<RemoteError> for GuardError {
    fn from(err: RemoteError) -> Self {
        GuardError::remote(err.to_string())
    }
}
