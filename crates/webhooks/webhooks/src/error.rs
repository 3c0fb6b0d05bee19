//! Webhook relay error types.

use thiserror::Error;

/// Result type for webhook relay operations.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Error returned by a registered handler.
///
/// Boxed so handlers can use `?` on any error type they work with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for webhook relay operations.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Shared secret missing or mismatched.
    #[error("Invalid secret")]
    Unauthorized,

    /// A registered handler failed.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Invalid payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The request did not complete within the client timeout.
    #[error("Request timeout")]
    Timeout,

    /// The target could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The target answered with an error status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response text, truncated.
        body: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// Returns the HTTP status the receiver answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::Unauthorized => 401,
            WebhookError::InvalidPayload(_) => 400,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::InvalidPayload(err.to_string())
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WebhookError::Timeout
        } else if err.is_connect() {
            WebhookError::Connection(err.to_string())
        } else if err.is_builder() {
            WebhookError::ConfigError(err.to_string())
        } else {
            WebhookError::Internal(err.to_string())
        }
    }
}
