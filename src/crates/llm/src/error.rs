//! Error types for LLM operations

use thiserror::Error;

/// Convenience result type using [`LlmError`]
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors raised by the provider client and the typed gateway
#[derive(Debug, Error)]
pub enum LlmError {
    /// Credentials missing or rejected (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider throttled the request and retries were exhausted
    #[error("Rate limited after {attempts} attempts")]
    RateLimited {
        /// Attempts made before giving up
        attempts: usize,
    },

    /// Network-level failure reaching the provider
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The model produced malformed JSON or a payload missing required fields
    #[error("Response shape error: {0}")]
    ResponseShape(String),

    /// The call exceeded its deadline
    #[error("LLM call timed out after {0} seconds")]
    Timeout(u64),

    /// Provider returned a non-success status outside the retryable set
    #[error("Provider error (status {status}): {message}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Request serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout(0)
        } else {
            LlmError::Connectivity(e.to_string())
        }
    }
}
