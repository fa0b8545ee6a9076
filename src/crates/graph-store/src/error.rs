//! Error types for graph store operations

use thiserror::Error;

/// Convenience result type using [`GraphStoreError`]
pub type Result<T> = std::result::Result<T, GraphStoreError>;

/// Errors raised by the graph access layer
#[derive(Debug, Error)]
pub enum GraphStoreError {
    /// Bad identifier, empty required input, out-of-range parameter.
    /// Never downgraded; surfaces to the caller before a query is emitted.
    #[error("Validation error: {message}")]
    Validation {
        /// What failed validation
        message: String,
        /// Field the failure refers to
        field: String,
    },

    /// Graph unreachable or the driver failed below the query level
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The graph rejected an emitted query
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// A requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic-lock version mismatch or concurrent modification
    #[error("Conflict: {message}")]
    Conflict {
        /// Description including the versions involved
        message: String,
        /// Version the caller expected
        expected_version: Option<i64>,
        /// Version actually stored
        current_version: Option<i64>,
    },

    /// Operation not valid in the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Row or value deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphStoreError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.into(),
        }
    }

    /// Create a version-mismatch conflict
    pub fn version_conflict(expected: i64, current: Option<i64>) -> Self {
        Self::Conflict {
            message: match current {
                Some(current) => {
                    format!("Version mismatch: expected {expected}, current {current}")
                }
                None => format!("Version mismatch: expected {expected}"),
            },
            expected_version: Some(expected),
            current_version: current,
        }
    }
}
