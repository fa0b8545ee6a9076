//! Error types for the ontology subsystem

use thiserror::Error;

/// Convenience result type using [`OntologyError`]
pub type Result<T> = std::result::Result<T, OntologyError>;

/// Domain errors raised by the proposal service and repositories
///
/// These propagate to the caller with structured context (the API surface
/// above maps them to status codes); they never leak into the query
/// pipeline, which absorbs failures into state updates.
#[derive(Debug, Error)]
pub enum OntologyError {
    /// No proposal with the given id
    #[error("Proposal not found: {0}")]
    ProposalNotFound(String),

    /// Optimistic-lock version mismatch
    #[error("Version mismatch: expected {expected}, current {current}")]
    Conflict {
        /// Version the caller expected
        expected: i64,
        /// Version actually stored (-1 when unknown)
        current: i64,
    },

    /// Operation not valid in the proposal's current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// What was attempted and why it is invalid
        message: String,
        /// The proposal's current status
        current_state: String,
    },

    /// Required field missing or malformed
    #[error("Validation error: {message}")]
    Validation {
        /// What failed validation
        message: String,
        /// Field the failure refers to
        field: String,
    },

    /// Graph access failure
    #[error("Graph store error: {0}")]
    Store(#[from] graph_store::GraphStoreError),

    /// Ontology file could not be parsed
    #[error("Ontology file error: {0}")]
    File(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OntologyError {
    /// Create an invalid-state error
    pub fn invalid_state(message: impl Into<String>, current_state: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
            current_state: current_state.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.into(),
        }
    }
}
