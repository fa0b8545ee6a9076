//! Error types for checkpoint operations

use thiserror::Error;

/// Convenience result type using [`CheckpointError`]
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while saving or loading checkpoints
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The requested thread has no checkpoints
    #[error("No checkpoint found for thread '{0}'")]
    ThreadNotFound(String),

    /// The requested checkpoint id does not exist on the thread
    #[error("Checkpoint '{checkpoint_id}' not found on thread '{thread_id}'")]
    CheckpointNotFound {
        /// Thread the lookup ran against
        thread_id: String,
        /// Missing checkpoint id
        checkpoint_id: String,
    },

    /// State could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific storage failure
    #[error("Storage error: {0}")]
    Storage(String),
}
