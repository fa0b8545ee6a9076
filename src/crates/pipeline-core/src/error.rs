//! Error types for graph construction and execution

use thiserror::Error;

/// Convenience result type using [`PipelineError`]
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the execution engine
///
/// Application nodes are written to *never* fail: they collapse their own
/// errors into state updates. The variants here therefore describe engine
/// misuse (invalid graph structure, unknown route targets) and
/// infrastructure failures (checkpointing, serialization), not business
/// failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Graph structure validation failed during `compile`
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A node's future resolved to an error the node did not absorb
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Node that failed
        node: String,
        /// Failure description
        error: String,
    },

    /// A router returned a target that is not a node
    #[error("Router on '{node}' returned unknown target '{target}'")]
    UnknownRouteTarget {
        /// Node whose router misbehaved
        node: String,
        /// The unknown target name
        target: String,
    },

    /// State merge failed (reducer type mismatch, non-object state)
    #[error("State error: {0}")]
    State(String),

    /// Superstep limit exceeded; the graph is looping
    #[error("Execution exceeded {0} supersteps")]
    StepLimitExceeded(usize),

    /// Checkpoint persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] pipeline_checkpoint::CheckpointError),

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a node execution error with context
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }
}
