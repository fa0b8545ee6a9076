//! Compiled, executable graph

mod execution;
mod streaming;

use crate::graph::StateGraph;
use pipeline_checkpoint::CheckpointSaver;
use serde_json::Value;
use std::sync::Arc;

pub use streaming::StreamEvent;

/// Default cap on supersteps; a fixed DAG never comes close
const DEFAULT_STEP_LIMIT: usize = 25;

/// Validated, executable form of a [`StateGraph`]
///
/// Produced by [`StateGraph::compile`]. Holds the node table, the edge
/// plans, the state schema and (optionally) a checkpoint saver. Execution
/// entry points live in the `execution` and `streaming` submodules.
pub struct CompiledGraph {
    pub(crate) graph: StateGraph,
    pub(crate) entry: String,
    pub(crate) checkpoint_saver: Option<Arc<dyn CheckpointSaver>>,
    pub(crate) step_limit: usize,
}

impl CompiledGraph {
    pub(crate) fn new(graph: StateGraph, entry: String) -> Self {
        Self {
            graph,
            entry,
            checkpoint_saver: None,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Attach a checkpoint saver
    ///
    /// With a saver attached, every `invoke`/`stream` call that carries a
    /// [`CheckpointConfig`](pipeline_checkpoint::CheckpointConfig) resumes
    /// from the thread's latest snapshot and persists one snapshot per
    /// superstep.
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpoint_saver = Some(saver);
        self
    }

    /// Override the superstep cap
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Load a thread's latest checkpointed state, if any
    pub async fn get_state(
        &self,
        config: &pipeline_checkpoint::CheckpointConfig,
    ) -> crate::error::Result<Option<Value>> {
        let Some(saver) = &self.checkpoint_saver else {
            return Ok(None);
        };
        Ok(saver
            .get_tuple(config)
            .await?
            .map(|tuple| tuple.checkpoint.channel_values))
    }
}
