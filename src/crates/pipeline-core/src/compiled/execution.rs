//! Graph execution (invoke)
//!
//! The superstep loop: run the frontier concurrently, merge updates in
//! completion order, checkpoint, route. Fan-out fills a frontier with
//! several nodes; fan-in happens when their edges converge on one successor,
//! which enters the next frontier exactly once.

use super::{CompiledGraph, StreamEvent};
use crate::error::{PipelineError, Result};
use crate::graph::EdgePlan;
use crate::graph::END;
use pipeline_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

impl CompiledGraph {
    /// Execute the graph to completion without checkpointing
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.invoke_with_config(input, None).await
    }

    /// Execute the graph, resuming from and persisting to the thread's
    /// checkpoint history when a config is given
    ///
    /// Turns on the same thread id are serialised on the saver's per-thread
    /// lock; turns on different threads run fully in parallel. Dropping the
    /// returned future aborts every in-flight node task.
    #[tracing::instrument(skip(self, input), fields(node_count = self.graph.nodes.len()))]
    pub async fn invoke_with_config(
        &self,
        input: Value,
        config: Option<CheckpointConfig>,
    ) -> Result<Value> {
        tracing::info!("Starting graph execution");
        let result = self.run_loop(input, config, None).await;
        match &result {
            Ok(_) => tracing::info!("Graph execution completed"),
            Err(e) => tracing::error!(error = %e, "Graph execution failed"),
        }
        result
    }

    pub(crate) async fn run_loop(
        &self,
        input: Value,
        config: Option<CheckpointConfig>,
        events: Option<UnboundedSender<StreamEvent>>,
    ) -> Result<Value> {
        // Resume from the latest snapshot while holding the turn lock for
        // the whole run, so concurrent turns on one thread serialise.
        let mut _turn_guard = None;
        let mut state = Value::Object(serde_json::Map::new());

        if let (Some(saver), Some(cfg)) = (&self.checkpoint_saver, &config) {
            _turn_guard = Some(saver.thread_lock(&cfg.thread_id).await);

            let latest = CheckpointConfig::new(&cfg.thread_id);
            if let Some(tuple) = saver.get_tuple(&latest).await? {
                tracing::debug!(thread_id = %cfg.thread_id, "Resuming from checkpoint");
                state = tuple.checkpoint.channel_values;
            }
        }

        self.graph.schema.apply(&mut state, &input)?;

        if let (Some(saver), Some(cfg)) = (&self.checkpoint_saver, &config) {
            saver
                .put(cfg, Checkpoint::new(state.clone()), CheckpointMetadata::input())
                .await?;
        }

        let mut frontier = vec![self.entry.clone()];
        let mut step: i64 = 0;

        loop {
            if step as usize >= self.step_limit {
                return Err(PipelineError::StepLimitExceeded(self.step_limit));
            }

            tracing::debug!(step, frontier = ?frontier, "Running superstep");

            let mut tasks: JoinSet<(String, Result<Value>)> = JoinSet::new();
            for name in &frontier {
                let node = self
                    .graph
                    .nodes
                    .get(name)
                    .ok_or_else(|| {
                        PipelineError::Validation(format!("frontier node '{name}' not found"))
                    })?
                    .clone();
                let name = name.clone();
                let snapshot = state.clone();
                tasks.spawn(async move {
                    let update = node(snapshot).await;
                    (name, update)
                });
            }

            // Merge in completion order: the execution path records the
            // order nodes finished, not the order they started.
            let mut completed: Vec<String> = Vec::with_capacity(frontier.len());
            while let Some(joined) = tasks.join_next().await {
                let (name, update) = match joined {
                    Ok(pair) => pair,
                    Err(e) => {
                        tasks.abort_all();
                        return Err(PipelineError::node_execution("<task>", e.to_string()));
                    }
                };

                let update = match update {
                    Ok(update) => update,
                    Err(e) => {
                        tasks.abort_all();
                        return Err(PipelineError::node_execution(&name, e.to_string()));
                    }
                };

                self.graph.schema.apply(&mut state, &update)?;

                if let Some(tx) = &events {
                    let _ = tx.send(StreamEvent {
                        node: name.clone(),
                        output: update,
                    });
                }

                completed.push(name);
            }

            if let (Some(saver), Some(cfg)) = (&self.checkpoint_saver, &config) {
                saver
                    .put(
                        cfg,
                        Checkpoint::new(state.clone()),
                        CheckpointMetadata::step(step, completed.clone()),
                    )
                    .await?;
            }

            let mut next: Vec<String> = Vec::new();
            for name in &completed {
                let targets: Vec<String> = match self.graph.edges.get(name) {
                    None => Vec::new(),
                    Some(EdgePlan::Direct(to)) => vec![to.clone()],
                    Some(EdgePlan::Conditional(router)) => router(&state)
                        .targets()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                };

                for target in targets {
                    if target == END {
                        continue;
                    }
                    if !self.graph.nodes.contains_key(&target) {
                        return Err(PipelineError::UnknownRouteTarget {
                            node: name.clone(),
                            target,
                        });
                    }
                    if !next.contains(&target) {
                        next.push(target);
                    }
                }
            }

            if next.is_empty() {
                break;
            }

            frontier = next;
            step += 1;
        }

        Ok(state)
    }
}
