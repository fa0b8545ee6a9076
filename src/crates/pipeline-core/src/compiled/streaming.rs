//! Streaming execution
//!
//! `stream_with_config` runs the same superstep loop as `invoke` but emits
//! a [`StreamEvent`] as each node completes, letting a chat surface render
//! intermediate progress. An engine-level failure surfaces as a final event
//! named `error` rather than an `Err` item, matching the pipeline's
//! "errors never escape the run" contract.

use super::CompiledGraph;
use futures::Stream;
use pipeline_checkpoint::CheckpointConfig;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// One node's completed output during a streamed run
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Node name (or `"error"` for the terminal failure event)
    pub node: String,
    /// The partial state update the node produced
    pub output: Value,
}

impl CompiledGraph {
    /// Execute the graph, yielding each node's output as it completes
    pub fn stream_with_config(
        &self,
        input: Value,
        config: Option<CheckpointConfig>,
    ) -> impl Stream<Item = StreamEvent> + Send + '_ {
        let (tx, mut rx) = mpsc::unbounded_channel();

        async_stream::stream! {
            let run = self.run_loop(input, config, Some(tx));
            tokio::pin!(run);

            let mut outcome: Option<crate::error::Result<Value>> = None;
            loop {
                tokio::select! {
                    result = &mut run, if outcome.is_none() => {
                        outcome = Some(result);
                    }
                    event = rx.recv() => {
                        match event {
                            Some(event) => yield event,
                            // Sender dropped: the run is over and the
                            // buffer is drained.
                            None => break,
                        }
                    }
                }
            }

            if let Some(Err(e)) = outcome {
                yield StreamEvent {
                    node: "error".to_string(),
                    output: json!({"error": e.to_string()}),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeFuture, StateGraph, END};
    use crate::state::{AppendReducer, StateSchema};
    use futures::StreamExt;

    fn record(name: &'static str) -> impl Fn(Value) -> NodeFuture + Send + Sync {
        move |_state| Box::pin(async move { Ok(json!({ "execution_path": [name] })) })
    }

    #[tokio::test]
    async fn test_stream_yields_one_event_per_node() {
        let mut graph = StateGraph::with_schema(
            StateSchema::new().with_field("execution_path", Box::new(AppendReducer)),
        );
        graph.add_node("a", record("a"));
        graph.add_node("b", record("b"));
        graph.set_entry_point("a");
        graph.add_edge("a", "b");
        graph.add_edge("b", END);

        let compiled = graph.compile().unwrap();
        let events: Vec<StreamEvent> = compiled
            .stream_with_config(json!({}), None)
            .collect()
            .await;

        let names: Vec<&str> = events.iter().map(|e| e.node.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(events[0].output["execution_path"], json!(["a"]));
    }

    #[tokio::test]
    async fn test_stream_emits_terminal_error_event() {
        let mut graph = StateGraph::new();
        graph.add_node("boom", |_state| {
            Box::pin(async {
                Err(crate::error::PipelineError::node_execution(
                    "boom",
                    "engine-level failure",
                ))
            })
        });
        graph.set_entry_point("boom");
        graph.add_edge("boom", END);

        let compiled = graph.compile().unwrap();
        let events: Vec<StreamEvent> = compiled
            .stream_with_config(json!({}), None)
            .collect()
            .await;

        let last = events.last().unwrap();
        assert_eq!(last.node, "error");
        assert!(last.output["error"]
            .as_str()
            .unwrap()
            .contains("engine-level failure"));
    }
}
