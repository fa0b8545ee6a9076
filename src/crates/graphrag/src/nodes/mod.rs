//! Pipeline nodes
//!
//! Every node implements [`PipelineNode`]: a name, the state keys it
//! reads, and an async `process` returning a partial state update. The
//! contract mirrors the engine's expectations:
//!
//! - input validation runs before processing (missing keys warn but do
//!   not abort - downstream nodes handle partial state),
//! - start/finish are logged,
//! - **no exception leakage**: a node that fails returns a patch carrying
//!   `error` and a `<name>_error` execution-path label instead of
//!   propagating. [`into_node_fn`] enforces the last guarantee at the
//!   engine boundary for defects the node itself missed.

pub mod cache_checker;
pub mod clarification_handler;
pub mod community_summarizer;
pub mod concept_expander;
pub mod cypher_generator;
pub mod entity_extractor;
pub mod entity_resolver;
pub mod graph_executor;
pub mod intent_classifier;
pub mod ontology_update_handler;
pub mod query_decomposer;
pub mod response_generator;
pub mod schema_fetcher;

pub use cache_checker::CacheCheckerNode;
pub use clarification_handler::ClarificationHandlerNode;
pub use community_summarizer::CommunitySummarizerNode;
pub use concept_expander::ConceptExpanderNode;
pub use cypher_generator::CypherGeneratorNode;
pub use entity_extractor::EntityExtractorNode;
pub use entity_resolver::EntityResolverNode;
pub use graph_executor::GraphExecutorNode;
pub use intent_classifier::IntentClassifierNode;
pub use ontology_update_handler::OntologyUpdateHandlerNode;
pub use query_decomposer::QueryDecomposerNode;
pub use response_generator::ResponseGeneratorNode;
pub use schema_fetcher::SchemaFetcherNode;

use crate::state::PipelineState;
use async_trait::async_trait;
use pipeline_core::graph::NodeFuture;
use serde_json::{json, Value};
use std::sync::Arc;

/// Uniform contract for pipeline nodes
#[async_trait]
pub trait PipelineNode: Send + Sync {
    /// Unique node name (recorded in the execution path)
    fn name(&self) -> &'static str;

    /// State keys this node reads
    fn input_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Compute a partial state update
    ///
    /// Must not panic and must not leak errors: failures collapse into a
    /// patch with `error` and `<name>_error` in the execution path.
    async fn process(&self, state: &PipelineState) -> Value;
}

/// Build an error patch for a node
pub fn error_patch(node_name: &str, message: impl std::fmt::Display) -> Value {
    json!({
        "error": format!("{node_name} failed: {message}"),
        "execution_path": [format!("{node_name}_error")],
    })
}

/// Adapt a [`PipelineNode`] to the engine's node function type
///
/// Validates declared input keys against the raw state (warn-only),
/// decodes the typed state, logs start/finish, and converts even a state
/// decoding failure into an error patch so nothing escapes the DAG.
pub fn into_node_fn(
    node: Arc<dyn PipelineNode>,
) -> impl Fn(Value) -> NodeFuture + Send + Sync + 'static {
    move |raw_state: Value| -> NodeFuture {
        let node = node.clone();
        Box::pin(async move {
            let name = node.name();

            if let Some(object) = raw_state.as_object() {
                let missing: Vec<&str> = node
                    .input_keys()
                    .iter()
                    .copied()
                    .filter(|key| !object.contains_key(*key))
                    .collect();
                if !missing.is_empty() {
                    tracing::warn!(node = name, ?missing, "Missing input keys, proceeding anyway");
                }
            }

            let state = match PipelineState::from_value(&raw_state) {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(node = name, error = %e, "State decode failed");
                    return Ok(error_patch(name, format!("state decode failed: {e}")));
                }
            };

            tracing::debug!(node = name, "Node started");
            let update = node.process(&state).await;
            tracing::debug!(node = name, "Node completed");

            Ok(update)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoNode;

    #[async_trait]
    impl PipelineNode for EchoNode {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn input_keys(&self) -> &'static [&'static str] {
            &["question"]
        }

        async fn process(&self, state: &PipelineState) -> Value {
            json!({
                "response": state.question.clone(),
                "execution_path": ["echo"],
            })
        }
    }

    #[tokio::test]
    async fn test_into_node_fn_runs_process() {
        let node_fn = into_node_fn(Arc::new(EchoNode));
        let update = node_fn(json!({"question": "hi"})).await.unwrap();
        assert_eq!(update["response"], "hi");
    }

    #[tokio::test]
    async fn test_undecodable_state_becomes_error_patch() {
        let node_fn = into_node_fn(Arc::new(EchoNode));
        // `intent` with a wrong type defeats deserialization.
        let update = node_fn(json!({"question": "hi", "intent": 42}))
            .await
            .unwrap();
        assert!(update["error"].as_str().unwrap().contains("echo failed"));
        assert_eq!(update["execution_path"][0], "echo_error");
    }

    #[test]
    fn test_error_patch_shape() {
        let patch = error_patch("cypher_generator", "boom");
        assert_eq!(patch["execution_path"][0], "cypher_generator_error");
        assert!(patch["error"].as_str().unwrap().contains("boom"));
    }
}
