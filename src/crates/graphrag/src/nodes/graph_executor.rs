//! Query execution node

use crate::nodes::PipelineNode;
use crate::state::PipelineState;
use async_trait::async_trait;
use graph_store::GraphRepository;
use serde::Serialize;
use serde_json::{json, Value};

/// Partial update emitted by [`GraphExecutorNode`]
#[derive(Debug, Serialize)]
pub struct GraphExecutorUpdate {
    /// Serialised result rows
    pub graph_results: Vec<Value>,
    /// Row count
    pub result_count: i64,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the generated query against the graph
///
/// Empty results are not errors - the response generator renders the
/// "no matching records" message for them.
pub struct GraphExecutorNode {
    repository: GraphRepository,
}

impl GraphExecutorNode {
    /// Create the node
    pub fn new(repository: GraphRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PipelineNode for GraphExecutorNode {
    fn name(&self) -> &'static str {
        "graph_executor"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["cypher_query"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        if state.cypher_query.trim().is_empty() {
            tracing::warn!("No query to execute");
            return serde_json::to_value(GraphExecutorUpdate {
                graph_results: Vec::new(),
                result_count: 0,
                execution_path: vec![format!("{}_skipped", self.name())],
                error: None,
            })
            .unwrap_or_else(|_| json!({}));
        }

        tracing::info!(
            query = %state.cypher_query.chars().take(100).collect::<String>(),
            "Executing query"
        );

        match self
            .repository
            .execute_cypher(
                &state.cypher_query,
                Value::Object(state.cypher_parameters.clone()),
            )
            .await
        {
            Ok(results) => {
                tracing::info!(count = results.len(), "Query returned results");
                serde_json::to_value(GraphExecutorUpdate {
                    result_count: results.len() as i64,
                    graph_results: results,
                    execution_path: vec![self.name().to_string()],
                    error: None,
                })
                .unwrap_or_else(|_| json!({}))
            }
            Err(e) => {
                tracing::error!(error = %e, "Query execution failed");
                serde_json::to_value(GraphExecutorUpdate {
                    graph_results: Vec::new(),
                    result_count: 0,
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Query execution failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}
