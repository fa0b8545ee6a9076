//! Schema introspection node

use crate::nodes::PipelineNode;
use crate::state::PipelineState;
use async_trait::async_trait;
use graph_store::{GraphSchema, SchemaCache};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Partial update emitted by [`SchemaFetcherNode`]
#[derive(Debug, Serialize)]
pub struct SchemaFetcherUpdate {
    /// The schema snapshot (`None` on failure)
    pub schema: Option<GraphSchema>,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fetches the graph schema for the Cypher generator
///
/// Runs in parallel with entity extraction. Backed by the TTL schema
/// cache, so repeated turns do not hammer the store.
pub struct SchemaFetcherNode {
    cache: Arc<SchemaCache>,
}

impl SchemaFetcherNode {
    /// Create the node
    pub fn new(cache: Arc<SchemaCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl PipelineNode for SchemaFetcherNode {
    fn name(&self) -> &'static str {
        "schema_fetcher"
    }

    async fn process(&self, _state: &PipelineState) -> Value {
        tracing::info!("Fetching graph schema");

        match self.cache.get().await {
            Ok(schema) => {
                tracing::info!(
                    labels = schema.labels.len(),
                    relationship_types = schema.relationship_types.len(),
                    "Schema fetched"
                );
                serde_json::to_value(SchemaFetcherUpdate {
                    schema: Some(schema),
                    execution_path: vec![self.name().to_string()],
                    error: None,
                })
                .unwrap_or_else(|_| json!({}))
            }
            Err(e) => {
                tracing::error!(error = %e, "Schema fetch failed");
                serde_json::to_value(SchemaFetcherUpdate {
                    schema: None,
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Schema fetch failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}
