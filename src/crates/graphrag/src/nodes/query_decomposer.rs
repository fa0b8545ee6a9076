//! Multi-hop query decomposition node

use crate::intents::Intent;
use crate::nodes::PipelineNode;
use crate::state::PipelineState;
use async_trait::async_trait;
use llm::{LlmGateway, QueryDecomposition};
use serde::Serialize;
use serde_json::{json, Value};

/// Partial update emitted by [`QueryDecomposerNode`]
#[derive(Debug, Serialize)]
pub struct QueryDecomposerUpdate {
    /// The decomposition plan
    pub query_plan: QueryDecomposition,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decomposes multi-hop questions into traversal plans
///
/// Only path_analysis / relationship_search / mentoring_network questions
/// are decomposed; every other intent gets a trivial single-hop plan with
/// no LLM call. Decomposition failure also falls back to single-hop.
pub struct QueryDecomposerNode {
    gateway: LlmGateway,
}

impl QueryDecomposerNode {
    /// Create the node
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PipelineNode for QueryDecomposerNode {
    fn name(&self) -> &'static str {
        "query_decomposer"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question", "intent"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        let intent = state.intent.unwrap_or(Intent::Unknown);

        if !intent.is_multi_hop() {
            tracing::info!(intent = intent.as_str(), "Skipping decomposition");
            return serde_json::to_value(QueryDecomposerUpdate {
                query_plan: QueryDecomposition::single_hop("Single-hop query"),
                execution_path: vec![format!("{}_skipped", self.name())],
                error: None,
            })
            .unwrap_or_else(|_| json!({}));
        }

        tracing::info!(
            question = %state.question.chars().take(50).collect::<String>(),
            "Decomposing query"
        );

        match self.gateway.decompose_query(&state.question).await {
            Ok(plan) => {
                tracing::info!(
                    hop_count = plan.hop_count,
                    multi_hop = plan.is_multi_hop,
                    "Query decomposed"
                );
                serde_json::to_value(QueryDecomposerUpdate {
                    query_plan: plan,
                    execution_path: vec![self.name().to_string()],
                    error: None,
                })
                .unwrap_or_else(|_| json!({}))
            }
            Err(e) => {
                tracing::error!(error = %e, "Query decomposition failed");
                serde_json::to_value(QueryDecomposerUpdate {
                    query_plan: QueryDecomposition::single_hop(format!(
                        "Decomposition failed: {e}"
                    )),
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Query decomposition failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}
