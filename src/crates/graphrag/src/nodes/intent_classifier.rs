//! Intent classification node

use crate::intents::{Intent, AVAILABLE_INTENTS, DEFAULT_ENTITY_TYPES};
use crate::nodes::PipelineNode;
use crate::state::PipelineState;
use async_trait::async_trait;
use llm::LlmGateway;
use serde::Serialize;
use serde_json::{json, Value};

/// Partial update emitted by [`IntentClassifierNode`]
#[derive(Debug, Serialize)]
pub struct IntentClassifierUpdate {
    /// Classified intent
    pub intent: Intent,
    /// Classifier certainty
    pub intent_confidence: f64,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Classifies the question into the closed intent vocabulary
///
/// Any failure collapses to `intent = unknown` with an error annotation -
/// the pipeline then routes straight to the response generator.
pub struct IntentClassifierNode {
    gateway: LlmGateway,
}

impl IntentClassifierNode {
    /// Create the node
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PipelineNode for IntentClassifierNode {
    fn name(&self) -> &'static str {
        "intent_classifier"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        let question = state.question.trim();
        tracing::info!(question = %question.chars().take(50).collect::<String>(), "Classifying intent");

        if question.is_empty() {
            return serde_json::to_value(IntentClassifierUpdate {
                intent: Intent::Unknown,
                intent_confidence: 0.0,
                execution_path: vec![self.name().to_string()],
                error: None,
            })
            .unwrap_or_else(|_| json!({}));
        }

        match self
            .gateway
            .classify_and_extract(question, &AVAILABLE_INTENTS, &DEFAULT_ENTITY_TYPES, "")
            .await
        {
            Ok(result) => {
                let intent = Intent::parse(&result.intent);
                tracing::info!(intent = intent.as_str(), confidence = result.confidence, "Intent classified");
                serde_json::to_value(IntentClassifierUpdate {
                    intent,
                    intent_confidence: result.confidence,
                    execution_path: vec![self.name().to_string()],
                    error: None,
                })
                .unwrap_or_else(|_| json!({}))
            }
            Err(e) => {
                tracing::error!(error = %e, "Intent classification failed");
                serde_json::to_value(IntentClassifierUpdate {
                    intent: Intent::Unknown,
                    intent_confidence: 0.0,
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Intent classification failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}
