//! Entity extraction node

use crate::intents::{AVAILABLE_INTENTS, DEFAULT_ENTITY_TYPES};
use crate::nodes::PipelineNode;
use crate::state::{EntityMap, MessageRole, PipelineState};
use async_trait::async_trait;
use llm::LlmGateway;
use serde::Serialize;
use serde_json::{json, Value};

/// Partial update emitted by [`EntityExtractorNode`]
#[derive(Debug, Serialize)]
pub struct EntityExtractorUpdate {
    /// Extracted entities by type
    pub entities: EntityMap,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Extracts typed entities from the question
///
/// Runs in parallel with the schema fetcher. The chat history (previous
/// turns on the same thread) is passed as context so follow-up questions
/// resolve pronouns. Failures collapse to an empty entity map.
pub struct EntityExtractorNode {
    gateway: LlmGateway,
    entity_types: Vec<&'static str>,
}

impl EntityExtractorNode {
    /// Create the node with the default entity types
    pub fn new(gateway: LlmGateway) -> Self {
        Self {
            gateway,
            entity_types: DEFAULT_ENTITY_TYPES.to_vec(),
        }
    }

    fn format_chat_history(state: &PipelineState) -> String {
        // Exclude the current question (the last user turn).
        let mut turns: Vec<String> = Vec::new();
        for message in &state.messages {
            let role = match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            turns.push(format!("{role}: {}", message.content));
        }
        if let Some(last) = turns.last() {
            if last.ends_with(&state.question) {
                turns.pop();
            }
        }
        turns.join("\n")
    }
}

#[async_trait]
impl PipelineNode for EntityExtractorNode {
    fn name(&self) -> &'static str {
        "entity_extractor"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        tracing::info!(
            question = %state.question.chars().take(50).collect::<String>(),
            "Extracting entities"
        );

        let history = Self::format_chat_history(state);

        match self
            .gateway
            .classify_and_extract(
                &state.question,
                &AVAILABLE_INTENTS,
                &self.entity_types,
                &history,
            )
            .await
        {
            Ok(result) => {
                let mut entities = EntityMap::new();
                let mut count = 0usize;

                for entity in result.entities {
                    let value = entity
                        .normalized
                        .filter(|n| !n.is_empty())
                        .unwrap_or(entity.value);
                    if value.is_empty() {
                        continue;
                    }
                    let bucket = entities.entry(entity.entity_type).or_default();
                    if !bucket.contains(&value) {
                        bucket.push(value);
                        count += 1;
                    }
                }

                tracing::info!(count, categories = entities.len(), "Entities extracted");

                serde_json::to_value(EntityExtractorUpdate {
                    entities,
                    execution_path: vec![self.name().to_string()],
                    error: None,
                })
                .unwrap_or_else(|_| json!({}))
            }
            Err(e) => {
                tracing::error!(error = %e, "Entity extraction failed");
                serde_json::to_value(EntityExtractorUpdate {
                    entities: EntityMap::new(),
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Entity extraction failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}
