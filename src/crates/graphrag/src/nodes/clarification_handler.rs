//! Clarification node

use crate::nodes::PipelineNode;
use crate::state::{ChatMessage, PipelineState};
use async_trait::async_trait;
use llm::LlmGateway;
use serde::Serialize;
use serde_json::{json, Value};

/// Partial update emitted by [`ClarificationHandlerNode`]
#[derive(Debug, Serialize)]
pub struct ClarificationUpdate {
    /// The clarification question shown to the user
    pub response: String,
    /// Assistant turn appended to the history
    pub messages: Vec<ChatMessage>,
    /// Path label
    pub execution_path: Vec<String>,
}

/// Asks the user to clarify unresolved entities
///
/// Entered when resolution left at least one record without a graph id
/// and the intent is not an aggregate one. The pipeline terminates here;
/// the user's clarified follow-up starts a fresh turn on the same thread.
pub struct ClarificationHandlerNode {
    gateway: LlmGateway,
}

impl ClarificationHandlerNode {
    /// Create the node
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }

    fn unresolved_description(state: &PipelineState) -> String {
        let mut parts: Vec<String> = Vec::new();

        for entity in &state.resolved_entities {
            if entity.id.is_none() {
                let entity_type = entity
                    .labels
                    .first()
                    .map(String::as_str)
                    .unwrap_or("Unknown");
                parts.push(format!("{entity_type}: {}", entity.original_value));
            }
        }

        // Surface forms that never produced a resolution record.
        let recorded: Vec<&str> = state
            .resolved_entities
            .iter()
            .map(|e| e.original_value.as_str())
            .collect();
        for (entity_type, values) in &state.entities {
            for value in values {
                if !recorded.contains(&value.as_str()) {
                    parts.push(format!("{entity_type}: {value}"));
                }
            }
        }

        parts.join(", ")
    }

    fn fallback_message(state: &PipelineState) -> String {
        let mentions: Vec<String> = state
            .entities
            .values()
            .flatten()
            .map(|value| format!("'{value}'"))
            .collect();

        if mentions.is_empty() {
            return "죄송합니다. 질문을 이해하기 어렵습니다. \
                    조금 더 구체적으로 질문해 주시겠어요?"
                .to_string();
        }

        format!(
            "질문에서 {}을(를) 찾았지만, 데이터베이스에서 정확히 일치하는 정보를 \
             찾지 못했습니다. 혹시 다른 이름이나 추가 정보가 있으시다면 알려주세요.",
            mentions.join(", ")
        )
    }
}

#[async_trait]
impl PipelineNode for ClarificationHandlerNode {
    fn name(&self) -> &'static str {
        "clarification_handler"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question", "resolved_entities"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        tracing::info!("Generating clarification request");

        let unresolved = Self::unresolved_description(state);

        match self
            .gateway
            .generate_clarification(&state.question, &unresolved)
            .await
        {
            Ok(response) => {
                tracing::info!(
                    response = %response.chars().take(100).collect::<String>(),
                    "Clarification generated"
                );
                serde_json::to_value(ClarificationUpdate {
                    messages: vec![ChatMessage::assistant(&response)],
                    response,
                    execution_path: vec![self.name().to_string()],
                })
                .unwrap_or_else(|_| json!({}))
            }
            Err(e) => {
                tracing::error!(error = %e, "Clarification generation failed, using fallback");
                let response = Self::fallback_message(state);
                serde_json::to_value(ClarificationUpdate {
                    messages: vec![ChatMessage::assistant(&response)],
                    response,
                    execution_path: vec![format!("{}_fallback", self.name())],
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResolvedEntity;
    use llm::{LanguageModel, LlmError, ModelTier};
    use std::sync::Arc;

    #[derive(Clone)]
    struct EchoUnresolvedModel {
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for EchoUnresolvedModel {
        async fn generate_text(
            &self,
            _system: &str,
            user: &str,
            _tier: ModelTier,
        ) -> llm::Result<String> {
            if self.fail {
                return Err(LlmError::Connectivity("down".into()));
            }
            // Echo back so tests can check the unresolved terms were passed.
            Ok(format!("어떤 것을 말씀하시는지 확인해 주세요: {user}"))
        }

        async fn generate_json(
            &self,
            _system: &str,
            _user: &str,
            _tier: ModelTier,
        ) -> llm::Result<Value> {
            Ok(json!({}))
        }

        async fn embed(&self, _text: &str) -> llm::Result<Vec<f32>> {
            Ok(vec![])
        }

        fn clone_box(&self) -> Box<dyn LanguageModel> {
            Box::new(self.clone())
        }
    }

    fn state_with_unresolved(name: &str) -> PipelineState {
        let mut state = PipelineState::initial(format!("{name} 부서는?"), "s");
        state
            .entities
            .insert("Person".to_string(), vec![name.to_string()]);
        state.resolved_entities.push(ResolvedEntity {
            id: None,
            labels: vec!["Person".to_string()],
            name: name.to_string(),
            properties: serde_json::Map::new(),
            match_score: 0.0,
            original_value: name.to_string(),
        });
        state
    }

    #[tokio::test]
    async fn test_clarification_names_unresolved_entity() {
        let node = ClarificationHandlerNode::new(LlmGateway::new(Arc::new(
            EchoUnresolvedModel { fail: false },
        )));
        let update = node.process(&state_with_unresolved("홍길동")).await;

        assert_eq!(update["execution_path"][0], "clarification_handler");
        assert!(update["response"].as_str().unwrap().contains("홍길동"));
        assert_eq!(update["messages"][0]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_fallback_message_mentions_entities() {
        let node = ClarificationHandlerNode::new(LlmGateway::new(Arc::new(
            EchoUnresolvedModel { fail: true },
        )));
        let update = node.process(&state_with_unresolved("홍길동")).await;

        assert_eq!(update["execution_path"][0], "clarification_handler_fallback");
        assert!(update["response"].as_str().unwrap().contains("'홍길동'"));
    }

    #[test]
    fn test_unresolved_description_covers_unrecorded_forms() {
        let mut state = state_with_unresolved("홍길동");
        state
            .entities
            .get_mut("Person")
            .unwrap()
            .push("김철수".to_string());

        let description = ClarificationHandlerNode::unresolved_description(&state);
        assert!(description.contains("홍길동"));
        assert!(description.contains("김철수"));
    }
}
