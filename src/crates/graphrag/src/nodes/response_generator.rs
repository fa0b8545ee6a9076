//! Response generation node

use crate::nodes::PipelineNode;
use crate::state::{ChatMessage, PipelineState};
use async_trait::async_trait;
use llm::LlmGateway;
use serde::Serialize;
use serde_json::{json, Value};

/// Partial update emitted by [`ResponseGeneratorNode`]
#[derive(Debug, Serialize)]
pub struct ResponseGeneratorUpdate {
    /// The user-visible answer
    pub response: String,
    /// Assistant turn appended to the history
    pub messages: Vec<ChatMessage>,
    /// Path label
    pub execution_path: Vec<String>,
}

/// Produces the final natural-language answer
///
/// Three outcomes: an apologetic message when an upstream error is
/// present (`_error_handler`), a "no matching records" message for empty
/// results (`_empty`), and an LLM summary otherwise. When the summary
/// call itself fails, a structural fallback summarises the raw rows
/// (`_fallback`) - the user always gets a non-empty response.
pub struct ResponseGeneratorNode {
    gateway: LlmGateway,
}

impl ResponseGeneratorNode {
    /// Create the node
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }

    fn update(&self, response: String, suffix: &str) -> Value {
        serde_json::to_value(ResponseGeneratorUpdate {
            messages: vec![ChatMessage::assistant(&response)],
            response,
            execution_path: vec![format!("{}{suffix}", self.name())],
        })
        .unwrap_or_else(|_| json!({}))
    }

    fn fallback_summary(results: &[Value]) -> String {
        if results.is_empty() {
            return "결과를 찾을 수 없습니다.".to_string();
        }

        let mut lines = vec![format!("총 {}개의 결과를 찾았습니다:", results.len())];

        for (index, result) in results.iter().take(5).enumerate() {
            let Some(object) = result.as_object() else {
                continue;
            };
            let summary: Vec<String> = object
                .iter()
                .filter(|(key, value)| !value.is_null() && *key != "id" && *key != "labels")
                .take(3)
                .map(|(key, value)| match value.as_str() {
                    Some(text) => format!("{key}: {text}"),
                    None => format!("{key}: {value}"),
                })
                .collect();
            if !summary.is_empty() {
                lines.push(format!("{}. {}", index + 1, summary.join(", ")));
            }
        }

        if results.len() > 5 {
            lines.push(format!("... 외 {}개", results.len() - 5));
        }

        lines.join("\n")
    }
}

#[async_trait]
impl PipelineNode for ResponseGeneratorNode {
    fn name(&self) -> &'static str {
        "response_generator"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        tracing::info!(results = state.graph_results.len(), "Generating response");

        if let Some(error) = &state.error {
            return self.update(
                format!("죄송합니다. 질문을 처리하는 중 오류가 발생했습니다: {error}"),
                "_error_handler",
            );
        }

        if state.graph_results.is_empty() {
            return self.update(
                "죄송합니다. 질문에 해당하는 정보를 찾을 수 없습니다. \
                 다른 방식으로 질문해 주시거나, 검색 조건을 확인해 주세요."
                    .to_string(),
                "_empty",
            );
        }

        let results = Value::Array(state.graph_results.clone());
        match self
            .gateway
            .generate_response(&state.question, &results, &state.cypher_query)
            .await
        {
            Ok(response) => {
                tracing::info!(
                    response = %response.chars().take(100).collect::<String>(),
                    "Response generated"
                );
                self.update(response, "")
            }
            Err(e) => {
                tracing::error!(error = %e, "Response generation failed, using fallback");
                self.update(Self::fallback_summary(&state.graph_results), "_fallback")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::{LanguageModel, LlmError, ModelTier};
    use std::sync::Arc;

    #[derive(Clone)]
    struct TextModel {
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for TextModel {
        async fn generate_text(
            &self,
            _system: &str,
            _user: &str,
            _tier: ModelTier,
        ) -> llm::Result<String> {
            if self.fail {
                Err(LlmError::Connectivity("down".into()))
            } else {
                Ok("홍길동은 개발팀 소속입니다.".to_string())
            }
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

    fn node(fail: bool) -> ResponseGeneratorNode {
        ResponseGeneratorNode::new(LlmGateway::new(Arc::new(TextModel { fail })))
    }

    #[tokio::test]
    async fn test_error_state_renders_apology() {
        let mut state = PipelineState::initial("에러 유발", "s");
        state.error = Some("Cypher generation failed: boom".to_string());

        let update = node(false).process(&state).await;
        assert_eq!(update["execution_path"][0], "response_generator_error_handler");
        assert!(update["response"].as_str().unwrap().contains("오류가 발생했습니다"));
        // Assistant turn is appended.
        assert_eq!(update["messages"][0]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_empty_results_render_no_match_message() {
        let state = PipelineState::initial("알 수 없는 질문", "s");
        let update = node(false).process(&state).await;
        assert_eq!(update["execution_path"][0], "response_generator_empty");
        assert!(update["response"].as_str().unwrap().contains("찾을 수 없습니다"));
    }

    #[tokio::test]
    async fn test_results_produce_llm_answer() {
        let mut state = PipelineState::initial("홍길동 부서는?", "s");
        state.graph_results = vec![json!({"name": "홍길동", "department": "개발팀"})];

        let update = node(false).process(&state).await;
        assert_eq!(update["execution_path"][0], "response_generator");
        assert!(update["response"].as_str().unwrap().contains("홍길동"));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_summary() {
        let mut state = PipelineState::initial("홍길동 부서는?", "s");
        state.graph_results = vec![json!({"name": "홍길동", "department": "개발팀"})];

        let update = node(true).process(&state).await;
        assert_eq!(update["execution_path"][0], "response_generator_fallback");
        let response = update["response"].as_str().unwrap();
        assert!(response.contains("1개의 결과"));
        assert!(!response.is_empty());
    }

    #[test]
    fn test_fallback_summary_truncates() {
        let results: Vec<Value> = (0..8)
            .map(|i| json!({"name": format!("사람{i}")}))
            .collect();
        let summary = ResponseGeneratorNode::fallback_summary(&results);
        assert!(summary.contains("총 8개"));
        assert!(summary.contains("외 3개"));
    }
}
