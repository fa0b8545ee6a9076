//! Typed operations over a [`LanguageModel`]
//!
//! [`LlmGateway`] wraps any provider with the nine operations the pipeline
//! needs. Every JSON-typed operation deserialises the model's payload into
//! a struct here; missing or mistyped fields become
//! [`LlmError::ResponseShape`], which callers treat as a component failure.

use crate::config::ModelTier;
use crate::error::{LlmError, Result};
use crate::prompts;
use crate::traits::LanguageModel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// One entity surfaced by the fused classify/extract call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Entity type from the closed vocabulary (Person, Skill, ...)
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Surface form as it appeared in the question
    pub value: String,
    /// Optional normalised spelling suggested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
}

/// Result of intent classification + entity extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentExtraction {
    /// Intent drawn from the whitelist, or `unknown`
    pub intent: String,
    /// Model-reported certainty, clamped to [0, 1]
    pub confidence: f64,
    /// Extracted entities
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
}

/// One traversal step of a decomposed multi-hop query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHop {
    /// Human-readable step description
    pub description: String,
    /// Relationship type the step traverses
    pub relationship: String,
    /// Traversal direction: in, out or both
    pub direction: String,
    /// Optional filter expression for the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// A decomposed query plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDecomposition {
    /// Whether the question needs more than one hop
    pub is_multi_hop: bool,
    /// Number of hops in the plan
    pub hop_count: u32,
    /// The ordered hops
    #[serde(default)]
    pub hops: Vec<QueryHop>,
    /// What the final query should return
    #[serde(default)]
    pub final_return: String,
    /// Model's explanation of the plan
    #[serde(default)]
    pub explanation: String,
}

impl QueryDecomposition {
    /// Trivial single-hop plan used for out-of-scope intents and failures
    pub fn single_hop(explanation: impl Into<String>) -> Self {
        Self {
            is_multi_hop: false,
            hop_count: 1,
            hops: Vec::new(),
            final_return: String::new(),
            explanation: explanation.into(),
        }
    }
}

/// A generated parameterised Cypher query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCypher {
    /// The query text with `$name` placeholders
    pub cypher: String,
    /// Placeholder values
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Optional model explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Ontology classification of an unresolved term
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyAnalysis {
    /// NEW_CONCEPT, NEW_SYNONYM or NEW_RELATION (free-form; parsed later)
    #[serde(rename = "type")]
    pub proposal_type: String,
    /// Suggested action description
    #[serde(default)]
    pub action: String,
    /// Suggested parent concept (NEW_CONCEPT)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Suggested canonical form (NEW_SYNONYM)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// Model certainty, clamped to [0, 1]
    #[serde(default)]
    pub confidence: f64,
}

/// Parsed chat-initiated ontology update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParse {
    /// add_concept, add_synonym or add_relation
    pub action: String,
    /// Term the user wants to add or link
    pub term: String,
    /// Category the term belongs to
    #[serde(default)]
    pub category: String,
    /// Target term (canonical or relation endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Requested relation type for add_relation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    /// Model certainty, clamped to [0, 1]
    #[serde(default)]
    pub confidence: f64,
    /// Model reasoning
    #[serde(default)]
    pub reasoning: String,
}

fn clamp_confidence(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Typed operation layer over any [`LanguageModel`]
#[derive(Clone)]
pub struct LlmGateway {
    model: Arc<dyn LanguageModel>,
}

impl LlmGateway {
    /// Wrap a provider
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Borrow the underlying provider
    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Classify intent and extract entities in one light-tier call
    ///
    /// An intent outside `available_intents` normalises to `unknown`;
    /// confidence is clamped to [0, 1].
    pub async fn classify_and_extract(
        &self,
        question: &str,
        available_intents: &[&str],
        entity_types: &[&str],
        chat_history: &str,
    ) -> Result<IntentExtraction> {
        let (system, user) =
            prompts::classify_and_extract(question, available_intents, entity_types, chat_history);

        let payload = self
            .model
            .generate_json(&system, &user, ModelTier::Light)
            .await?;

        let mut parsed: IntentExtraction = serde_json::from_value(payload)
            .map_err(|e| LlmError::ResponseShape(format!("intent extraction: {e}")))?;

        if !available_intents.contains(&parsed.intent.as_str()) {
            tracing::warn!(intent = %parsed.intent, "Model returned invalid intent, using unknown");
            parsed.intent = "unknown".to_string();
        }
        parsed.confidence = clamp_confidence(parsed.confidence);

        Ok(parsed)
    }

    /// Decompose a question into a multi-hop plan (light tier)
    pub async fn decompose_query(&self, question: &str) -> Result<QueryDecomposition> {
        let (system, user) = prompts::decompose_query(question);

        let payload = self
            .model
            .generate_json(&system, &user, ModelTier::Light)
            .await?;

        serde_json::from_value(payload)
            .map_err(|e| LlmError::ResponseShape(format!("query decomposition: {e}")))
    }

    /// Generate a parameterised Cypher query at the requested tier
    pub async fn generate_cypher(
        &self,
        question: &str,
        schema: &Value,
        entities: &Value,
        plan: Option<&Value>,
        tier: ModelTier,
    ) -> Result<GeneratedCypher> {
        let schema_text = serde_json::to_string_pretty(schema)?;
        let entities_text = serde_json::to_string_pretty(entities)?;
        let plan_text = plan.map(serde_json::to_string_pretty).transpose()?;

        let (system, user) = prompts::generate_cypher(
            question,
            &schema_text,
            &entities_text,
            plan_text.as_deref(),
        );

        let payload = self.model.generate_json(&system, &user, tier).await?;

        serde_json::from_value(payload)
            .map_err(|e| LlmError::ResponseShape(format!("cypher generation: {e}")))
    }

    /// Summarise results into a natural-language answer (light tier)
    pub async fn generate_response(
        &self,
        question: &str,
        results: &Value,
        cypher: &str,
    ) -> Result<String> {
        let results_text = serde_json::to_string_pretty(results)?;
        let (system, user) = prompts::generate_response(question, &results_text, cypher);
        self.model
            .generate_text(&system, &user, ModelTier::Light)
            .await
    }

    /// Compose a clarification question for unresolved entities (light tier)
    pub async fn generate_clarification(
        &self,
        question: &str,
        unresolved_entities: &str,
    ) -> Result<String> {
        let (system, user) = prompts::generate_clarification(question, unresolved_entities);
        self.model
            .generate_text(&system, &user, ModelTier::Light)
            .await
    }

    /// Answer a macro-level question from assembled statistics (heavy tier)
    pub async fn community_summary(&self, context: &str, question: &str) -> Result<String> {
        let (system, user) = prompts::community_summary(context, question);
        self.model
            .generate_text(&system, &user, ModelTier::Heavy)
            .await
    }

    /// Classify an unresolved term against the ontology (light tier)
    pub async fn analyze_ontology_term(
        &self,
        term: &str,
        category: &str,
        question: &str,
        known_concepts: &str,
    ) -> Result<OntologyAnalysis> {
        let (system, user) =
            prompts::ontology_analysis(term, category, question, known_concepts);

        let payload = self
            .model
            .generate_json(&system, &user, ModelTier::Light)
            .await?;

        let mut parsed: OntologyAnalysis = serde_json::from_value(payload)
            .map_err(|e| LlmError::ResponseShape(format!("ontology analysis: {e}")))?;
        parsed.confidence = clamp_confidence(parsed.confidence);

        Ok(parsed)
    }

    /// Parse a chat-initiated ontology update request (light tier)
    pub async fn parse_ontology_update(&self, question: &str) -> Result<UpdateParse> {
        let (system, user) = prompts::ontology_update_parser(question);

        let payload = self
            .model
            .generate_json(&system, &user, ModelTier::Light)
            .await?;

        let mut parsed: UpdateParse = serde_json::from_value(payload)
            .map_err(|e| LlmError::ResponseShape(format!("update parse: {e}")))?;
        parsed.confidence = clamp_confidence(parsed.confidence);

        Ok(parsed)
    }

    /// Embed a text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.model.embed(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Canned-response model for gateway tests
    #[derive(Clone)]
    struct CannedModel {
        json: Value,
        text: String,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn generate_text(
            &self,
            _system: &str,
            _user: &str,
            _tier: ModelTier,
        ) -> Result<String> {
            Ok(self.text.clone())
        }

        async fn generate_json(
            &self,
            _system: &str,
            _user: &str,
            _tier: ModelTier,
        ) -> Result<Value> {
            Ok(self.json.clone())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn clone_box(&self) -> Box<dyn LanguageModel> {
            Box::new(self.clone())
        }
    }

    fn gateway(json: Value) -> LlmGateway {
        LlmGateway::new(Arc::new(CannedModel {
            json,
            text: "answer".to_string(),
        }))
    }

    #[tokio::test]
    async fn test_invalid_intent_normalises_to_unknown() {
        let gw = gateway(json!({
            "intent": "made_up_intent",
            "confidence": 0.9,
            "entities": []
        }));

        let result = gw
            .classify_and_extract("q", &["personnel_search"], &["Person"], "")
            .await
            .unwrap();
        assert_eq!(result.intent, "unknown");
    }

    #[tokio::test]
    async fn test_confidence_is_clamped() {
        let gw = gateway(json!({
            "intent": "personnel_search",
            "confidence": 3.5,
            "entities": []
        }));

        let result = gw
            .classify_and_extract("q", &["personnel_search"], &["Person"], "")
            .await
            .unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_shape_error() {
        let gw = gateway(json!({"confidence": "not a number"}));

        let err = gw
            .classify_and_extract("q", &["personnel_search"], &["Person"], "")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ResponseShape(_)));
    }

    #[tokio::test]
    async fn test_generate_cypher_parses_parameters() {
        let gw = gateway(json!({
            "cypher": "MATCH (p:Person {name: $name}) RETURN p",
            "parameters": {"name": "홍길동"}
        }));

        let result = gw
            .generate_cypher("q", &json!({}), &json!({}), None, ModelTier::Light)
            .await
            .unwrap();
        assert_eq!(result.parameters["name"], "홍길동");
        assert!(result.explanation.is_none());
    }

    #[tokio::test]
    async fn test_single_hop_constructor() {
        let plan = QueryDecomposition::single_hop("out of scope");
        assert!(!plan.is_multi_hop);
        assert_eq!(plan.hop_count, 1);
        assert!(plan.hops.is_empty());
    }
}
