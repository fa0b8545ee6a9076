//! Pipeline state
//!
//! [`PipelineState`] is the typed record threaded through the DAG. Nodes
//! never mutate it; each returns a patch (its own small serialisable
//! record) that the engine merges under the reducer rules from
//! [`state_schema`]: `messages` and `execution_path` append, every other
//! field is last-write-wins.

use crate::access::UserContext;
use crate::intents::Intent;
use graph_store::GraphSchema;
use llm::QueryDecomposition;
use ontology::UnresolvedEntity;
use pipeline_core::{AppendReducer, StateSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Who produced a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human asking questions
    User,
    /// The pipeline's answers
    Assistant,
}

/// One turn of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// An entity matched (or not) against the graph
///
/// `id == None` denotes an unresolved match: the surface form was
/// extracted but no graph node was found for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    /// Graph element id; `None` when unresolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Labels of the matched node (or the entity type when unresolved)
    #[serde(default)]
    pub labels: Vec<String>,
    /// Canonical name (the node's `name`, or the surface form)
    pub name: String,
    /// Matched node properties
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Match score (1.0 for any successful strategy)
    #[serde(default)]
    pub match_score: f64,
    /// The surface form that was resolved
    pub original_value: String,
}

/// Ordered entity map: type → surface forms
pub type EntityMap = BTreeMap<String, Vec<String>>;

/// The full pipeline state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    /// The user utterance for the current turn
    pub question: String,
    /// Conversation thread id
    pub session_id: String,
    /// Chat history (append-only)
    pub messages: Vec<ChatMessage>,

    /// Classified intent
    pub intent: Option<Intent>,
    /// Classifier certainty
    pub intent_confidence: f64,
    /// Extracted entities by type
    pub entities: EntityMap,
    /// Entities after ontology expansion (superset of `entities`)
    pub expanded_entities: EntityMap,
    /// Pre-expansion entities, preserved for auditing
    pub original_entities: EntityMap,
    /// How many new terms expansion added
    pub expansion_count: i64,
    /// Which expansion strategy ran
    pub expansion_strategy: Option<String>,
    /// Graph matches per surface form
    pub resolved_entities: Vec<ResolvedEntity>,
    /// Surface forms with no graph match (feeds the learner)
    pub unresolved_entities: Vec<UnresolvedEntity>,
    /// Multi-hop decomposition plan
    pub query_plan: Option<QueryDecomposition>,

    /// Schema snapshot for query generation
    pub schema: Option<GraphSchema>,
    /// The generated (or cached) Cypher
    pub cypher_query: String,
    /// Its parameters
    pub cypher_parameters: Map<String, Value>,
    /// Serialised query results
    pub graph_results: Vec<Value>,
    /// Number of result rows
    pub result_count: i64,

    /// Final natural-language answer
    pub response: String,

    /// Informational error (errors never throw out of nodes)
    pub error: Option<String>,
    /// Node traversal log (append-only)
    pub execution_path: Vec<String>,

    /// Embedding of the question, when the cache checker computed one
    pub question_embedding: Option<Vec<f32>>,
    /// Whether the query cache hit
    pub cache_hit: bool,
    /// Similarity score of the cache hit
    pub cache_score: f64,
    /// Skip Cypher generation (query came from cache)
    pub skip_generation: bool,

    /// Access-control context
    pub user_context: Option<UserContext>,
}

impl PipelineState {
    /// Initial state for a new turn
    pub fn initial(question: impl Into<String>, session_id: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            messages: vec![ChatMessage::user(&question)],
            question,
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Decode from the engine's JSON state, tolerating missing fields
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Encode into the engine's JSON state
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Total surface forms across all entity types
    pub fn entity_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    /// Whether any resolved-entity record is unresolved
    pub fn has_unresolved(&self) -> bool {
        self.resolved_entities.iter().any(|e| e.id.is_none())
    }
}

/// Reducer schema for the pipeline state
///
/// `messages` and `execution_path` are append-only; everything else
/// overwrites.
pub fn state_schema() -> StateSchema {
    StateSchema::new()
        .with_field("messages", Box::new(AppendReducer))
        .with_field("execution_path", Box::new(AppendReducer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_state_seeds_user_message() {
        let state = PipelineState::initial("홍길동 부서는?", "session-1");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, MessageRole::User);
        assert_eq!(state.question, "홍길동 부서는?");
        assert!(state.execution_path.is_empty());
    }

    #[test]
    fn test_from_value_tolerates_partial_state() {
        let state = PipelineState::from_value(&json!({
            "question": "q",
            "intent": "personnel_search",
        }))
        .unwrap();
        assert_eq!(state.intent, Some(Intent::PersonnelSearch));
        assert_eq!(state.intent_confidence, 0.0);
        assert!(state.entities.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let mut state = PipelineState::initial("q", "s");
        state.intent = Some(Intent::PathAnalysis);
        state
            .entities
            .insert("Skill".to_string(), vec!["Python".to_string()]);
        state.cypher_query = "MATCH (n) RETURN n".to_string();

        let decoded = PipelineState::from_value(&state.to_value()).unwrap();
        assert_eq!(decoded.intent, Some(Intent::PathAnalysis));
        assert_eq!(decoded.entities["Skill"], vec!["Python"]);
        assert_eq!(decoded.cypher_query, "MATCH (n) RETURN n");
    }

    #[test]
    fn test_schema_appends_path_and_messages() {
        let schema = state_schema();
        let mut state = json!({
            "messages": [{"role": "user", "content": "q"}],
            "execution_path": ["intent_classifier"],
            "intent": "unknown",
        });

        schema
            .apply(
                &mut state,
                &json!({
                    "messages": [{"role": "assistant", "content": "a"}],
                    "execution_path": ["response_generator"],
                    "intent": "personnel_search",
                }),
            )
            .unwrap();

        assert_eq!(state["messages"].as_array().unwrap().len(), 2);
        assert_eq!(
            state["execution_path"],
            json!(["intent_classifier", "response_generator"])
        );
        assert_eq!(state["intent"], "personnel_search");
    }

    #[test]
    fn test_has_unresolved() {
        let mut state = PipelineState::default();
        assert!(!state.has_unresolved());
        state.resolved_entities.push(ResolvedEntity {
            id: None,
            labels: vec!["Person".into()],
            name: "홍길동".into(),
            properties: Map::new(),
            match_score: 0.0,
            original_value: "홍길동".into(),
        });
        assert!(state.has_unresolved());
    }
}
