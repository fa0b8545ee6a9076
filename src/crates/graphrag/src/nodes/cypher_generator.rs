//! Cypher generation node

use crate::intents::Intent;
use crate::nodes::PipelineNode;
use crate::state::PipelineState;
use async_trait::async_trait;
use graph_store::{GraphSchema, SchemaCache};
use llm::{LlmGateway, ModelTier};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Partial update emitted by [`CypherGeneratorNode`]
#[derive(Debug, Serialize)]
pub struct CypherGeneratorUpdate {
    /// Schema used for generation (kept in state for downstream nodes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<GraphSchema>,
    /// The generated query
    pub cypher_query: String,
    /// Its parameters
    pub cypher_parameters: Map<String, Value>,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generates the parameterised Cypher query
///
/// A complexity classifier picks the model tier: single-hop questions
/// with few entities on the simple intents go to the light tier (when
/// enabled), multi-hop plans and entity-heavy questions to the heavy
/// tier. After generation, a parameter-correction pass aligns string
/// parameters with the extracted surface forms, and a present
/// [`UserContext`](crate::access::UserContext) narrows the schema shown
/// to the model and injects a department scope predicate.
pub struct CypherGeneratorNode {
    gateway: LlmGateway,
    schema_cache: Arc<SchemaCache>,
    light_model_enabled: bool,
}

impl CypherGeneratorNode {
    /// Create the node
    pub fn new(
        gateway: LlmGateway,
        schema_cache: Arc<SchemaCache>,
        light_model_enabled: bool,
    ) -> Self {
        Self {
            gateway,
            schema_cache,
            light_model_enabled,
        }
    }

    /// Pick the model tier for this question
    fn select_tier(&self, state: &PipelineState) -> ModelTier {
        if !self.light_model_enabled {
            return ModelTier::Heavy;
        }

        let intent = state.intent.unwrap_or(Intent::Unknown);
        let multi_hop = state
            .query_plan
            .as_ref()
            .map(|plan| plan.is_multi_hop)
            .unwrap_or(false);

        let complex = multi_hop || intent.is_multi_hop() || state.entity_count() >= 3;
        let simple = !complex && state.entity_count() <= 2 && intent.is_simple_generation();

        if simple {
            ModelTier::Light
        } else {
            ModelTier::Heavy
        }
    }

    /// Known surface forms for parameter correction
    fn surface_forms(state: &PipelineState) -> Vec<String> {
        let mut forms: Vec<String> = Vec::new();
        for values in state.entities.values().chain(state.expanded_entities.values()) {
            for value in values {
                if !forms.iter().any(|f| f.eq_ignore_ascii_case(value)) {
                    forms.push(value.clone());
                }
            }
        }
        for entity in &state.resolved_entities {
            if !forms.iter().any(|f| f.eq_ignore_ascii_case(&entity.name)) {
                forms.push(entity.name.clone());
            }
        }
        forms
    }

    /// Replace each string parameter with its best-matching surface form
    ///
    /// Exact case-insensitive matches win; otherwise the longest form that
    /// contains or is contained by the value is taken. Non-string values
    /// pass through.
    fn correct_parameters(
        parameters: Map<String, Value>,
        forms: &[String],
    ) -> Map<String, Value> {
        let mut corrected = Map::new();

        for (key, value) in parameters {
            let Some(text) = value.as_str() else {
                corrected.insert(key, value);
                continue;
            };

            let replacement = forms
                .iter()
                .find(|form| form.eq_ignore_ascii_case(text))
                .or_else(|| {
                    forms
                        .iter()
                        .filter(|form| {
                            let form_lower = form.to_lowercase();
                            let text_lower = text.to_lowercase();
                            form_lower.contains(&text_lower) || text_lower.contains(&form_lower)
                        })
                        .max_by_key(|form| form.chars().count())
                });

            match replacement {
                Some(form) if form.as_str() != text => {
                    tracing::debug!(parameter = %key, from = %text, to = %form, "Corrected parameter");
                    corrected.insert(key, json!(form));
                }
                _ => {
                    corrected.insert(key, value);
                }
            }
        }

        corrected
    }

    /// Inject a department scope predicate into the query
    ///
    /// Best effort over generated text: the predicate is anchored to the
    /// first MATCH variable, added to an existing WHERE or inserted before
    /// the RETURN.
    fn inject_scope(query: &str, scope_param: &str) -> String {
        if query.contains(&format!("${scope_param}")) {
            return query.to_string();
        }

        let Some(variable) = first_match_variable(query) else {
            return query.to_string();
        };
        let predicate = format!("{variable}.department = ${scope_param}");

        let upper = query.to_uppercase();
        if let Some(where_pos) = upper.find("WHERE ") {
            let insert_at = where_pos + "WHERE ".len();
            return format!(
                "{}{predicate} AND {}",
                &query[..insert_at],
                &query[insert_at..]
            );
        }
        if let Some(return_pos) = upper.find("RETURN ") {
            return format!(
                "{}WHERE {predicate} {}",
                &query[..return_pos],
                &query[return_pos..]
            );
        }

        query.to_string()
    }
}

/// First variable bound in a MATCH clause, e.g. `MATCH (p:Person)` → `p`
fn first_match_variable(query: &str) -> Option<String> {
    let upper = query.to_uppercase();
    let match_pos = upper.find("MATCH")?;
    let after = &query[match_pos..];
    let open = after.find('(')?;
    let variable: String = after[open + 1..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!variable.is_empty()).then_some(variable)
}

#[async_trait]
impl PipelineNode for CypherGeneratorNode {
    fn name(&self) -> &'static str {
        "cypher_generator"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        // Cache hit: the query is already in state, nothing to generate.
        if state.skip_generation && !state.cypher_query.is_empty() {
            tracing::info!("Using cached query, skipping generation");
            return serde_json::to_value(CypherGeneratorUpdate {
                schema: None,
                cypher_query: state.cypher_query.clone(),
                cypher_parameters: state.cypher_parameters.clone(),
                execution_path: vec![format!("{}_cached", self.name())],
                error: None,
            })
            .unwrap_or_else(|_| json!({}));
        }

        tracing::info!(
            question = %state.question.chars().take(50).collect::<String>(),
            "Generating Cypher"
        );

        let schema = match &state.schema {
            Some(schema) => schema.clone(),
            None => match self.schema_cache.get().await {
                Ok(schema) => schema,
                Err(e) => {
                    tracing::error!(error = %e, "Schema unavailable for generation");
                    return serde_json::to_value(CypherGeneratorUpdate {
                        schema: None,
                        cypher_query: String::new(),
                        cypher_parameters: Map::new(),
                        execution_path: vec![format!("{}_error", self.name())],
                        error: Some(format!("Cypher generation failed: {e}")),
                    })
                    .unwrap_or_else(|_| json!({}));
                }
            },
        };

        // Access policy: the model only sees what the caller may query.
        let visible_schema = match &state.user_context {
            Some(context) => context.filter_schema(&schema),
            None => schema.clone(),
        };

        let entities_payload = json!({
            "entities": state.entities,
            "expanded_entities": state.expanded_entities,
            "resolved_entities": state.resolved_entities,
        });
        let plan_payload = state
            .query_plan
            .as_ref()
            .and_then(|plan| serde_json::to_value(plan).ok());

        let tier = self.select_tier(state);
        tracing::debug!(tier = ?tier, "Selected model tier");

        let generated = self
            .gateway
            .generate_cypher(
                &state.question,
                &visible_schema.to_value(),
                &entities_payload,
                plan_payload.as_ref(),
                tier,
            )
            .await;

        let generated = match generated {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!(error = %e, "Cypher generation failed");
                return serde_json::to_value(CypherGeneratorUpdate {
                    schema: Some(schema),
                    cypher_query: String::new(),
                    cypher_parameters: Map::new(),
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Cypher generation failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}));
            }
        };

        if generated.cypher.trim().is_empty() {
            tracing::error!("Model produced an empty query");
            return serde_json::to_value(CypherGeneratorUpdate {
                schema: Some(schema),
                cypher_query: String::new(),
                cypher_parameters: Map::new(),
                execution_path: vec![format!("{}_error", self.name())],
                error: Some("Cypher generation failed: empty query generated".to_string()),
            })
            .unwrap_or_else(|_| json!({}));
        }

        let forms = Self::surface_forms(state);
        let mut parameters = Self::correct_parameters(generated.parameters, &forms);
        let mut cypher = generated.cypher;

        if let Some(scope) = state
            .user_context
            .as_ref()
            .and_then(|context| context.department_scope.clone())
        {
            cypher = Self::inject_scope(&cypher, "departmentScope");
            parameters.insert("departmentScope".to_string(), json!(scope));
        }

        tracing::info!(
            query = %cypher.chars().take(100).collect::<String>(),
            "Cypher generated"
        );

        serde_json::to_value(CypherGeneratorUpdate {
            schema: Some(schema),
            cypher_query: cypher,
            cypher_parameters: parameters,
            execution_path: vec![self.name().to_string()],
            error: None,
        })
        .unwrap_or_else(|_| json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::UserContext;

    #[test]
    fn test_parameter_correction_exact_match() {
        let forms = vec!["홍길동".to_string(), "Python".to_string()];
        let mut params = Map::new();
        params.insert("name".to_string(), json!("python"));

        let corrected = CypherGeneratorNode::correct_parameters(params, &forms);
        assert_eq!(corrected["name"], "Python");
    }

    #[test]
    fn test_parameter_correction_containment_prefers_longest() {
        let forms = vec!["챗봇 리뉴얼".to_string(), "챗봇 리뉴얼 프로젝트".to_string()];
        let mut params = Map::new();
        params.insert("project".to_string(), json!("챗봇 리뉴얼"));

        // Exact match wins over the longer containing form.
        let corrected = CypherGeneratorNode::correct_parameters(params, &forms);
        assert_eq!(corrected["project"], "챗봇 리뉴얼");

        let mut params = Map::new();
        params.insert("project".to_string(), json!("리뉴얼"));
        let corrected = CypherGeneratorNode::correct_parameters(params, &forms);
        assert_eq!(corrected["project"], "챗봇 리뉴얼 프로젝트");
    }

    #[test]
    fn test_parameter_correction_passes_non_strings() {
        let forms = vec!["Python".to_string()];
        let mut params = Map::new();
        params.insert("limit".to_string(), json!(10));

        let corrected = CypherGeneratorNode::correct_parameters(params, &forms);
        assert_eq!(corrected["limit"], 10);
    }

    #[test]
    fn test_first_match_variable() {
        assert_eq!(
            first_match_variable("MATCH (p:Person) RETURN p").as_deref(),
            Some("p")
        );
        assert_eq!(
            first_match_variable("MATCH (emp:Person)-[:HAS_SKILL]->(s) RETURN emp").as_deref(),
            Some("emp")
        );
        assert_eq!(first_match_variable("RETURN 1"), None);
    }

    #[test]
    fn test_scope_injection_into_existing_where() {
        let query = "MATCH (p:Person) WHERE p.name = $name RETURN p";
        let scoped = CypherGeneratorNode::inject_scope(query, "departmentScope");
        assert!(scoped.contains("WHERE p.department = $departmentScope AND p.name = $name"));
    }

    #[test]
    fn test_scope_injection_without_where() {
        let query = "MATCH (p:Person) RETURN p";
        let scoped = CypherGeneratorNode::inject_scope(query, "departmentScope");
        assert!(scoped.contains("WHERE p.department = $departmentScope RETURN p"));
    }

    #[test]
    fn test_scope_injection_is_idempotent() {
        let query = "MATCH (p:Person) WHERE p.department = $departmentScope RETURN p";
        let scoped = CypherGeneratorNode::inject_scope(query, "departmentScope");
        assert_eq!(scoped, query);
    }

    #[test]
    fn test_schema_filtering_applies_before_generation() {
        let mut schema = GraphSchema {
            labels: vec!["Person".into(), "Salary".into()],
            ..Default::default()
        };
        schema
            .node_properties
            .insert("Salary".into(), vec!["amount".into()]);

        let context = UserContext {
            user_id: "u".into(),
            allowed_labels: vec!["Person".into()],
            ..Default::default()
        };

        let filtered = context.filter_schema(&schema);
        assert_eq!(filtered.labels, vec!["Person"]);
    }
}
