//! Entity resolution node

use crate::intents::ontology_category;
use crate::nodes::PipelineNode;
use crate::state::{PipelineState, ResolvedEntity};
use async_trait::async_trait;
use chrono::Utc;
use graph_store::GraphRepository;
use ontology::{OntologyLearner, UnresolvedEntity};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Partial update emitted by [`EntityResolverNode`]
#[derive(Debug, Serialize)]
pub struct EntityResolverUpdate {
    /// Graph matches, one record per surface form
    pub resolved_entities: Vec<ResolvedEntity>,
    /// Surface forms with no match
    pub unresolved_entities: Vec<UnresolvedEntity>,
    /// Path label
    pub execution_path: Vec<String>,
}

/// Matches extracted surface forms against graph nodes
///
/// Each original surface form is resolved through the repository's
/// layered strategies (exact, whitespace-stripped, suffix-stripped);
/// when a type carries one surface form and expansion produced extra
/// variants, those variants are tried before giving up. The first
/// returned node wins with score 1.0. Unmatched forms become unresolved
/// records - which also feed the background learner, fire-and-forget.
pub struct EntityResolverNode {
    repository: GraphRepository,
    learner: Option<Arc<OntologyLearner>>,
}

impl EntityResolverNode {
    /// Create the node
    pub fn new(repository: GraphRepository, learner: Option<Arc<OntologyLearner>>) -> Self {
        Self { repository, learner }
    }

    async fn resolve_one(
        &self,
        entity_type: &str,
        value: &str,
        fallback_variants: &[String],
    ) -> Option<ResolvedEntity> {
        let labels: Option<Vec<String>> = (entity_type != "Unknown")
            .then(|| vec![entity_type.to_string()]);

        let mut candidates: Vec<&str> = vec![value];
        candidates.extend(
            fallback_variants
                .iter()
                .filter(|v| !v.eq_ignore_ascii_case(value))
                .map(String::as_str),
        );

        for candidate in candidates {
            match self
                .repository
                .find_entities_by_name(candidate, labels.as_deref(), 3)
                .await
            {
                Ok(matches) if !matches.is_empty() => {
                    let best = &matches[0];
                    tracing::debug!(value = %value, via = %candidate, id = %best.id, "Resolved entity");
                    return Some(ResolvedEntity {
                        id: Some(best.id.clone()),
                        labels: best.labels.clone(),
                        name: best.name().unwrap_or(value).to_string(),
                        properties: best.properties.clone(),
                        match_score: 1.0,
                        original_value: value.to_string(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    // Per-entity errors are treated as "unresolved".
                    tracing::warn!(value = %candidate, error = %e, "Entity lookup failed");
                }
            }
        }

        None
    }
}

#[async_trait]
impl PipelineNode for EntityResolverNode {
    fn name(&self) -> &'static str {
        "entity_resolver"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["entities"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        if state.entities.is_empty() {
            tracing::info!("No entities to resolve");
            return serde_json::to_value(EntityResolverUpdate {
                resolved_entities: Vec::new(),
                unresolved_entities: Vec::new(),
                execution_path: vec![format!("{}_skipped", self.name())],
            })
            .unwrap_or_else(|_| json!({}));
        }

        tracing::info!(count = state.entity_count(), "Resolving entities");

        let mut resolved: Vec<ResolvedEntity> = Vec::new();
        let mut unresolved: Vec<UnresolvedEntity> = Vec::new();

        for (entity_type, values) in &state.entities {
            // Expansion variants are only unambiguous when the type has a
            // single surface form.
            let variants: Vec<String> = if values.len() == 1 {
                state
                    .expanded_entities
                    .get(entity_type)
                    .cloned()
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            for value in values {
                if value.is_empty() {
                    continue;
                }

                match self.resolve_one(entity_type, value, &variants).await {
                    Some(entity) => resolved.push(entity),
                    None => {
                        tracing::debug!(value = %value, "Could not resolve");
                        resolved.push(ResolvedEntity {
                            id: None,
                            labels: vec![entity_type.clone()],
                            name: value.clone(),
                            properties: serde_json::Map::new(),
                            match_score: 0.0,
                            original_value: value.clone(),
                        });
                        unresolved.push(UnresolvedEntity {
                            term: value.clone(),
                            category: ontology_category(entity_type)
                                .unwrap_or("skills")
                                .to_string(),
                            question: state.question.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
        }

        let resolved_count = resolved.iter().filter(|e| e.id.is_some()).count();
        tracing::info!(
            resolved = resolved_count,
            unresolved = unresolved.len(),
            "Entity resolution complete"
        );

        // The learner gets its own snapshot and never blocks the response.
        if let Some(learner) = &self.learner {
            if !unresolved.is_empty() {
                learner.spawn(
                    unresolved.clone(),
                    state.schema.as_ref().map(|s| s.to_value()),
                );
            }
        }

        serde_json::to_value(EntityResolverUpdate {
            resolved_entities: resolved,
            unresolved_entities: unresolved,
            execution_path: vec![self.name().to_string()],
        })
        .unwrap_or_else(|_| json!({}))
    }
}
