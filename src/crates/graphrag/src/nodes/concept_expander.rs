//! Concept expansion node

use crate::config::ExpansionStrategy;
use crate::intents::ontology_category;
use crate::nodes::PipelineNode;
use crate::state::{EntityMap, PipelineState};
use async_trait::async_trait;
use ontology::{ExpansionConfig, OntologyRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Partial update emitted by [`ConceptExpanderNode`]
#[derive(Debug, Serialize)]
pub struct ConceptExpanderUpdate {
    /// Entities after expansion (superset of the input)
    pub expanded_entities: EntityMap,
    /// The pre-expansion entities, preserved for auditing
    pub original_entities: EntityMap,
    /// How many new terms expansion added
    pub expansion_count: i64,
    /// Which strategy ran
    pub expansion_strategy: String,
    /// Path label
    pub execution_path: Vec<String>,
}

/// Expands entities through the ontology before resolution
///
/// Entity types with an ontology category (Skill, Position, Department)
/// expand into synonyms and child concepts; everything else passes
/// through untouched. The loader is fetched from the registry on every
/// call so a refresh is visible immediately.
pub struct ConceptExpanderNode {
    registry: Arc<OntologyRegistry>,
    strategy: ExpansionStrategy,
    config: ExpansionConfig,
}

impl ConceptExpanderNode {
    /// Create the node with a strategy's limits
    pub fn new(registry: Arc<OntologyRegistry>, strategy: ExpansionStrategy) -> Self {
        Self {
            registry,
            config: strategy.expansion_config(),
            strategy,
        }
    }
}

#[async_trait]
impl PipelineNode for ConceptExpanderNode {
    fn name(&self) -> &'static str {
        "concept_expander"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["entities"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        let original = state.entities.clone();

        if original.is_empty() {
            tracing::info!("No entities to expand");
            return serde_json::to_value(ConceptExpanderUpdate {
                expanded_entities: EntityMap::new(),
                original_entities: EntityMap::new(),
                expansion_count: 0,
                expansion_strategy: self.strategy.as_str().to_string(),
                execution_path: vec![self.name().to_string()],
            })
            .unwrap_or_else(|_| json!({}));
        }

        let loader = self.registry.get_loader();
        let mut expanded_entities = EntityMap::new();
        let mut total_added: i64 = 0;

        for (entity_type, values) in &original {
            let Some(category) = ontology_category(entity_type) else {
                tracing::debug!(entity_type = %entity_type, "No ontology mapping, passing through");
                expanded_entities.insert(entity_type.clone(), values.clone());
                continue;
            };

            let mut expanded: Vec<String> = Vec::new();
            for value in values {
                for term in loader.expand_concept(value, category, &self.config).await {
                    if !expanded.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
                        expanded.push(term);
                    }
                }
            }

            let original_unique = values.len() as i64;
            let added = (expanded.len() as i64 - original_unique).max(0);
            total_added += added;

            tracing::debug!(
                entity_type = %entity_type,
                from = values.len(),
                to = expanded.len(),
                "Expanded entity type"
            );

            expanded_entities.insert(entity_type.clone(), expanded);
        }

        tracing::info!(
            expansion_count = total_added,
            strategy = self.strategy.as_str(),
            "Concept expansion complete"
        );

        serde_json::to_value(ConceptExpanderUpdate {
            expanded_entities,
            original_entities: original,
            expansion_count: total_added,
            expansion_strategy: self.strategy.as_str().to_string(),
            execution_path: vec![self.name().to_string()],
        })
        .unwrap_or_else(|_| json!({}))
    }
}
