//! Concept persistence
//!
//! Concepts are durable `Concept` nodes: `{name, type, is_canonical,
//! description, source}`. Relationships between them carry provenance
//! (`proposal_id`, creation timestamp): `SAME_AS` for synonymy (alias →
//! canonical), `IS_A` for hierarchy (child → parent), `REQUIRES` and
//! `PART_OF` for the remaining relation kinds. All writes are MERGE-based
//! so reapplying a proposal is harmless.

use crate::error::Result;
use graph_store::validators::validate_concept_name;
use graph_store::QueryRunner;
use serde_json::{json, Value};
use std::sync::Arc;

/// Repository over `Concept` nodes and their relationships
#[derive(Clone)]
pub struct ConceptRepository {
    runner: Arc<dyn QueryRunner>,
}

impl ConceptRepository {
    /// Create a repository over a runner
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    /// Whether a concept with this name exists (case-insensitive)
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let name = validate_concept_name(name, "name")?;

        let rows = self
            .runner
            .run(
                "MATCH (c:Concept) WHERE toLower(c.name) = toLower($name) \
                 RETURN count(c) AS count",
                json!({ "name": name }),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
            > 0)
    }

    /// Create a concept, or return the existing one untouched
    pub async fn create_or_get(
        &self,
        name: &str,
        concept_type: &str,
        is_canonical: bool,
        description: &str,
        source: &str,
    ) -> Result<()> {
        let name = validate_concept_name(name, "name")?;

        self.runner
            .run_write(
                "MERGE (c:Concept {name: $name}) \
                 ON CREATE SET c.type = $type, \
                               c.is_canonical = $is_canonical, \
                               c.description = $description, \
                               c.source = $source, \
                               c.created_at = datetime() \
                 RETURN c.name AS name",
                json!({
                    "name": name,
                    "type": normalise_concept_type(concept_type),
                    "is_canonical": is_canonical,
                    "description": description,
                    "source": source,
                }),
            )
            .await?;

        Ok(())
    }

    /// `(alias)-[:SAME_AS]->(canonical)`
    pub async fn create_same_as(
        &self,
        alias_name: &str,
        canonical_name: &str,
        proposal_id: &str,
    ) -> Result<bool> {
        self.create_relation("SAME_AS", alias_name, canonical_name, proposal_id)
            .await
    }

    /// `(child)-[:IS_A]->(parent)`
    pub async fn create_is_a(
        &self,
        child_name: &str,
        parent_name: &str,
        proposal_id: &str,
    ) -> Result<bool> {
        self.create_relation("IS_A", child_name, parent_name, proposal_id)
            .await
    }

    /// `(entity)-[:REQUIRES]->(skill)`
    pub async fn create_requires(
        &self,
        entity_name: &str,
        skill_name: &str,
        proposal_id: &str,
    ) -> Result<bool> {
        self.create_relation("REQUIRES", entity_name, skill_name, proposal_id)
            .await
    }

    /// `(part)-[:PART_OF]->(whole)`
    pub async fn create_part_of(
        &self,
        part_name: &str,
        whole_name: &str,
        proposal_id: &str,
    ) -> Result<bool> {
        self.create_relation("PART_OF", part_name, whole_name, proposal_id)
            .await
    }

    async fn create_relation(
        &self,
        relation_type: &str,
        source_name: &str,
        target_name: &str,
        proposal_id: &str,
    ) -> Result<bool> {
        let source_name = validate_concept_name(source_name, "source_name")?;
        let target_name = validate_concept_name(target_name, "target_name")?;

        // relation_type comes from a closed internal set, but validate
        // anyway since it lands in query text.
        graph_store::validators::validate_identifier(relation_type, "relationship_type")?;

        let query = format!(
            "MATCH (source:Concept) WHERE toLower(source.name) = toLower($source_name) \
             MATCH (target:Concept) WHERE toLower(target.name) = toLower($target_name) \
             MERGE (source)-[r:{relation_type}]->(target) \
             ON CREATE SET r.proposal_id = $proposal_id, r.created_at = datetime() \
             RETURN type(r) AS created"
        );

        let rows = self
            .runner
            .run_write(
                &query,
                json!({
                    "source_name": source_name,
                    "target_name": target_name,
                    "proposal_id": proposal_id,
                }),
            )
            .await?;

        if rows.is_empty() {
            tracing::warn!(
                relation_type,
                source = %source_name,
                target = %target_name,
                "Relation endpoints missing"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

/// Singular concept type stored on nodes ("skills" category → "skill")
fn normalise_concept_type(category: &str) -> String {
    category
        .strip_suffix('s')
        .filter(|stem| !stem.is_empty())
        .unwrap_or(category)
        .to_string()
}
