//! Schema introspection with a TTL cache
//!
//! The Cypher generator shows the model the live schema on every question,
//! so introspection runs constantly. [`SchemaCache`] keeps one snapshot per
//! process for a configurable TTL (default 60 s) and exposes
//! [`invalidate`](SchemaCache::invalidate) for the registry-refresh path.

use crate::error::Result;
use crate::runner::QueryRunner;
use crate::validators::validate_identifier;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default cache lifetime in seconds
pub const DEFAULT_SCHEMA_TTL_SECS: u64 = 60;

/// Sampled property keys per label or relationship type
const PROPERTY_SAMPLE_LIMIT: usize = 50;

/// A snapshot of the graph schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    /// Node labels
    pub labels: Vec<String>,
    /// Relationship types
    pub relationship_types: Vec<String>,
    /// Sampled property names per label
    #[serde(default)]
    pub node_properties: HashMap<String, Vec<String>>,
    /// Sampled property names per relationship type
    #[serde(default)]
    pub relationship_properties: HashMap<String, Vec<String>>,
    /// Index descriptors
    #[serde(default)]
    pub indexes: Vec<Value>,
    /// Constraint descriptors
    #[serde(default)]
    pub constraints: Vec<Value>,
}

impl GraphSchema {
    /// JSON form handed to the Cypher generator prompt
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}

struct CachedSchema {
    schema: GraphSchema,
    fetched_at: Instant,
}

/// TTL-cached schema introspection
pub struct SchemaCache {
    runner: Arc<dyn QueryRunner>,
    ttl: Duration,
    cached: RwLock<Option<CachedSchema>>,
}

impl SchemaCache {
    /// Create a cache with the default TTL
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self::with_ttl(runner, Duration::from_secs(DEFAULT_SCHEMA_TTL_SECS))
    }

    /// Create a cache with an explicit TTL
    pub fn with_ttl(runner: Arc<dyn QueryRunner>, ttl: Duration) -> Self {
        Self {
            runner,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Get the schema, refetching when the cached snapshot expired
    pub async fn get(&self) -> Result<GraphSchema> {
        {
            let cached = self.cached.read();
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.schema.clone());
                }
            }
        }

        let schema = self.fetch().await?;

        *self.cached.write() = Some(CachedSchema {
            schema: schema.clone(),
            fetched_at: Instant::now(),
        });

        Ok(schema)
    }

    /// Drop the cached snapshot so the next `get` refetches
    pub fn invalidate(&self) {
        *self.cached.write() = None;
        tracing::debug!("Schema cache invalidated");
    }

    async fn fetch(&self) -> Result<GraphSchema> {
        tracing::debug!("Introspecting graph schema");
        let empty = || Value::Object(Map::new());

        let mut schema = GraphSchema::default();

        let labels = self.runner.run("CALL db.labels()", empty()).await?;
        schema.labels = labels
            .iter()
            .filter_map(|row| row.get("label").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let rel_types = self
            .runner
            .run("CALL db.relationshipTypes()", empty())
            .await?;
        schema.relationship_types = rel_types
            .iter()
            .filter_map(|row| row.get("relationshipType").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        // Indexes and constraints are advisory; an older server that lacks
        // the SHOW commands still yields a usable schema.
        match self.runner.run("SHOW INDEXES", empty()).await {
            Ok(rows) => schema.indexes = rows,
            Err(e) => tracing::warn!(error = %e, "Failed to list indexes"),
        }
        match self.runner.run("SHOW CONSTRAINTS", empty()).await {
            Ok(rows) => schema.constraints = rows,
            Err(e) => tracing::warn!(error = %e, "Failed to list constraints"),
        }

        for label in schema.labels.clone() {
            if validate_identifier(&label, "label").is_err() {
                continue;
            }
            let query = format!(
                "MATCH (n:{label}) UNWIND keys(n) AS key \
                 RETURN DISTINCT key LIMIT {PROPERTY_SAMPLE_LIMIT}"
            );
            match self.runner.run(&query, empty()).await {
                Ok(rows) => {
                    let keys: Vec<String> = rows
                        .iter()
                        .filter_map(|row| row.get("key").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect();
                    schema.node_properties.insert(label, keys);
                }
                Err(e) => tracing::warn!(label = %label, error = %e, "Property sampling failed"),
            }
        }

        for rel_type in schema.relationship_types.clone() {
            if validate_identifier(&rel_type, "relationship_type").is_err() {
                continue;
            }
            let query = format!(
                "MATCH ()-[r:{rel_type}]->() UNWIND keys(r) AS key \
                 RETURN DISTINCT key LIMIT {PROPERTY_SAMPLE_LIMIT}"
            );
            match self.runner.run(&query, empty()).await {
                Ok(rows) => {
                    let keys: Vec<String> = rows
                        .iter()
                        .filter_map(|row| row.get("key").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect();
                    schema.relationship_properties.insert(rel_type, keys);
                }
                Err(e) => {
                    tracing::warn!(rel_type = %rel_type, error = %e, "Property sampling failed")
                }
            }
        }

        tracing::info!(
            labels = schema.labels.len(),
            relationship_types = schema.relationship_types.len(),
            "Schema introspection complete"
        );

        Ok(schema)
    }
}
