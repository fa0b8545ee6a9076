//! Question → Cypher query cache
//!
//! Questions are fingerprinted by their embedding. A lookup runs a vector
//! search over previously answered questions and returns the stored query
//! when the best cosine score clears the threshold; the cypher generation
//! phase is then skipped entirely. Parameters are stored as a JSON string
//! property (graph properties cannot hold nested maps).

use crate::error::Result;
use crate::repository::GraphRepository;
use serde_json::{json, Map, Value};

/// Label of cache entry nodes
const CACHE_LABEL: &str = "CachedQuery";

/// Name of the vector index over cache entries
pub const CACHE_INDEX_NAME: &str = "cached_query_embedding";

/// Default cosine similarity threshold for a hit
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.92;

/// A cache entry that cleared the similarity threshold
#[derive(Debug, Clone)]
pub struct CachedQuery {
    /// The previously asked question
    pub question: String,
    /// The Cypher emitted for it
    pub cypher_query: String,
    /// Its parameters
    pub cypher_parameters: Map<String, Value>,
    /// Cosine similarity to the current question
    pub score: f64,
}

/// Embedding-fingerprinted query cache over the graph
#[derive(Clone)]
pub struct QueryCacheRepository {
    repository: GraphRepository,
    threshold: f64,
}

impl QueryCacheRepository {
    /// Create a cache with the default threshold
    pub fn new(repository: GraphRepository) -> Self {
        Self::with_threshold(repository, DEFAULT_SIMILARITY_THRESHOLD)
    }

    /// Create a cache with an explicit threshold
    pub fn with_threshold(repository: GraphRepository, threshold: f64) -> Self {
        Self {
            repository,
            threshold,
        }
    }

    /// Ensure the vector index exists (idempotent; call at startup)
    pub async fn ensure_index(&self, dimensions: usize) -> Result<()> {
        self.repository
            .ensure_vector_index(CACHE_INDEX_NAME, CACHE_LABEL, "embedding", dimensions)
            .await
    }

    /// Find the nearest cached query at or above the threshold
    pub async fn find_similar(&self, embedding: &[f32]) -> Result<Option<CachedQuery>> {
        let rows = self
            .repository
            .vector_search(CACHE_INDEX_NAME, 1, embedding)
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let score = row.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        if score < self.threshold {
            tracing::debug!(score, threshold = self.threshold, "Best cache entry below threshold");
            return Ok(None);
        }

        let properties = row
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let question = properties
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let cypher_query = properties
            .get("cypher_query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if cypher_query.is_empty() {
            return Ok(None);
        }

        let cypher_parameters = properties
            .get("cypher_parameters")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_str::<Map<String, Value>>(s).ok())
            .unwrap_or_default();

        Ok(Some(CachedQuery {
            question,
            cypher_query,
            cypher_parameters,
            score,
        }))
    }

    /// Store (or refresh) a cache entry keyed by the question text
    pub async fn store(
        &self,
        question: &str,
        embedding: &[f32],
        cypher_query: &str,
        cypher_parameters: &Map<String, Value>,
    ) -> Result<()> {
        let params_text = serde_json::to_string(cypher_parameters)?;

        self.repository
            .runner()
            .run_write(
                "MERGE (c:CachedQuery {question: $question}) \
                 ON CREATE SET c.created_at = datetime() \
                 SET c.embedding = $embedding, \
                     c.cypher_query = $cypher_query, \
                     c.cypher_parameters = $cypher_parameters, \
                     c.updated_at = datetime() \
                 RETURN 1 AS stored",
                json!({
                    "question": question,
                    "embedding": embedding,
                    "cypher_query": cypher_query,
                    "cypher_parameters": params_text,
                }),
            )
            .await?;

        tracing::debug!(question = %question, "Cached generated query");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::QueryRunner;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct VectorHitRunner {
        score: f64,
    }

    #[async_trait]
    impl QueryRunner for VectorHitRunner {
        async fn run(&self, cypher: &str, _params: Value) -> Result<Vec<Value>> {
            assert!(cypher.contains("db.index.vector.queryNodes"));
            Ok(vec![json!({
                "id": "4:x:1",
                "labels": ["CachedQuery"],
                "properties": {
                    "question": "Python 전문가 찾아줘",
                    "cypher_query": "MATCH (p:Person)-[:HAS_SKILL]->(s:Skill {name: $skill}) RETURN p",
                    "cypher_parameters": "{\"skill\": \"Python\"}",
                },
                "score": self.score,
            })])
        }

        async fn run_write(&self, _cypher: &str, _params: Value) -> Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    fn cache(score: f64) -> QueryCacheRepository {
        QueryCacheRepository::new(GraphRepository::new(Arc::new(VectorHitRunner { score })))
    }

    #[tokio::test]
    async fn test_hit_above_threshold() {
        let hit = cache(0.95).find_similar(&[0.1; 8]).await.unwrap().unwrap();
        assert_eq!(hit.score, 0.95);
        assert!(hit.cypher_query.contains("HAS_SKILL"));
        assert_eq!(hit.cypher_parameters["skill"], "Python");
    }

    #[tokio::test]
    async fn test_miss_below_threshold() {
        let miss = cache(0.5).find_similar(&[0.1; 8]).await.unwrap();
        assert!(miss.is_none());
    }
}
