//! Query-cache lookup node

use crate::nodes::PipelineNode;
use crate::state::PipelineState;
use async_trait::async_trait;
use graph_store::QueryCacheRepository;
use llm::LlmGateway;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Partial update emitted by [`CacheCheckerNode`]
#[derive(Debug, Serialize)]
pub struct CacheCheckerUpdate {
    /// The question's embedding, kept for storing on a later miss
    pub question_embedding: Option<Vec<f32>>,
    /// Whether the cache hit
    pub cache_hit: bool,
    /// Similarity of the best entry
    pub cache_score: f64,
    /// Skip Cypher generation (the hit supplies the query)
    pub skip_generation: bool,
    /// Cached query on a hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cypher_query: Option<String>,
    /// Cached parameters on a hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cypher_parameters: Option<Map<String, Value>>,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on degraded operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Checks the embedding-fingerprinted query cache
///
/// Disabled → `_skipped`. Embedding failure → degrade gracefully and
/// continue the normal pipeline (`_error`). Below threshold → store the
/// embedding for later and continue (`_miss`). Hit → carry the cached
/// query and route straight toward execution (`_hit`).
pub struct CacheCheckerNode {
    gateway: LlmGateway,
    cache: QueryCacheRepository,
    enabled: bool,
}

impl CacheCheckerNode {
    /// Create the node
    pub fn new(gateway: LlmGateway, cache: QueryCacheRepository, enabled: bool) -> Self {
        Self {
            gateway,
            cache,
            enabled,
        }
    }

    fn miss(
        &self,
        embedding: Option<Vec<f32>>,
        suffix: &str,
        error: Option<String>,
    ) -> Value {
        serde_json::to_value(CacheCheckerUpdate {
            question_embedding: embedding,
            cache_hit: false,
            cache_score: 0.0,
            skip_generation: false,
            cypher_query: None,
            cypher_parameters: None,
            execution_path: vec![format!("{}{suffix}", self.name())],
            error,
        })
        .unwrap_or_else(|_| json!({}))
    }
}

#[async_trait]
impl PipelineNode for CacheCheckerNode {
    fn name(&self) -> &'static str {
        "cache_checker"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        if !self.enabled {
            tracing::debug!("Vector search disabled, skipping cache check");
            return self.miss(None, "_skipped", None);
        }

        tracing::info!(
            question = %state.question.chars().take(50).collect::<String>(),
            "Checking query cache"
        );

        let embedding = match self.gateway.embed(&state.question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                // Graceful degradation: the `_error` path label records the
                // failure; the pipeline continues without the cache.
                tracing::error!(error = %e, "Question embedding failed");
                return self.miss(None, "_error", None);
            }
        };

        match self.cache.find_similar(&embedding).await {
            Ok(Some(cached)) => {
                tracing::info!(
                    score = cached.score,
                    cached_question = %cached.question.chars().take(50).collect::<String>(),
                    "Cache HIT"
                );
                serde_json::to_value(CacheCheckerUpdate {
                    question_embedding: Some(embedding),
                    cache_hit: true,
                    cache_score: cached.score,
                    skip_generation: true,
                    cypher_query: Some(cached.cypher_query),
                    cypher_parameters: Some(cached.cypher_parameters),
                    execution_path: vec![format!("{}_hit", self.name())],
                    error: None,
                })
                .unwrap_or_else(|_| json!({}))
            }
            Ok(None) => {
                tracing::info!("Cache MISS");
                self.miss(Some(embedding), "_miss", None)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cache lookup failed");
                self.miss(Some(embedding), "_error", None)
            }
        }
    }
}
