//! Graph-backed ontology loader
//!
//! Resolves terms against `Concept` nodes written by the proposal
//! application path: `SAME_AS` edges carry synonymy (alias → canonical,
//! traversed both ways), `IS_A` edges carry the hierarchy (children
//! traversed to depth 3). Only the skills category is materialised in the
//! graph; other categories pass through unchanged.
//!
//! Every lookup is cached per process; the registry clears the cache when
//! an approved proposal lands.

use crate::lookup::{categories, OntologyLookup};
use async_trait::async_trait;
use graph_store::QueryRunner;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Hash, PartialEq, Eq, Clone)]
enum CacheKey {
    Canonical(String),
    Synonyms(String),
    Children(String),
}

/// Cypher-backed [`OntologyLookup`] over `Concept` nodes
pub struct GraphOntologyLoader {
    runner: Arc<dyn QueryRunner>,
    cache: RwLock<HashMap<CacheKey, Vec<String>>>,
}

impl GraphOntologyLoader {
    /// Create a loader over a runner
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self {
            runner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<Vec<String>> {
        self.cache.read().get(key).cloned()
    }

    fn remember(&self, key: CacheKey, value: Vec<String>) {
        self.cache.write().insert(key, value);
    }

    async fn query_canonical(&self, term: &str) -> Option<String> {
        let query = "\
            OPTIONAL MATCH (exact:Concept {type: 'skill'}) \
            WHERE toLower(exact.name) = toLower($term) \
            OPTIONAL MATCH (exact)-[:SAME_AS]->(canonical:Concept {is_canonical: true}) \
            RETURN CASE \
                WHEN canonical IS NOT NULL THEN canonical.name \
                WHEN exact.is_canonical = true THEN exact.name \
                ELSE null \
            END AS canonical_name";

        match self.runner.run(query, json!({ "term": term })).await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get("canonical_name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                tracing::warn!(term = %term, error = %e, "get_canonical query failed");
                None
            }
        }
    }
}

#[async_trait]
impl OntologyLookup for GraphOntologyLoader {
    async fn get_canonical(&self, term: &str, category: &str) -> String {
        if category != categories::SKILLS {
            return term.to_string();
        }

        let key = CacheKey::Canonical(term.to_lowercase());
        if let Some(cached) = self.cached(&key) {
            return cached
                .first()
                .cloned()
                .unwrap_or_else(|| term.to_string());
        }

        let canonical = self
            .query_canonical(term)
            .await
            .unwrap_or_else(|| term.to_string());

        self.remember(key, vec![canonical.clone()]);
        canonical
    }

    async fn get_synonyms(&self, term: &str, category: &str) -> Vec<String> {
        if category != categories::SKILLS {
            return vec![term.to_string()];
        }

        let canonical = self.get_canonical(term, category).await;
        let key = CacheKey::Synonyms(canonical.to_lowercase());
        if let Some(cached) = self.cached(&key) {
            return cached;
        }

        let query = "\
            MATCH (c:Concept {type: 'skill'}) \
            WHERE toLower(c.name) = toLower($canonical) \
            OPTIONAL MATCH (c)-[:SAME_AS]-(related:Concept {type: 'skill'}) \
            WITH c, collect(DISTINCT related.name) AS aliases \
            RETURN c.name AS canonical, aliases";

        let group = match self.runner.run(query, json!({ "canonical": canonical })).await {
            Ok(rows) => rows.first().map(|row| {
                let mut group: Vec<String> = Vec::new();
                if let Some(name) = row.get("canonical").and_then(Value::as_str) {
                    group.push(name.to_string());
                }
                if let Some(aliases) = row.get("aliases").and_then(Value::as_array) {
                    for alias in aliases.iter().filter_map(Value::as_str) {
                        if !group.iter().any(|g| g.eq_ignore_ascii_case(alias)) {
                            group.push(alias.to_string());
                        }
                    }
                }
                group
            }),
            Err(e) => {
                tracing::warn!(term = %term, error = %e, "get_synonyms query failed");
                None
            }
        };

        let group = match group {
            Some(group) if !group.is_empty() => group,
            _ => vec![term.to_string()],
        };

        self.remember(key, group.clone());
        group
    }

    async fn get_children(&self, concept: &str, category: &str) -> Vec<String> {
        if category != categories::SKILLS {
            return Vec::new();
        }

        let key = CacheKey::Children(concept.to_lowercase());
        if let Some(cached) = self.cached(&key) {
            return cached;
        }

        // Transitive IS_A descent, bounded at three levels.
        let query = "\
            MATCH (parent:Concept) \
            WHERE toLower(parent.name) = toLower($concept) \
            OPTIONAL MATCH (child:Concept)-[:IS_A*1..3]->(parent) \
            WHERE child.type = 'skill' \
            RETURN collect(DISTINCT child.name) AS children";

        let children = match self.runner.run(query, json!({ "concept": concept })).await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get("children"))
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(concept = %concept, error = %e, "get_children query failed");
                Vec::new()
            }
        };

        self.remember(key, children.clone());
        children
    }

    async fn clear_cache(&self) {
        self.cache.write().clear();
        tracing::debug!("Graph ontology cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_store::Result as StoreResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConceptRunner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryRunner for ConceptRunner {
        async fn run(&self, cypher: &str, params: Value) -> StoreResult<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if cypher.contains("canonical_name") {
                let term = params["term"].as_str().unwrap_or_default();
                let canonical = if term.eq_ignore_ascii_case("파이썬") {
                    Some("Python")
                } else if term.eq_ignore_ascii_case("python") {
                    Some("Python")
                } else {
                    None
                };
                Ok(vec![json!({ "canonical_name": canonical })])
            } else if cypher.contains("SAME_AS") {
                Ok(vec![json!({
                    "canonical": "Python",
                    "aliases": ["파이썬", "Python3"],
                })])
            } else {
                Ok(vec![json!({ "children": ["Django", "FastAPI"] })])
            }
        }

        async fn run_write(&self, _cypher: &str, _params: Value) -> StoreResult<Vec<Value>> {
            Ok(vec![])
        }
    }

    fn loader() -> GraphOntologyLoader {
        GraphOntologyLoader::new(Arc::new(ConceptRunner {
            calls: AtomicUsize::new(0),
        }))
    }

    #[tokio::test]
    async fn test_canonical_via_same_as() {
        assert_eq!(loader().get_canonical("파이썬", "skills").await, "Python");
    }

    #[tokio::test]
    async fn test_unknown_category_passes_through() {
        let loader = loader();
        assert_eq!(loader.get_canonical("팀장", "positions").await, "팀장");
        assert_eq!(
            loader.get_synonyms("팀장", "positions").await,
            vec!["팀장".to_string()]
        );
        assert!(loader.get_children("팀장", "positions").await.is_empty());
    }

    #[tokio::test]
    async fn test_synonym_group_includes_canonical() {
        let group = loader().get_synonyms("파이썬", "skills").await;
        assert_eq!(group[0], "Python");
        assert!(group.contains(&"파이썬".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_is_cached_until_cleared() {
        let runner = Arc::new(ConceptRunner {
            calls: AtomicUsize::new(0),
        });
        let loader = GraphOntologyLoader::new(runner.clone());

        loader.get_canonical("파이썬", "skills").await;
        let after_first = runner.calls.load(Ordering::SeqCst);
        loader.get_canonical("파이썬", "skills").await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), after_first);

        loader.clear_cache().await;
        loader.get_canonical("파이썬", "skills").await;
        assert!(runner.calls.load(Ordering::SeqCst) > after_first);
    }
}
