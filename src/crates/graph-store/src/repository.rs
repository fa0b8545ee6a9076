//! Graph repository facade
//!
//! The data-access surface the pipeline nodes use: entity lookup with
//! layered matching strategies, neighbour/subgraph reads, generic node and
//! relationship CRUD, vector search and embedding upserts. Every label or
//! relationship type that ends up in query text goes through the validators
//! first; values always travel as parameters.

use crate::error::{GraphStoreError, Result};
use crate::runner::QueryRunner;
use crate::validators::{
    build_label_filter, build_rel_filter, validate_direction, validate_identifier,
};
use crate::wire;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Source of the organisational suffixes used by the third entity-matching
/// strategy
///
/// The suffix list is ontology data, not code: the ontology registry
/// implements this trait and serves the active loader's configured list on
/// every lookup, so an ontology refresh is immediately visible here too.
#[async_trait]
pub trait SuffixSource: Send + Sync {
    /// The current suffix list
    async fn korean_suffixes(&self) -> Vec<String>;
}

/// Strip a trailing organisational suffix, keeping a meaningful stem
///
/// A match is attempted without the suffix only when a meaningful stem
/// remains (e.g. "챗봇 리뉴얼 프로젝트" → "챗봇 리뉴얼").
pub fn strip_korean_suffix(name: &str, suffixes: &[String]) -> String {
    let trimmed = name.trim();
    for suffix in suffixes {
        if let Some(stem) = trimmed.strip_suffix(suffix.as_str()) {
            let stem = stem.trim();
            if stem.chars().count() > 1 {
                return stem.to_string();
            }
        }
    }
    trimmed.to_string()
}

/// A node returned by an entity lookup
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// Graph element id
    pub id: String,
    /// Node labels
    pub labels: Vec<String>,
    /// Node properties
    pub properties: Map<String, Value>,
}

impl ResolvedNode {
    fn from_row(row: &Value) -> Option<Self> {
        Some(Self {
            id: row.get("id")?.as_str()?.to_string(),
            labels: row
                .get("labels")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            properties: row.get("properties")?.as_object()?.clone(),
        })
    }

    /// The node's `name` property, when present
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }
}

/// Facade over the graph for entity lookup, traversal and CRUD
#[derive(Clone)]
pub struct GraphRepository {
    runner: Arc<dyn QueryRunner>,
    suffixes: Option<Arc<dyn SuffixSource>>,
}

impl GraphRepository {
    /// Create a repository over a runner
    ///
    /// Without a [`SuffixSource`] the suffix-stripping match strategy is
    /// inactive; wire one with [`with_suffix_source`](Self::with_suffix_source).
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self {
            runner,
            suffixes: None,
        }
    }

    /// Attach the ontology-backed suffix list
    pub fn with_suffix_source(mut self, suffixes: Arc<dyn SuffixSource>) -> Self {
        self.suffixes = Some(suffixes);
        self
    }

    /// Borrow the underlying runner
    pub fn runner(&self) -> &Arc<dyn QueryRunner> {
        &self.runner
    }

    // ------------------------------------------------------------------
    // Entity lookup
    // ------------------------------------------------------------------

    /// Find nodes by name, trying progressively looser strategies
    ///
    /// 1. case-insensitive exact match on `name`
    /// 2. match with interior whitespace removed
    /// 3. match after stripping a trailing organisational suffix (the
    ///    suffix list comes from the attached [`SuffixSource`], i.e. the
    ///    active ontology loader)
    ///
    /// The first strategy that returns rows wins.
    pub async fn find_entities_by_name(
        &self,
        name: &str,
        labels: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<ResolvedNode>> {
        let label_filter = build_label_filter(labels.unwrap_or(&[]))?;

        let exact = self
            .lookup_by_predicate(
                &label_filter,
                "toLower(n.name) = toLower($name)",
                json!({ "name": name }),
                limit,
            )
            .await?;
        if !exact.is_empty() {
            return Ok(exact);
        }

        let compact: String = name.split_whitespace().collect();
        if compact != name {
            let spaceless = self
                .lookup_by_predicate(
                    &label_filter,
                    "toLower(replace(n.name, ' ', '')) = toLower($name)",
                    json!({ "name": compact }),
                    limit,
                )
                .await?;
            if !spaceless.is_empty() {
                return Ok(spaceless);
            }
        }

        if let Some(source) = &self.suffixes {
            let suffixes = source.korean_suffixes().await;
            let stripped = strip_korean_suffix(name, &suffixes);
            if stripped != name.trim() {
                let suffixless = self
                    .lookup_by_predicate(
                        &label_filter,
                        "toLower(n.name) = toLower($name)",
                        json!({ "name": stripped }),
                        limit,
                    )
                    .await?;
                if !suffixless.is_empty() {
                    return Ok(suffixless);
                }
            }
        }

        Ok(Vec::new())
    }

    async fn lookup_by_predicate(
        &self,
        label_filter: &str,
        predicate: &str,
        params: Value,
        limit: usize,
    ) -> Result<Vec<ResolvedNode>> {
        let query = format!(
            "MATCH (n{label_filter}) WHERE {predicate} \
             RETURN elementId(n) AS id, labels(n) AS labels, properties(n) AS properties \
             LIMIT {limit}"
        );

        let rows = self.runner.run(&query, params).await?;
        Ok(rows.iter().filter_map(ResolvedNode::from_row).collect())
    }

    /// Find a node by element id
    pub async fn find_entity_by_id(&self, entity_id: &str) -> Result<ResolvedNode> {
        let rows = self
            .runner
            .run(
                "MATCH (n) WHERE elementId(n) = $id \
                 RETURN elementId(n) AS id, labels(n) AS labels, properties(n) AS properties",
                json!({ "id": entity_id }),
            )
            .await?;

        rows.first()
            .and_then(ResolvedNode::from_row)
            .ok_or_else(|| GraphStoreError::NotFound(format!("node '{entity_id}'")))
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Neighbours of a node, optionally filtered by relationship type
    ///
    /// Each row carries the neighbour in the node wire shape plus the
    /// connecting relationship type.
    pub async fn get_neighbors(
        &self,
        entity_id: &str,
        relationship_types: Option<&[String]>,
        direction: &str,
        limit: usize,
    ) -> Result<Vec<Value>> {
        validate_direction(direction)?;
        let rel_filter = build_rel_filter(relationship_types.unwrap_or(&[]))?;

        let pattern = match direction {
            "out" => format!("(n)-[r{rel_filter}]->(m)"),
            "in" => format!("(n)<-[r{rel_filter}]-(m)"),
            _ => format!("(n)-[r{rel_filter}]-(m)"),
        };

        let query = format!(
            "MATCH (n) WHERE elementId(n) = $id \
             MATCH {pattern} \
             RETURN elementId(m) AS id, labels(m) AS labels, properties(m) AS properties, \
                    type(r) AS relationship \
             LIMIT {limit}"
        );

        let rows = self.runner.run(&query, json!({ "id": entity_id })).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id")?.as_str()?.to_string();
                let labels = string_list(row.get("labels"));
                let properties = row.get("properties").cloned().unwrap_or(Value::Null);
                Some(json!({
                    "node": wire::node_wire(&id, labels, properties),
                    "relationship": row.get("relationship").cloned().unwrap_or(Value::Null),
                }))
            })
            .collect())
    }

    /// Bounded-depth subgraph around a node, one path wire shape per row
    pub async fn get_subgraph(&self, entity_id: &str, depth: u32) -> Result<Vec<Value>> {
        let depth = depth.min(3);
        let query = format!(
            "MATCH (n) WHERE elementId(n) = $id \
             MATCH p = (n)-[*1..{depth}]-(m) \
             RETURN [x IN nodes(p) | {{id: elementId(x), labels: labels(x), \
                     properties: properties(x)}}] AS nodes, \
                    [r IN relationships(p) | {{id: elementId(r), type: type(r), \
                     startNodeId: elementId(startNode(r)), \
                     endNodeId: elementId(endNode(r)), \
                     properties: properties(r)}}] AS relationships \
             LIMIT 100"
        );

        let rows = self.runner.run(&query, json!({ "id": entity_id })).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let nodes = row
                    .get("nodes")
                    .and_then(Value::as_array)
                    .map(|nodes| {
                        nodes
                            .iter()
                            .filter_map(|node| {
                                Some(wire::node_wire(
                                    node.get("id")?.as_str()?,
                                    string_list(node.get("labels")),
                                    node.get("properties").cloned().unwrap_or(Value::Null),
                                ))
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                let relationships = row
                    .get("relationships")
                    .and_then(Value::as_array)
                    .map(|rels| {
                        rels.iter()
                            .filter_map(|rel| {
                                Some(wire::relationship_wire(
                                    rel.get("id")?.as_str()?,
                                    rel.get("type")?.as_str()?,
                                    rel.get("startNodeId")?.as_str()?,
                                    rel.get("endNodeId")?.as_str()?,
                                    rel.get("properties").cloned().unwrap_or(Value::Null),
                                ))
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                wire::path_wire(nodes, relationships)
            })
            .collect())
    }

    /// Execute an arbitrary parameterised query (the executor node's path)
    pub async fn execute_cypher(&self, query: &str, parameters: Value) -> Result<Vec<Value>> {
        if query.trim().is_empty() {
            return Err(GraphStoreError::validation("Empty query", "query"));
        }
        self.runner.run(query, parameters).await
    }

    // ------------------------------------------------------------------
    // Generic CRUD
    // ------------------------------------------------------------------

    /// Create a node with the given label and properties
    pub async fn create_node(&self, label: &str, properties: Value) -> Result<ResolvedNode> {
        validate_identifier(label, "label")?;

        let query = format!(
            "CREATE (n:{label}) SET n = $properties, n.created_at = datetime() \
             RETURN elementId(n) AS id, labels(n) AS labels, properties(n) AS properties"
        );

        let rows = self
            .runner
            .run_write(&query, json!({ "properties": properties }))
            .await?;

        rows.first()
            .and_then(ResolvedNode::from_row)
            .ok_or_else(|| GraphStoreError::QueryExecution("node creation returned no row".into()))
    }

    /// Check whether a node with this label and name already exists
    pub async fn check_duplicate_node(&self, label: &str, name: &str) -> Result<bool> {
        validate_identifier(label, "label")?;

        let query = format!(
            "MATCH (n:{label}) WHERE toLower(n.name) = toLower($name) \
             RETURN count(n) AS count"
        );
        let rows = self.runner.run(&query, json!({ "name": name })).await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
            > 0)
    }

    /// Overwrite selected properties of a node
    pub async fn update_node_properties(
        &self,
        entity_id: &str,
        properties: Value,
    ) -> Result<ResolvedNode> {
        let rows = self
            .runner
            .run_write(
                "MATCH (n) WHERE elementId(n) = $id \
                 SET n += $properties, n.updated_at = datetime() \
                 RETURN elementId(n) AS id, labels(n) AS labels, properties(n) AS properties",
                json!({ "id": entity_id, "properties": properties }),
            )
            .await?;

        rows.first()
            .and_then(ResolvedNode::from_row)
            .ok_or_else(|| GraphStoreError::NotFound(format!("node '{entity_id}'")))
    }

    /// Number of relationships attached to a node
    pub async fn get_node_relationship_count(&self, entity_id: &str) -> Result<i64> {
        let rows = self
            .runner
            .run(
                "MATCH (n) WHERE elementId(n) = $id \
                 OPTIONAL MATCH (n)-[r]-() \
                 RETURN count(r) AS count",
                json!({ "id": entity_id }),
            )
            .await?;

        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .ok_or_else(|| GraphStoreError::NotFound(format!("node '{entity_id}'")))
    }

    /// Delete a node
    ///
    /// Without `force`, the check and the delete run in a single statement
    /// so a relationship attached concurrently cannot slip through between
    /// them; a node with relationships is left untouched and reported as an
    /// [`GraphStoreError::InvalidState`].
    pub async fn delete_node(&self, entity_id: &str, force: bool) -> Result<()> {
        let query = if force {
            "MATCH (n) WHERE elementId(n) = $id DETACH DELETE n RETURN 1 AS deleted"
        } else {
            "MATCH (n) WHERE elementId(n) = $id \
             WITH n, COUNT { (n)--() } AS rel_count \
             WHERE rel_count = 0 \
             DELETE n RETURN 1 AS deleted"
        };

        let rows = self.runner.run_write(query, json!({ "id": entity_id })).await?;

        if rows.is_empty() {
            if force {
                return Err(GraphStoreError::NotFound(format!("node '{entity_id}'")));
            }
            return Err(GraphStoreError::InvalidState(format!(
                "node '{entity_id}' still has relationships; pass force to detach-delete"
            )));
        }
        Ok(())
    }

    /// Create a relationship between two nodes
    pub async fn create_relationship(
        &self,
        start_id: &str,
        end_id: &str,
        relationship_type: &str,
        properties: Value,
    ) -> Result<()> {
        validate_identifier(relationship_type, "relationship_type")?;

        let query = format!(
            "MATCH (a) WHERE elementId(a) = $start_id \
             MATCH (b) WHERE elementId(b) = $end_id \
             CREATE (a)-[r:{relationship_type}]->(b) \
             SET r = $properties, r.created_at = datetime() \
             RETURN elementId(r) AS id"
        );

        let rows = self
            .runner
            .run_write(
                &query,
                json!({ "start_id": start_id, "end_id": end_id, "properties": properties }),
            )
            .await?;

        if rows.is_empty() {
            return Err(GraphStoreError::NotFound(format!(
                "endpoint '{start_id}' or '{end_id}'"
            )));
        }
        Ok(())
    }

    /// Delete a relationship by element id
    pub async fn delete_relationship(&self, relationship_id: &str) -> Result<()> {
        let rows = self
            .runner
            .run_write(
                "MATCH ()-[r]-() WHERE elementId(r) = $id \
                 DELETE r RETURN 1 AS deleted",
                json!({ "id": relationship_id }),
            )
            .await?;

        if rows.is_empty() {
            return Err(GraphStoreError::NotFound(format!(
                "relationship '{relationship_id}'"
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Vector search
    // ------------------------------------------------------------------

    /// Nearest nodes by embedding similarity
    pub async fn vector_search(
        &self,
        index_name: &str,
        k: usize,
        embedding: &[f32],
    ) -> Result<Vec<Value>> {
        validate_identifier(index_name, "index_name")?;

        self.runner
            .run(
                "CALL db.index.vector.queryNodes($index_name, $k, $embedding) \
                 YIELD node, score \
                 RETURN elementId(node) AS id, labels(node) AS labels, \
                        properties(node) AS properties, score",
                json!({ "index_name": index_name, "k": k as i64, "embedding": embedding }),
            )
            .await
    }

    /// Create a vector index when it does not exist yet
    pub async fn ensure_vector_index(
        &self,
        index_name: &str,
        label: &str,
        property: &str,
        dimensions: usize,
    ) -> Result<()> {
        validate_identifier(index_name, "index_name")?;
        validate_identifier(label, "label")?;
        validate_identifier(property, "property")?;

        let query = format!(
            "CREATE VECTOR INDEX {index_name} IF NOT EXISTS \
             FOR (n:{label}) ON (n.{property}) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {dimensions}, \
             `vector.similarity_function`: 'cosine'}}}}"
        );

        self.runner.run_write(&query, json!({})).await?;
        Ok(())
    }

    /// Store an embedding on a node
    pub async fn upsert_embedding(
        &self,
        entity_id: &str,
        property: &str,
        embedding: &[f32],
    ) -> Result<()> {
        validate_identifier(property, "property")?;

        let query = format!(
            "MATCH (n) WHERE elementId(n) = $id \
             SET n.{property} = $embedding RETURN 1 AS updated"
        );

        let rows = self
            .runner
            .run_write(&query, json!({ "id": entity_id, "embedding": embedding }))
            .await?;

        if rows.is_empty() {
            return Err(GraphStoreError::NotFound(format!("node '{entity_id}'")));
        }
        Ok(())
    }

    /// Store embeddings on many nodes in one statement
    pub async fn batch_upsert_embeddings(
        &self,
        property: &str,
        entries: &[(String, Vec<f32>)],
    ) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        validate_identifier(property, "property")?;

        let batch: Vec<Value> = entries
            .iter()
            .map(|(id, embedding)| json!({ "id": id, "embedding": embedding }))
            .collect();

        let query = format!(
            "UNWIND $batch AS entry \
             MATCH (n) WHERE elementId(n) = entry.id \
             SET n.{property} = entry.embedding \
             RETURN count(n) AS updated"
        );

        let rows = self
            .runner
            .run_write(&query, json!({ "batch": batch }))
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("updated"))
            .and_then(Value::as_i64)
            .unwrap_or(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Runner that records queries and replays scripted row sets
    struct ScriptedRunner {
        queries: Mutex<Vec<String>>,
        responses: Mutex<Vec<Vec<Value>>>,
    }

    impl ScriptedRunner {
        fn new(responses: Vec<Vec<Value>>) -> Arc<Self> {
            Arc::new(Self {
                queries: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().clone()
        }
    }

    #[async_trait]
    impl QueryRunner for ScriptedRunner {
        async fn run(&self, cypher: &str, _params: Value) -> Result<Vec<Value>> {
            self.queries.lock().push(cypher.to_string());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(vec![])
            } else {
                Ok(responses.remove(0))
            }
        }

        async fn run_write(&self, cypher: &str, params: Value) -> Result<Vec<Value>> {
            self.run(cypher, params).await
        }
    }

    fn person_row() -> Value {
        json!({
            "id": "4:abc:123",
            "labels": ["Person"],
            "properties": {"name": "홍길동", "department": "개발팀"},
        })
    }

    #[tokio::test]
    async fn test_exact_match_wins_without_fallback() {
        let runner = ScriptedRunner::new(vec![vec![person_row()]]);
        let repo = GraphRepository::new(runner.clone());

        let found = repo
            .find_entities_by_name("홍길동", Some(&["Person".to_string()]), 3)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), Some("홍길동"));
        assert_eq!(runner.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_whitespace_strategy_runs_second() {
        // First strategy returns nothing, second matches.
        let runner = ScriptedRunner::new(vec![vec![], vec![person_row()]]);
        let repo = GraphRepository::new(runner.clone());

        let found = repo
            .find_entities_by_name("홍 길동", None, 3)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        let queries = runner.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries[1].contains("replace(n.name, ' ', '')"));
    }

    /// Fixed suffix list standing in for the ontology loader
    struct FixedSuffixes;

    #[async_trait]
    impl SuffixSource for FixedSuffixes {
        async fn korean_suffixes(&self) -> Vec<String> {
            vec!["프로젝트".to_string(), "팀".to_string()]
        }
    }

    #[tokio::test]
    async fn test_suffix_strategy_runs_when_others_miss() {
        let runner = ScriptedRunner::new(vec![vec![], vec![person_row()]]);
        let repo = GraphRepository::new(runner.clone()).with_suffix_source(Arc::new(FixedSuffixes));

        // No interior whitespace, so strategy 2 is skipped; the suffix
        // strip produces the second query.
        let found = repo
            .find_entities_by_name("챗봇리뉴얼프로젝트", None, 3)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        let queries = runner.queries();
        assert_eq!(queries.len(), 2);
    }

    #[tokio::test]
    async fn test_suffix_strategy_inactive_without_source() {
        let runner = ScriptedRunner::new(vec![vec![]]);
        let repo = GraphRepository::new(runner.clone());

        let found = repo
            .find_entities_by_name("챗봇리뉴얼프로젝트", None, 3)
            .await
            .unwrap();

        assert!(found.is_empty());
        // Only the exact-match query ran.
        assert_eq!(runner.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_name_returns_empty() {
        let runner = ScriptedRunner::new(vec![]);
        let repo = GraphRepository::new(runner);

        let found = repo.find_entities_by_name("없는사람", None, 3).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_label_is_rejected_before_query() {
        let runner = ScriptedRunner::new(vec![]);
        let repo = GraphRepository::new(runner.clone());

        let err = repo
            .find_entities_by_name("x", Some(&["Person) DETACH DELETE (n".to_string()]), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, GraphStoreError::Validation { .. }));
        assert!(runner.queries().is_empty());
    }

    #[tokio::test]
    async fn test_execute_cypher_rejects_empty_query() {
        let repo = GraphRepository::new(ScriptedRunner::new(vec![]));
        assert!(repo.execute_cypher("  ", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_neighbors_are_wire_shaped() {
        let runner = ScriptedRunner::new(vec![vec![json!({
            "id": "4:abc:7",
            "labels": ["Skill"],
            "properties": {"name": "Python"},
            "relationship": "HAS_SKILL",
        })]]);
        let repo = GraphRepository::new(runner);

        let neighbors = repo
            .get_neighbors("4:abc:1", None, "out", 10)
            .await
            .unwrap();

        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0]["node"]["elementId"], "4:abc:7");
        assert_eq!(neighbors[0]["node"]["labels"][0], "Skill");
        assert_eq!(neighbors[0]["relationship"], "HAS_SKILL");
    }

    #[tokio::test]
    async fn test_subgraph_rows_become_paths() {
        let runner = ScriptedRunner::new(vec![vec![json!({
            "nodes": [
                {"id": "1", "labels": ["Person"], "properties": {"name": "홍길동"}},
                {"id": "2", "labels": ["Skill"], "properties": {"name": "Python"}},
            ],
            "relationships": [
                {"id": "9", "type": "HAS_SKILL", "startNodeId": "1",
                 "endNodeId": "2", "properties": {}},
            ],
        })]]);
        let repo = GraphRepository::new(runner);

        let paths = repo.get_subgraph("1", 2).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0]["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(paths[0]["relationships"][0]["type"], "HAS_SKILL");
    }

    #[tokio::test]
    async fn test_invalid_direction_is_rejected() {
        let repo = GraphRepository::new(ScriptedRunner::new(vec![]));
        assert!(repo.get_neighbors("1", None, "sideways", 5).await.is_err());
    }

    #[test]
    fn test_strip_korean_suffix() {
        let suffixes = vec!["프로젝트".to_string(), "팀".to_string()];
        assert_eq!(
            strip_korean_suffix("챗봇 리뉴얼 프로젝트", &suffixes),
            "챗봇 리뉴얼"
        );
        assert_eq!(strip_korean_suffix("개발팀", &suffixes), "개발");
        // A bare suffix has no meaningful stem and stays as-is.
        assert_eq!(strip_korean_suffix("팀", &suffixes), "팀");
        assert_eq!(strip_korean_suffix("Python", &suffixes), "Python");
    }
}
