//! Shared test doubles for the pipeline scenario suite
//!
//! `ScriptedModel` answers each gateway operation from a fixed script
//! (dispatching on the operation's system prompt); `MemoryGraph` is an
//! in-memory stand-in for the graph store that understands the queries
//! the repositories emit: name lookup, schema introspection, vector
//! search, proposal lifecycle, concept writes and generic execution.

use async_trait::async_trait;
use graph_store::{QueryRunner, Result as StoreResult};
use llm::{LanguageModel, LlmError, ModelTier};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Script for one pipeline turn
#[derive(Clone)]
pub struct ModelScript {
    /// Intent returned by classification
    pub intent: &'static str,
    /// Confidence returned by classification
    pub confidence: f64,
    /// Entities returned by extraction: (type, value)
    pub entities: Vec<(&'static str, &'static str)>,
    /// Generated query; `None` makes generation fail
    pub cypher: Option<&'static str>,
    /// Answer text produced by response generation
    pub answer: &'static str,
    /// Parsed ontology update request, when the turn asks for one
    pub update_parse: Option<Value>,
}

impl Default for ModelScript {
    fn default() -> Self {
        Self {
            intent: "unknown",
            confidence: 0.0,
            entities: Vec::new(),
            cypher: None,
            answer: "answer",
            update_parse: None,
        }
    }
}

/// A [`LanguageModel`] that replays a [`ModelScript`]
#[derive(Clone)]
pub struct ScriptedModel {
    pub script: ModelScript,
}

impl ScriptedModel {
    pub fn new(script: ModelScript) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate_text(
        &self,
        system: &str,
        user: &str,
        _tier: ModelTier,
    ) -> llm::Result<String> {
        if system.contains("could not be matched") {
            // Clarification: name the unresolved terms back.
            return Ok(format!("다음 항목을 확인해 주세요: {user}"));
        }
        if system.contains("organisation-wide statistics") {
            return Ok("조직 전체 요약입니다.".to_string());
        }
        Ok(self.script.answer.to_string())
    }

    async fn generate_json(
        &self,
        system: &str,
        _user: &str,
        _tier: ModelTier,
    ) -> llm::Result<Value> {
        if system.contains("You classify questions") {
            let entities: Vec<Value> = self
                .script
                .entities
                .iter()
                .map(|(entity_type, value)| json!({"type": entity_type, "value": value}))
                .collect();
            return Ok(json!({
                "intent": self.script.intent,
                "confidence": self.script.confidence,
                "entities": entities,
            }));
        }
        if system.contains("You decompose graph questions") {
            return Ok(json!({
                "is_multi_hop": true,
                "hop_count": 2,
                "hops": [],
                "final_return": "names",
                "explanation": "scripted",
            }));
        }
        if system.contains("You write Cypher") {
            return match self.script.cypher {
                Some(cypher) => Ok(json!({"cypher": cypher, "parameters": {}})),
                None => Err(LlmError::ResponseShape("scripted generation failure".into())),
            };
        }
        if system.contains("Parse a user's request to change the ontology") {
            return self
                .script
                .update_parse
                .clone()
                .ok_or_else(|| LlmError::ResponseShape("no update parse scripted".into()));
        }
        if system.contains("You maintain the ontology") {
            return Ok(json!({
                "type": "NEW_CONCEPT",
                "action": "add concept",
                "confidence": 0.5,
            }));
        }
        Ok(json!({}))
    }

    async fn embed(&self, _text: &str) -> llm::Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3, 0.4])
    }

    fn clone_box(&self) -> Box<dyn LanguageModel> {
        Box::new(self.clone())
    }
}

/// In-memory graph double
pub struct MemoryGraph {
    /// Names resolvable by the entity resolver
    pub known_names: Vec<&'static str>,
    /// Rows returned for executed (generated or cached) queries
    pub query_rows: Vec<Value>,
    /// Vector-search hit handed to the cache checker, with its score
    pub cache_entry: Option<(f64, &'static str)>,
    /// Proposals created through the repository
    pub proposals: Mutex<Vec<Value>>,
    /// Concept names known to exist
    pub concepts: Mutex<Vec<String>>,
    /// Concept relations written: (source, type, target)
    pub relations: Mutex<Vec<(String, String, String)>>,
    /// Every query text seen, for path-level assertions
    pub queries: Mutex<Vec<String>>,
}

impl MemoryGraph {
    pub fn new(known_names: Vec<&'static str>, query_rows: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            known_names,
            query_rows,
            cache_entry: None,
            proposals: Mutex::new(Vec::new()),
            concepts: Mutex::new(Vec::new()),
            relations: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn with_cache_entry(
        known_names: Vec<&'static str>,
        query_rows: Vec<Value>,
        score: f64,
        cached_query: &'static str,
    ) -> Arc<Self> {
        Arc::new(Self {
            known_names,
            query_rows,
            cache_entry: Some((score, cached_query)),
            proposals: Mutex::new(Vec::new()),
            concepts: Mutex::new(Vec::new()),
            relations: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl QueryRunner for MemoryGraph {
    async fn run(&self, cypher: &str, params: Value) -> StoreResult<Vec<Value>> {
        self.queries.lock().push(cypher.to_string());

        // Schema introspection
        if cypher.contains("db.labels") {
            return Ok(vec![
                json!({"label": "Person"}),
                json!({"label": "Department"}),
                json!({"label": "Skill"}),
            ]);
        }
        if cypher.contains("db.relationshipTypes") {
            return Ok(vec![
                json!({"relationshipType": "BELONGS_TO"}),
                json!({"relationshipType": "HAS_SKILL"}),
            ]);
        }
        if cypher.starts_with("SHOW ") {
            return Ok(vec![]);
        }
        if cypher.contains("UNWIND keys(") {
            return Ok(vec![json!({"key": "name"})]);
        }

        // Vector search (query cache)
        if cypher.contains("db.index.vector.queryNodes") {
            return Ok(match self.cache_entry {
                Some((score, cached)) => vec![json!({
                    "id": "4:c:1",
                    "labels": ["CachedQuery"],
                    "properties": {
                        "question": "Python 전문가 찾아줘",
                        "cypher_query": cached,
                        "cypher_parameters": "{\"skill\": \"Python\"}",
                    },
                    "score": score,
                })],
                None => vec![],
            });
        }

        // Entity lookup
        if cypher.contains("toLower(n.name)") || cypher.contains("replace(n.name") {
            let name = params["name"].as_str().unwrap_or_default();
            if self.known_names.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                return Ok(vec![json!({
                    "id": "4:n:123",
                    "labels": ["Person"],
                    "properties": {"name": name, "department": "개발팀"},
                })]);
            }
            return Ok(vec![]);
        }

        // Proposal reads
        if cypher.contains("OntologyProposal") {
            return self.proposal_query(cypher, &params);
        }

        // Concept existence
        if cypher.contains("MATCH (c:Concept)") && cypher.contains("count(c)") {
            let name = params["name"].as_str().unwrap_or_default().to_lowercase();
            let count = self
                .concepts
                .lock()
                .iter()
                .filter(|c| c.to_lowercase() == name)
                .count() as i64;
            return Ok(vec![json!({"count": count})]);
        }

        // Community summary cache
        if cypher.contains("CommunitySummary") {
            return Ok(vec![]);
        }

        // Generic execution of the generated/cached query
        Ok(self.query_rows.clone())
    }

    async fn run_write(&self, cypher: &str, params: Value) -> StoreResult<Vec<Value>> {
        self.queries.lock().push(cypher.to_string());

        if cypher.contains("CREATE (p:OntologyProposal)") {
            let mut props = params["props"].clone();
            props["created_at"] = params["created_at"].clone();
            props["updated_at"] = params["updated_at"].clone();
            self.proposals.lock().push(props.clone());
            return Ok(vec![json!({"proposal": props})]);
        }
        if cypher.contains("OntologyProposal") {
            return self.proposal_write(cypher, &params);
        }
        if cypher.contains("MERGE (c:Concept") {
            let name = params["name"].as_str().unwrap_or_default().to_string();
            self.concepts.lock().push(name.clone());
            return Ok(vec![json!({"name": name})]);
        }
        if cypher.contains("MERGE (source)-[r:") {
            let relation = cypher
                .split("MERGE (source)-[r:")
                .nth(1)
                .and_then(|rest| rest.split(']').next())
                .unwrap_or_default()
                .to_string();
            self.relations.lock().push((
                params["source_name"].as_str().unwrap_or_default().to_string(),
                relation.clone(),
                params["target_name"].as_str().unwrap_or_default().to_string(),
            ));
            return Ok(vec![json!({"created": relation})]);
        }
        if cypher.contains("CREATE (cs:CommunitySummary)") {
            return Ok(vec![json!({"saved": 1})]);
        }

        Ok(vec![])
    }
}

impl MemoryGraph {
    fn proposal_query(&self, cypher: &str, params: &Value) -> StoreResult<Vec<Value>> {
        let proposals = self.proposals.lock();

        if cypher.contains("RETURN p.version AS version") {
            let id = params["id"].as_str().unwrap_or_default();
            return Ok(proposals
                .iter()
                .filter(|p| p["id"] == id)
                .map(|p| json!({"version": p["version"]}))
                .collect());
        }
        if cypher.contains("{id: $id}") {
            let id = params["id"].as_str().unwrap_or_default();
            return Ok(proposals
                .iter()
                .filter(|p| p["id"] == id)
                .map(|p| json!({"proposal": p}))
                .collect());
        }
        if cypher.contains("toLower(p.term)") {
            let term = params["term"].as_str().unwrap_or_default().to_lowercase();
            return Ok(proposals
                .iter()
                .filter(|p| {
                    p["term"].as_str().unwrap_or_default().to_lowercase() == term
                        && p["status"] == "pending"
                })
                .map(|p| json!({"proposal": p}))
                .collect());
        }
        Ok(vec![])
    }

    fn proposal_write(&self, cypher: &str, params: &Value) -> StoreResult<Vec<Value>> {
        let mut proposals = self.proposals.lock();

        if cypher.contains("WHERE p.version = $expected_version") {
            let id = params["id"].as_str().unwrap_or_default();
            let expected = params["expected_version"].as_i64().unwrap_or(0);
            for proposal in proposals.iter_mut() {
                if proposal["id"] == id && proposal["version"] == expected {
                    proposal["version"] = json!(expected + 1);
                    if let Some(status) = params.get("u_status") {
                        proposal["status"] = status.clone();
                    }
                    if let Some(reviewer) = params.get("u_reviewed_by") {
                        proposal["reviewed_by"] = reviewer.clone();
                    }
                    return Ok(vec![json!({"proposal": proposal.clone()})]);
                }
            }
            return Ok(vec![]);
        }
        if cypher.contains("SET p.applied_at = datetime()") {
            let id = params["id"].as_str().unwrap_or_default();
            for proposal in proposals.iter_mut() {
                if proposal["id"] == id {
                    proposal["applied_at"] = json!("2026-08-01T12:00:00Z");
                    return Ok(vec![json!({"updated": 1})]);
                }
            }
            return Ok(vec![]);
        }
        Ok(vec![])
    }
}
