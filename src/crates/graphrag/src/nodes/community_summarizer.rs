//! Organisation-wide summary node

use crate::nodes::PipelineNode;
use crate::state::{ChatMessage, PipelineState};
use async_trait::async_trait;
use graph_store::GraphRepository;
use llm::LlmGateway;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Two questions are equivalent when their non-stopword token overlap
/// reaches this ratio
const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Summary cache entries expire after this window
const CACHE_TTL: &str = "PT24H";

/// Partial update emitted by [`CommunitySummarizerNode`]
#[derive(Debug, Serialize)]
pub struct CommunitySummarizerUpdate {
    /// The macro-level answer
    pub response: String,
    /// Department→skill edges for a UI that wants to render them
    pub graph_results: Vec<Value>,
    /// Edge count
    pub result_count: i64,
    /// Assistant turn appended to the history
    pub messages: Vec<ChatMessage>,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answers `global_analysis` questions from organisation-wide statistics
///
/// Bypasses entity resolution and query generation entirely: three
/// aggregation queries (headcount by department, projects by status, top
/// skills) are assembled into a context for the heavy model, and a small
/// `(Department)-[DEPT_HAS_SKILL]->(Skill)` edge list is synthesised for
/// rendering. Summaries are cached in the graph for 24 hours, keyed by a
/// stopword-filtered token-overlap similarity.
pub struct CommunitySummarizerNode {
    gateway: LlmGateway,
    repository: GraphRepository,
}

impl CommunitySummarizerNode {
    /// Create the node
    pub fn new(gateway: LlmGateway, repository: GraphRepository) -> Self {
        Self { gateway, repository }
    }

    async fn department_stats(&self) -> Vec<Value> {
        self.repository
            .execute_cypher(
                "MATCH (p:Person)-[:BELONGS_TO]->(d:Department) \
                 RETURN d.name AS department, count(p) AS headcount \
                 ORDER BY headcount DESC LIMIT 20",
                json!({}),
            )
            .await
            .unwrap_or_default()
    }

    async fn project_stats(&self) -> Vec<Value> {
        self.repository
            .execute_cypher(
                "MATCH (pr:Project) \
                 RETURN pr.status AS status, count(pr) AS count \
                 ORDER BY count DESC",
                json!({}),
            )
            .await
            .unwrap_or_default()
    }

    async fn skill_distribution(&self) -> Vec<Value> {
        self.repository
            .execute_cypher(
                "MATCH (p:Person)-[:HAS_SKILL]->(s:Skill) \
                 RETURN s.name AS skill, count(p) AS holders \
                 ORDER BY holders DESC LIMIT 10",
                json!({}),
            )
            .await
            .unwrap_or_default()
    }

    async fn department_skill_edges(&self) -> Vec<Value> {
        self.repository
            .execute_cypher(
                "MATCH (p:Person)-[:BELONGS_TO]->(d:Department), \
                       (p)-[:HAS_SKILL]->(s:Skill) \
                 RETURN d.name AS department, s.name AS skill, count(p) AS weight \
                 ORDER BY weight DESC LIMIT 50",
                json!({}),
            )
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                json!({
                    "type": "DEPT_HAS_SKILL",
                    "department": row.get("department").cloned().unwrap_or(Value::Null),
                    "skill": row.get("skill").cloned().unwrap_or(Value::Null),
                    "weight": row.get("weight").cloned().unwrap_or(Value::Null),
                })
            })
            .collect()
    }

    fn format_context(
        departments: &[Value],
        projects: &[Value],
        skills: &[Value],
    ) -> String {
        let mut sections = Vec::new();

        let mut lines = vec!["[부서별 인원]".to_string()];
        for row in departments {
            lines.push(format!(
                "- {}: {}명",
                row.get("department").and_then(Value::as_str).unwrap_or("?"),
                row.get("headcount").and_then(Value::as_i64).unwrap_or(0),
            ));
        }
        sections.push(lines.join("\n"));

        let mut lines = vec!["[프로젝트 상태]".to_string()];
        for row in projects {
            lines.push(format!(
                "- {}: {}건",
                row.get("status").and_then(Value::as_str).unwrap_or("?"),
                row.get("count").and_then(Value::as_i64).unwrap_or(0),
            ));
        }
        sections.push(lines.join("\n"));

        let mut lines = vec!["[상위 스킬 분포]".to_string()];
        for row in skills {
            lines.push(format!(
                "- {}: {}명",
                row.get("skill").and_then(Value::as_str).unwrap_or("?"),
                row.get("holders").and_then(Value::as_i64).unwrap_or(0),
            ));
        }
        sections.push(lines.join("\n"));

        sections.join("\n\n")
    }

    async fn find_cached_summary(&self, question: &str) -> Option<String> {
        let rows = self
            .repository
            .execute_cypher(
                &format!(
                    "MATCH (cs:CommunitySummary) \
                     WHERE cs.created_at > datetime() - duration('{CACHE_TTL}') \
                     RETURN cs.question AS question, cs.summary AS summary \
                     ORDER BY cs.created_at DESC LIMIT 20"
                ),
                json!({}),
            )
            .await
            .ok()?;

        for row in rows {
            let cached_question = row.get("question").and_then(Value::as_str)?;
            if is_similar_question(question, cached_question) {
                tracing::info!(
                    cached_question = %cached_question.chars().take(50).collect::<String>(),
                    "Community summary cache hit"
                );
                return row
                    .get("summary")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
        None
    }

    async fn save_summary_cache(&self, question: &str, summary: &str) {
        let result = self
            .repository
            .runner()
            .run_write(
                "CREATE (cs:CommunitySummary) \
                 SET cs.question = $question, cs.summary = $summary, \
                     cs.created_at = datetime() \
                 RETURN 1 AS saved",
                json!({ "question": question, "summary": summary }),
            )
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to cache community summary");
        }
    }

    fn success(
        &self,
        response: String,
        edges: Vec<Value>,
        suffix: &str,
    ) -> Value {
        serde_json::to_value(CommunitySummarizerUpdate {
            messages: vec![ChatMessage::assistant(&response)],
            result_count: edges.len() as i64,
            graph_results: edges,
            response,
            execution_path: vec![format!("{}{suffix}", self.name())],
            error: None,
        })
        .unwrap_or_else(|_| json!({}))
    }
}

/// Token-overlap similarity with stopword filtering (Jaccard ≥ 0.6)
///
/// Deliberately weak; deployments with vector search replace this by the
/// embedding fingerprint in the query cache, but the token fallback keeps
/// working when the cache is disabled.
pub fn is_similar_question(a: &str, b: &str) -> bool {
    const STOPWORDS: [&str; 18] = [
        "은", "는", "이", "가", "을", "를", "의", "에", "로", "와", "과", "좀", "요",
        "the", "a", "an", "of",
        "알려줘",
    ];

    let tokenize = |text: &str| -> HashSet<String> {
        text.split_whitespace()
            .map(|token| token.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
            .filter(|token| !token.is_empty() && !STOPWORDS.contains(&token.as_str()))
            .collect()
    };

    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return false;
    }

    let intersection = tokens_a.intersection(&tokens_b).count() as f64;
    let union = tokens_a.union(&tokens_b).count() as f64;

    intersection / union >= SIMILARITY_THRESHOLD
}

#[async_trait]
impl PipelineNode for CommunitySummarizerNode {
    fn name(&self) -> &'static str {
        "community_summarizer"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        tracing::info!("Running community summary");

        if let Some(cached) = self.find_cached_summary(&state.question).await {
            let edges = self.department_skill_edges().await;
            return self.success(cached, edges, "_cached");
        }

        let departments = self.department_stats().await;
        let projects = self.project_stats().await;
        let skills = self.skill_distribution().await;

        let context = Self::format_context(&departments, &projects, &skills);

        match self
            .gateway
            .community_summary(&context, &state.question)
            .await
        {
            Ok(summary) => {
                self.save_summary_cache(&state.question, &summary).await;
                let edges = self.department_skill_edges().await;
                self.success(summary, edges, "")
            }
            Err(e) => {
                tracing::error!(error = %e, "Community summary failed");
                serde_json::to_value(CommunitySummarizerUpdate {
                    response: "죄송합니다. 조직 전체 분석을 수행하는 중 오류가 발생했습니다."
                        .to_string(),
                    graph_results: Vec::new(),
                    result_count: 0,
                    messages: vec![ChatMessage::assistant(
                        "죄송합니다. 조직 전체 분석을 수행하는 중 오류가 발생했습니다.",
                    )],
                    execution_path: vec![format!("{}_error", self.name())],
                    error: Some(format!("Community summary failed: {e}")),
                })
                .unwrap_or_else(|_| json!({}))
            }
        }
    }
}
