//! Proposal persistence
//!
//! Proposals live as `OntologyProposal` nodes. Everything stateful about
//! the review lifecycle funnels through here: creation, frequency bumps,
//! optimistic-locked updates, pagination, stats, and the one genuinely
//! racy operation - auto-approval under a daily cap - which runs as a
//! single compare-and-set statement so concurrent learners cannot exceed
//! the cap.

use crate::error::{OntologyError, Result};
use crate::proposal::{
    parse_datetime, OntologyProposal, ProposalSource, ProposalStatus, ProposalType,
};
use chrono::Utc;
use graph_store::QueryRunner;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Sortable fields for the paginated listing
const SORT_WHITELIST: [&str; 4] = ["created_at", "updated_at", "frequency", "confidence"];

/// Fields an optimistic-locked update may touch
const UPDATE_WHITELIST: [&str; 10] = [
    "status",
    "suggested_action",
    "suggested_parent",
    "suggested_canonical",
    "suggested_relation_type",
    "category",
    "confidence",
    "reviewed_at",
    "reviewed_by",
    "rejection_reason",
];

/// Filters for the paginated listing
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    /// Status filter
    pub status: Option<String>,
    /// Type filter
    pub proposal_type: Option<String>,
    /// Source filter
    pub source: Option<String>,
    /// Category filter
    pub category: Option<String>,
    /// Case-insensitive term substring
    pub term_search: Option<String>,
}

/// Aggregate statistics over the proposal store
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProposalStats {
    /// Total proposals
    pub total: i64,
    /// Count by status
    pub pending: i64,
    /// Count by status
    pub approved: i64,
    /// Count by status
    pub auto_approved: i64,
    /// Count by status
    pub rejected: i64,
    /// Proposals per category
    pub by_category: Vec<(String, i64)>,
    /// Most frequent unresolved terms still pending
    pub top_terms: Vec<(String, i64)>,
}

/// Repository over `OntologyProposal` nodes
#[derive(Clone)]
pub struct ProposalRepository {
    runner: Arc<dyn QueryRunner>,
}

impl ProposalRepository {
    /// Create a repository over a runner
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    // ------------------------------------------------------------------
    // Create / find
    // ------------------------------------------------------------------

    /// Persist a new proposal node
    pub async fn create(&self, proposal: &OntologyProposal) -> Result<OntologyProposal> {
        let rows = self
            .runner
            .run_write(
                "CREATE (p:OntologyProposal) \
                 SET p = $props, \
                     p.created_at = datetime($created_at), \
                     p.updated_at = datetime($updated_at) \
                 RETURN properties(p) AS proposal",
                json!({
                    "props": proposal_props(proposal),
                    "created_at": proposal.created_at.to_rfc3339(),
                    "updated_at": proposal.updated_at.to_rfc3339(),
                }),
            )
            .await?;

        row_to_proposal(rows.first())
            .ok_or_else(|| OntologyError::validation("proposal create returned no row", "id"))
    }

    /// Find the active (pending) proposal for a term/category pair
    ///
    /// Term comparison is case-insensitive: the `(term, category)` pair is
    /// effectively unique among pending proposals.
    pub async fn find_active(
        &self,
        term: &str,
        category: &str,
    ) -> Result<Option<OntologyProposal>> {
        let rows = self
            .runner
            .run(
                "MATCH (p:OntologyProposal) \
                 WHERE toLower(p.term) = toLower($term) \
                   AND p.category = $category \
                   AND p.status = 'pending' \
                 RETURN properties(p) AS proposal \
                 LIMIT 1",
                json!({ "term": term, "category": category }),
            )
            .await?;

        Ok(row_to_proposal(rows.first()))
    }

    /// Load a proposal by id
    pub async fn get_by_id(&self, proposal_id: &str) -> Result<Option<OntologyProposal>> {
        let rows = self
            .runner
            .run(
                "MATCH (p:OntologyProposal {id: $id}) \
                 RETURN properties(p) AS proposal",
                json!({ "id": proposal_id }),
            )
            .await?;

        Ok(row_to_proposal(rows.first()))
    }

    /// Current stored version of a proposal
    pub async fn current_version(&self, proposal_id: &str) -> Result<Option<i64>> {
        let rows = self
            .runner
            .run(
                "MATCH (p:OntologyProposal {id: $id}) RETURN p.version AS version",
                json!({ "id": proposal_id }),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("version"))
            .and_then(Value::as_i64))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append an evidence question and bump frequency + version
    pub async fn bump_frequency(&self, proposal_id: &str, question: &str) -> Result<bool> {
        let rows = self
            .runner
            .run_write(
                "MATCH (p:OntologyProposal {id: $id}) \
                 SET p.frequency = p.frequency + 1, \
                     p.version = p.version + 1, \
                     p.evidence_questions = CASE \
                         WHEN $question = '' OR $question IN p.evidence_questions \
                         THEN p.evidence_questions \
                         ELSE p.evidence_questions + $question END, \
                     p.updated_at = datetime() \
                 RETURN p.frequency AS frequency",
                json!({ "id": proposal_id, "question": question }),
            )
            .await?;

        Ok(!rows.is_empty())
    }

    /// Optimistic-locked update of whitelisted fields
    ///
    /// Returns the updated proposal, or `None` when the version check
    /// failed (concurrent modification) or the proposal vanished.
    pub async fn update_with_version(
        &self,
        proposal_id: &str,
        expected_version: i64,
        updates: &Map<String, Value>,
    ) -> Result<Option<OntologyProposal>> {
        let mut set_clauses =
            vec!["p.version = p.version + 1".to_string(), "p.updated_at = datetime()".to_string()];
        let mut params = Map::new();
        params.insert("id".to_string(), json!(proposal_id));
        params.insert("expected_version".to_string(), json!(expected_version));

        for (key, value) in updates {
            if !UPDATE_WHITELIST.contains(&key.as_str()) {
                return Err(OntologyError::validation(
                    format!("Field '{key}' is not updatable"),
                    key.clone(),
                ));
            }
            if key == "reviewed_at" {
                // Temporal fields go through datetime() so date() works on
                // them later.
                set_clauses.push(format!("p.{key} = datetime($u_{key})"));
            } else {
                set_clauses.push(format!("p.{key} = $u_{key}"));
            }
            params.insert(format!("u_{key}"), value.clone());
        }

        let query = format!(
            "MATCH (p:OntologyProposal {{id: $id}}) \
             WHERE p.version = $expected_version \
             SET {} \
             RETURN properties(p) AS proposal",
            set_clauses.join(", ")
        );

        let rows = self.runner.run_write(&query, Value::Object(params)).await?;
        Ok(row_to_proposal(rows.first()))
    }

    /// Stamp `applied_at` after a successful ontology write
    pub async fn set_applied_at(&self, proposal_id: &str) -> Result<bool> {
        let rows = self
            .runner
            .run_write(
                "MATCH (p:OntologyProposal {id: $id}) \
                 SET p.applied_at = datetime(), p.updated_at = datetime() \
                 RETURN 1 AS updated",
                json!({ "id": proposal_id }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    // ------------------------------------------------------------------
    // Auto-approval
    // ------------------------------------------------------------------

    /// Number of proposals auto-approved today (UTC day of the store)
    pub async fn count_today_auto_approved(&self) -> Result<i64> {
        let rows = self
            .runner
            .run(
                "MATCH (p:OntologyProposal) \
                 WHERE p.status = 'auto_approved' \
                   AND date(p.reviewed_at) = date() \
                 RETURN count(p) AS count",
                json!({}),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Atomically auto-approve under the daily cap
    ///
    /// A single statement counts today's auto-approvals, matches the target
    /// proposal only while `today_count < daily_limit` *and* the version
    /// still matches, and flips status/version/review fields. Two learners
    /// racing on the cap cannot both get the last slot. A non-positive
    /// `daily_limit` skips the cap check entirely.
    pub async fn try_auto_approve_with_limit(
        &self,
        proposal_id: &str,
        expected_version: i64,
        daily_limit: i64,
    ) -> Result<bool> {
        let rows = if daily_limit <= 0 {
            self.runner
                .run_write(
                    "MATCH (p:OntologyProposal {id: $id}) \
                     WHERE p.version = $expected_version AND p.status = 'pending' \
                     SET p.status = 'auto_approved', \
                         p.version = p.version + 1, \
                         p.reviewed_at = datetime(), \
                         p.reviewed_by = 'system', \
                         p.updated_at = datetime() \
                     RETURN p.id AS id",
                    json!({ "id": proposal_id, "expected_version": expected_version }),
                )
                .await?
        } else {
            self.runner
                .run_write(
                    "OPTIONAL MATCH (approved:OntologyProposal) \
                     WHERE approved.status = 'auto_approved' \
                       AND date(approved.reviewed_at) = date() \
                     WITH count(approved) AS today_count \
                     MATCH (p:OntologyProposal {id: $id}) \
                     WHERE today_count < $daily_limit \
                       AND p.version = $expected_version \
                       AND p.status = 'pending' \
                     SET p.status = 'auto_approved', \
                         p.version = p.version + 1, \
                         p.reviewed_at = datetime(), \
                         p.reviewed_by = 'system', \
                         p.updated_at = datetime() \
                     RETURN p.id AS id, today_count",
                    json!({
                        "id": proposal_id,
                        "expected_version": expected_version,
                        "daily_limit": daily_limit,
                    }),
                )
                .await?
        };

        if rows.is_empty() {
            tracing::debug!(
                proposal_id = %proposal_id,
                expected_version,
                "Auto-approve skipped: cap reached, version mismatch or not pending"
            );
            return Ok(false);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Listing / stats / batch
    // ------------------------------------------------------------------

    /// Paginated listing with filters and whitelisted sorting
    pub async fn list_paginated(
        &self,
        filter: &ProposalFilter,
        sort_by: &str,
        descending: bool,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<OntologyProposal>, i64)> {
        if !SORT_WHITELIST.contains(&sort_by) {
            return Err(OntologyError::validation(
                format!("Sort field '{sort_by}' is not allowed"),
                "sort_by",
            ));
        }
        let order = if descending { "DESC" } else { "ASC" };

        let mut predicates: Vec<&str> = Vec::new();
        let mut params = Map::new();
        if let Some(status) = &filter.status {
            predicates.push("p.status = $status");
            params.insert("status".to_string(), json!(status));
        }
        if let Some(proposal_type) = &filter.proposal_type {
            predicates.push("p.proposal_type = $proposal_type");
            params.insert("proposal_type".to_string(), json!(proposal_type));
        }
        if let Some(source) = &filter.source {
            predicates.push("p.source = $source");
            params.insert("source".to_string(), json!(source));
        }
        if let Some(category) = &filter.category {
            predicates.push("p.category = $category");
            params.insert("category".to_string(), json!(category));
        }
        if let Some(term_search) = &filter.term_search {
            predicates.push("toLower(p.term) CONTAINS toLower($term_search)");
            params.insert("term_search".to_string(), json!(term_search));
        }

        let where_clause = if predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", predicates.join(" AND "))
        };

        let count_query =
            format!("MATCH (p:OntologyProposal) {where_clause} RETURN count(p) AS total");
        let total = self
            .runner
            .run(&count_query, Value::Object(params.clone()))
            .await?
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let page_query = format!(
            "MATCH (p:OntologyProposal) {where_clause} \
             RETURN properties(p) AS proposal \
             ORDER BY p.{sort_by} {order} \
             SKIP {offset} LIMIT {limit}"
        );
        let rows = self.runner.run(&page_query, Value::Object(params)).await?;

        let proposals = rows
            .iter()
            .filter_map(|row| row_to_proposal(Some(row)))
            .collect();

        Ok((proposals, total))
    }

    /// Aggregate statistics
    pub async fn stats(&self) -> Result<ProposalStats> {
        let mut stats = ProposalStats::default();

        let counts = self
            .runner
            .run(
                "MATCH (p:OntologyProposal) \
                 RETURN count(p) AS total, \
                        sum(CASE WHEN p.status = 'pending' THEN 1 ELSE 0 END) AS pending, \
                        sum(CASE WHEN p.status = 'approved' THEN 1 ELSE 0 END) AS approved, \
                        sum(CASE WHEN p.status = 'auto_approved' THEN 1 ELSE 0 END) AS auto_approved, \
                        sum(CASE WHEN p.status = 'rejected' THEN 1 ELSE 0 END) AS rejected",
                json!({}),
            )
            .await?;

        if let Some(row) = counts.first() {
            let get = |key: &str| row.get(key).and_then(Value::as_i64).unwrap_or(0);
            stats.total = get("total");
            stats.pending = get("pending");
            stats.approved = get("approved");
            stats.auto_approved = get("auto_approved");
            stats.rejected = get("rejected");
        }

        let categories = self
            .runner
            .run(
                "MATCH (p:OntologyProposal) \
                 RETURN p.category AS category, count(p) AS count \
                 ORDER BY count DESC",
                json!({}),
            )
            .await?;
        stats.by_category = categories
            .iter()
            .filter_map(|row| {
                Some((
                    row.get("category")?.as_str()?.to_string(),
                    row.get("count")?.as_i64()?,
                ))
            })
            .collect();

        let top_terms = self
            .runner
            .run(
                "MATCH (p:OntologyProposal) \
                 WHERE p.status = 'pending' \
                 RETURN p.term AS term, p.frequency AS frequency \
                 ORDER BY p.frequency DESC LIMIT 10",
                json!({}),
            )
            .await?;
        stats.top_terms = top_terms
            .iter()
            .filter_map(|row| {
                Some((
                    row.get("term")?.as_str()?.to_string(),
                    row.get("frequency")?.as_i64()?,
                ))
            })
            .collect();

        Ok(stats)
    }

    /// Batch status transition; returns `(success_count, failed_ids)`
    ///
    /// No optimistic locking: each id is transitioned iff still pending.
    /// Ids not found or not pending come back in the failed list.
    pub async fn batch_update_status(
        &self,
        proposal_ids: &[String],
        new_status: ProposalStatus,
        reviewed_by: &str,
        rejection_reason: Option<&str>,
    ) -> Result<(usize, Vec<String>)> {
        if proposal_ids.is_empty() {
            return Ok((0, Vec::new()));
        }

        let rows = self
            .runner
            .run_write(
                "UNWIND $ids AS pid \
                 MATCH (p:OntologyProposal {id: pid}) \
                 WHERE p.status = 'pending' \
                 SET p.status = $new_status, \
                     p.version = p.version + 1, \
                     p.reviewed_at = datetime(), \
                     p.reviewed_by = $reviewed_by, \
                     p.rejection_reason = $rejection_reason, \
                     p.updated_at = datetime() \
                 RETURN p.id AS id",
                json!({
                    "ids": proposal_ids,
                    "new_status": new_status.as_str(),
                    "reviewed_by": reviewed_by,
                    "rejection_reason": rejection_reason,
                }),
            )
            .await?;

        let succeeded: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .collect();

        let failed: Vec<String> = proposal_ids
            .iter()
            .filter(|id| !succeeded.contains(&id.as_str()))
            .cloned()
            .collect();

        Ok((succeeded.len(), failed))
    }
}

// ----------------------------------------------------------------------
// Row mapping
// ----------------------------------------------------------------------

fn proposal_props(proposal: &OntologyProposal) -> Value {
    json!({
        "id": proposal.id,
        "version": proposal.version,
        "proposal_type": proposal.proposal_type.as_str(),
        "term": proposal.term,
        "category": proposal.category,
        "suggested_action": proposal.suggested_action,
        "suggested_parent": proposal.suggested_parent,
        "suggested_canonical": proposal.suggested_canonical,
        "suggested_relation_type": proposal.suggested_relation_type,
        "evidence_questions": proposal.evidence_questions,
        "frequency": proposal.frequency,
        "confidence": proposal.confidence,
        "status": proposal.status.as_str(),
        "source": proposal.source.as_str(),
    })
}

fn row_to_proposal(row: Option<&Value>) -> Option<OntologyProposal> {
    let props = row?.get("proposal")?.as_object()?;
    let now = Utc::now();

    let get_str = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);

    let proposal_type = ProposalType::parse_loose(&get_str("proposal_type")?)?;

    let status = match props.get("status").and_then(Value::as_str).unwrap_or("pending") {
        "approved" => ProposalStatus::Approved,
        "rejected" => ProposalStatus::Rejected,
        "auto_approved" => ProposalStatus::AutoApproved,
        _ => ProposalStatus::Pending,
    };

    let source = match props.get("source").and_then(Value::as_str).unwrap_or("background") {
        "chat" => ProposalSource::Chat,
        "admin" => ProposalSource::Admin,
        _ => ProposalSource::Background,
    };

    Some(OntologyProposal {
        id: get_str("id")?,
        version: props.get("version").and_then(Value::as_i64).unwrap_or(1),
        proposal_type,
        term: get_str("term")?,
        category: get_str("category").unwrap_or_default(),
        suggested_action: get_str("suggested_action").unwrap_or_default(),
        suggested_parent: get_str("suggested_parent"),
        suggested_canonical: get_str("suggested_canonical"),
        suggested_relation_type: get_str("suggested_relation_type"),
        evidence_questions: props
            .get("evidence_questions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        frequency: props.get("frequency").and_then(Value::as_i64).unwrap_or(1),
        confidence: props
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        status,
        source,
        created_at: parse_datetime(props.get("created_at")).unwrap_or(now),
        updated_at: parse_datetime(props.get("updated_at")).unwrap_or(now),
        reviewed_at: parse_datetime(props.get("reviewed_at")),
        reviewed_by: get_str("reviewed_by"),
        rejection_reason: get_str("rejection_reason"),
        applied_at: parse_datetime(props.get("applied_at")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graph_store::Result as StoreResult;
    use parking_lot::Mutex;

    struct RecordingRunner {
        queries: Mutex<Vec<(String, Value)>>,
        responses: Mutex<Vec<Vec<Value>>>,
    }

    impl RecordingRunner {
        fn new(responses: Vec<Vec<Value>>) -> Arc<Self> {
            Arc::new(Self {
                queries: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl QueryRunner for RecordingRunner {
        async fn run(&self, cypher: &str, params: Value) -> StoreResult<Vec<Value>> {
            self.queries.lock().push((cypher.to_string(), params));
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(vec![])
            } else {
                Ok(responses.remove(0))
            }
        }

        async fn run_write(&self, cypher: &str, params: Value) -> StoreResult<Vec<Value>> {
            self.run(cypher, params).await
        }
    }

    fn stored_proposal_row() -> Value {
        json!({ "proposal": {
            "id": "p-1",
            "version": 2,
            "proposal_type": "NEW_SYNONYM",
            "term": "랭그래프",
            "category": "skills",
            "suggested_action": "Alias for LangGraph",
            "suggested_canonical": "LangGraph",
            "evidence_questions": ["랭그래프 쓰는 사람?"],
            "frequency": 5,
            "confidence": 0.97,
            "status": "pending",
            "source": "background",
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T10:00:00Z",
        }})
    }

    #[tokio::test]
    async fn test_row_mapping_round_trips_content() {
        let runner = RecordingRunner::new(vec![vec![stored_proposal_row()]]);
        let repo = ProposalRepository::new(runner);

        let proposal = repo.get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(proposal.id, "p-1");
        assert_eq!(proposal.version, 2);
        assert_eq!(proposal.proposal_type, ProposalType::NewSynonym);
        assert_eq!(proposal.suggested_canonical.as_deref(), Some("LangGraph"));
        assert_eq!(proposal.frequency, 5);
        assert_eq!(proposal.status, ProposalStatus::Pending);
    }

    #[tokio::test]
    async fn test_auto_approve_capped_query_checks_cap_and_version() {
        let runner = RecordingRunner::new(vec![vec![json!({"id": "p-1", "today_count": 3})]]);
        let repo = ProposalRepository::new(runner.clone());

        let approved = repo.try_auto_approve_with_limit("p-1", 2, 10).await.unwrap();
        assert!(approved);

        let (query, params) = runner.queries.lock()[0].clone();
        assert!(query.contains("today_count < $daily_limit"));
        assert!(query.contains("p.version = $expected_version"));
        assert!(query.contains("p.status = 'pending'"));
        assert_eq!(params["daily_limit"], 10);
    }

    #[tokio::test]
    async fn test_auto_approve_uncapped_when_limit_disabled() {
        let runner = RecordingRunner::new(vec![vec![json!({"id": "p-1"})]]);
        let repo = ProposalRepository::new(runner.clone());

        repo.try_auto_approve_with_limit("p-1", 1, 0).await.unwrap();

        let (query, _) = runner.queries.lock()[0].clone();
        assert!(!query.contains("today_count"));
    }

    #[tokio::test]
    async fn test_auto_approve_returns_false_on_empty_result() {
        let runner = RecordingRunner::new(vec![vec![]]);
        let repo = ProposalRepository::new(runner);
        assert!(!repo.try_auto_approve_with_limit("p-1", 9, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_with_version_rejects_non_whitelisted_field() {
        let repo = ProposalRepository::new(RecordingRunner::new(vec![]));

        let mut updates = Map::new();
        updates.insert("id".to_string(), json!("other"));

        let err = repo.update_with_version("p-1", 1, &updates).await.unwrap_err();
        assert!(matches!(err, OntologyError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_sort_field() {
        let repo = ProposalRepository::new(RecordingRunner::new(vec![]));
        let err = repo
            .list_paginated(&ProposalFilter::default(), "term; DROP", true, 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, OntologyError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_batch_update_reports_failed_ids() {
        let runner = RecordingRunner::new(vec![vec![json!({"id": "a"})]]);
        let repo = ProposalRepository::new(runner);

        let (ok, failed) = repo
            .batch_update_status(
                &["a".to_string(), "b".to_string()],
                ProposalStatus::Approved,
                "admin",
                None,
            )
            .await
            .unwrap();

        assert_eq!(ok, 1);
        assert_eq!(failed, vec!["b".to_string()]);
    }
}
