//! Community batch refresh
//!
//! One-click orchestration of the graph-data-science community pipeline
//! the global-analysis phase builds on: clean up stale projections, build
//! the skill-similarity projection, detect communities, record metadata,
//! drop the projection. Community structure is derived from *skill
//! similarity*, not the raw org chart: a Person–Skill bipartite projection
//! feeds node similarity (Jaccard over shared skills), the resulting
//! `SIMILAR` edges are re-projected, and the clustering runs on that
//! similarity graph.
//!
//! `refresh` always re-runs the full pipeline; a call arriving while one
//! is in flight fails with [`CommunityError::ConcurrentRefresh`] rather
//! than queueing. Nothing in the query path depends on this service
//! synchronously.

use chrono::{DateTime, Utc};
use graph_store::{GraphStoreError, QueryRunner};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

/// Name of the similarity graph projection
const PROJECTION_NAME: &str = "person_skill_graph";

/// Node property receiving the community id
const WRITE_PROPERTY: &str = "communityId";

/// A refresh older than this is considered stale
const STALE_THRESHOLD_HOURS: i64 = 24;

/// Convenience result type using [`CommunityError`]
pub type Result<T> = std::result::Result<T, CommunityError>;

/// Errors raised by the batch service
#[derive(Debug, Error)]
pub enum CommunityError {
    /// A refresh is already running; the caller should retry later
    #[error("Community refresh already in progress")]
    ConcurrentRefresh,

    /// Graph access failure
    #[error(transparent)]
    Store(#[from] GraphStoreError),
}

/// Community detection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityAlgorithm {
    /// Leiden (default; better-connected communities)
    #[default]
    Leiden,
    /// Louvain
    Louvain,
}

impl CommunityAlgorithm {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leiden => "leiden",
            Self::Louvain => "louvain",
        }
    }
}

/// Outcome of one refresh run
#[derive(Debug, Clone, Serialize)]
pub struct CommunityRefreshResult {
    /// Whether the pipeline ran to completion
    pub success: bool,
    /// Algorithm that ran
    pub algorithm: String,
    /// Number of communities detected
    pub community_count: i64,
    /// Modularity of the detected partition
    pub modularity: f64,
    /// Nodes that received a community id
    pub node_count: i64,
    /// Wall-clock duration of the pipeline
    pub duration_seconds: f64,
}

/// Current community state
#[derive(Debug, Clone, Serialize)]
pub struct CommunityStatusResult {
    /// Whether any node currently carries a community id
    pub has_communities: bool,
    /// Last refresh time (ISO-8601), when one ever ran
    pub refreshed_at: Option<String>,
    /// Algorithm of the last refresh
    pub algorithm: Option<String>,
    /// Community count of the last refresh
    pub community_count: i64,
    /// Modularity of the last refresh
    pub modularity: Option<f64>,
    /// People currently carrying a community id
    pub assigned_node_count: i64,
    /// Whether the last refresh is older than the staleness window
    pub is_stale: bool,
}

/// Orchestrates the community-detection refresh
pub struct CommunityBatchService {
    runner: Arc<dyn QueryRunner>,
    refresh_lock: Mutex<()>,
}

impl CommunityBatchService {
    /// Create the service
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self {
            runner,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Run the full refresh pipeline
    ///
    /// 1. drop leftover projections
    /// 2. build the skill-similarity projection
    /// 3. detect communities (`algorithm`, resolution `gamma`)
    /// 4. record metadata on the `CommunityMeta` node
    /// 5. drop the projection
    ///
    /// # Errors
    ///
    /// [`CommunityError::ConcurrentRefresh`] when a refresh is already in
    /// flight. On any pipeline failure the projections are cleaned up
    /// before the error propagates.
    pub async fn refresh(
        &self,
        algorithm: CommunityAlgorithm,
        gamma: f64,
        min_shared_skills: i64,
    ) -> Result<CommunityRefreshResult> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            return Err(CommunityError::ConcurrentRefresh);
        };

        let started = Instant::now();
        tracing::info!(
            algorithm = algorithm.as_str(),
            gamma,
            min_shared_skills,
            "Community refresh started"
        );

        let outcome = self
            .run_pipeline(algorithm, gamma, min_shared_skills)
            .await;

        match outcome {
            Ok((community_count, modularity, node_count)) => {
                let duration = started.elapsed().as_secs_f64();
                tracing::info!(
                    community_count,
                    modularity,
                    duration_seconds = duration,
                    "Community refresh completed"
                );
                Ok(CommunityRefreshResult {
                    success: true,
                    algorithm: algorithm.as_str().to_string(),
                    community_count,
                    modularity,
                    node_count,
                    duration_seconds: (duration * 100.0).round() / 100.0,
                })
            }
            Err(e) => {
                // Clean up projection memory even on failure.
                if let Err(cleanup_err) = self.cleanup_projections().await {
                    tracing::warn!(error = %cleanup_err, "Failed to cleanup projections after error");
                } else {
                    tracing::info!("All projections cleaned up after error");
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        algorithm: CommunityAlgorithm,
        gamma: f64,
        min_shared_skills: i64,
    ) -> Result<(i64, f64, i64)> {
        self.cleanup_projections().await?;

        let (node_count, relationship_count) = self
            .create_skill_similarity_projection(min_shared_skills)
            .await?;
        tracing::info!(
            node_count,
            relationship_count,
            "Similarity projection created"
        );

        let (community_count, modularity, written) =
            self.detect_communities(algorithm, gamma).await?;
        tracing::info!(
            community_count,
            modularity,
            "Communities detected"
        );

        self.save_metadata(algorithm, gamma, community_count, modularity, written)
            .await?;

        self.drop_projection(PROJECTION_NAME).await?;
        tracing::info!("Projection dropped after community detection");

        Ok((community_count, modularity, written))
    }

    /// Drop both pipeline projections, ignoring ones that do not exist
    async fn cleanup_projections(&self) -> Result<usize> {
        let bipartite = format!("{PROJECTION_NAME}_bipartite");
        let mut dropped = 0usize;
        for name in [PROJECTION_NAME, bipartite.as_str()] {
            if self.drop_projection(name).await? {
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    async fn drop_projection(&self, name: &str) -> Result<bool> {
        let rows = self
            .runner
            .run_write(
                "CALL gds.graph.drop($name, false) YIELD graphName RETURN graphName",
                json!({ "name": name }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Build the skill-similarity projection
    ///
    /// Person–Skill bipartite projection → node similarity (Jaccard over
    /// shared skills, `degreeCutoff` = `min_shared_skills`, top 50
    /// neighbours) written back as `SIMILAR` edges → final Person +
    /// `SIMILAR` projection the clustering runs on.
    async fn create_skill_similarity_projection(
        &self,
        min_shared_skills: i64,
    ) -> Result<(i64, i64)> {
        let bipartite = format!("{PROJECTION_NAME}_bipartite");

        // Leftover SIMILAR edges from a previous run would skew the
        // similarity graph.
        self.runner
            .run_write("MATCH ()-[r:SIMILAR]->() DELETE r", json!({}))
            .await?;
        tracing::debug!("Cleaned up existing SIMILAR relationships");

        self.runner
            .run_write(
                "CALL gds.graph.project($name, ['Person', 'Skill'], \
                 {HAS_SKILL: {orientation: 'UNDIRECTED'}}) \
                 YIELD nodeCount, relationshipCount \
                 RETURN nodeCount, relationshipCount",
                json!({ "name": bipartite }),
            )
            .await?;

        self.runner
            .run_write(
                "CALL gds.nodeSimilarity.write($name, { \
                 writeRelationshipType: 'SIMILAR', \
                 writeProperty: 'similarity', \
                 similarityCutoff: 0.0, \
                 degreeCutoff: $degree_cutoff, \
                 topK: 50}) \
                 YIELD relationshipsWritten \
                 RETURN relationshipsWritten",
                json!({ "name": bipartite, "degree_cutoff": min_shared_skills }),
            )
            .await?;

        self.drop_projection(&bipartite).await?;

        let rows = self
            .runner
            .run_write(
                "CALL gds.graph.project($name, ['Person'], \
                 {SIMILAR: {orientation: 'UNDIRECTED', properties: ['similarity']}}) \
                 YIELD nodeCount, relationshipCount \
                 RETURN nodeCount, relationshipCount",
                json!({ "name": PROJECTION_NAME }),
            )
            .await?;

        let node_count = rows
            .first()
            .and_then(|row| row.get("nodeCount"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let relationship_count = rows
            .first()
            .and_then(|row| row.get("relationshipCount"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        Ok((node_count, relationship_count))
    }

    /// Run community detection on the similarity projection
    ///
    /// Returns `(community_count, modularity, nodes_written)`.
    async fn detect_communities(
        &self,
        algorithm: CommunityAlgorithm,
        gamma: f64,
    ) -> Result<(i64, f64, i64)> {
        let query = match algorithm {
            CommunityAlgorithm::Leiden => format!(
                "CALL gds.leiden.write($name, \
                 {{writeProperty: '{WRITE_PROPERTY}', gamma: $gamma, randomSeed: 42}}) \
                 YIELD communityCount, modularity, nodePropertiesWritten \
                 RETURN communityCount, modularity, nodePropertiesWritten"
            ),
            CommunityAlgorithm::Louvain => format!(
                "CALL gds.louvain.write($name, \
                 {{writeProperty: '{WRITE_PROPERTY}', randomSeed: 42}}) \
                 YIELD communityCount, modularity, nodePropertiesWritten \
                 RETURN communityCount, modularity, nodePropertiesWritten"
            ),
        };

        let rows = self
            .runner
            .run_write(&query, json!({ "name": PROJECTION_NAME, "gamma": gamma }))
            .await?;

        let row = rows.first().ok_or_else(|| {
            GraphStoreError::QueryExecution("community detection returned no row".into())
        })?;

        Ok((
            row.get("communityCount").and_then(Value::as_i64).unwrap_or(0),
            row.get("modularity").and_then(Value::as_f64).unwrap_or(0.0),
            row.get("nodePropertiesWritten")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        ))
    }

    async fn save_metadata(
        &self,
        algorithm: CommunityAlgorithm,
        gamma: f64,
        community_count: i64,
        modularity: f64,
        node_count: i64,
    ) -> Result<()> {
        self.runner
            .run_write(
                "MERGE (m:CommunityMeta {key: 'last_refresh'}) \
                 SET m.refreshed_at = datetime(), \
                     m.algorithm = $algorithm, \
                     m.gamma = $gamma, \
                     m.community_count = $community_count, \
                     m.modularity = $modularity, \
                     m.node_count = $node_count \
                 RETURN m.community_count AS community_count",
                json!({
                    "algorithm": algorithm.as_str(),
                    "gamma": gamma,
                    "community_count": community_count,
                    "modularity": modularity,
                    "node_count": node_count,
                }),
            )
            .await?;
        tracing::debug!("CommunityMeta node updated");
        Ok(())
    }

    /// Current community state from the metadata node and live counts
    pub async fn status(&self) -> Result<CommunityStatusResult> {
        let assigned_node_count = self.count_assigned_nodes().await?;

        let rows = self
            .runner
            .run(
                "MATCH (m:CommunityMeta {key: 'last_refresh'}) \
                 RETURN toString(m.refreshed_at) AS refreshed_at, \
                        m.algorithm AS algorithm, \
                        m.community_count AS community_count, \
                        m.modularity AS modularity",
                json!({}),
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(CommunityStatusResult {
                has_communities: false,
                refreshed_at: None,
                algorithm: None,
                community_count: 0,
                modularity: None,
                assigned_node_count,
                is_stale: true,
            });
        };

        let refreshed_at = row
            .get("refreshed_at")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(CommunityStatusResult {
            has_communities: assigned_node_count > 0,
            is_stale: is_stale(refreshed_at.as_deref()),
            refreshed_at,
            algorithm: row
                .get("algorithm")
                .and_then(Value::as_str)
                .map(str::to_string),
            community_count: row
                .get("community_count")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            modularity: row.get("modularity").and_then(Value::as_f64),
            assigned_node_count,
        })
    }

    async fn count_assigned_nodes(&self) -> Result<i64> {
        let rows = self
            .runner
            .run(
                &format!(
                    "MATCH (p:Person) WHERE p.{WRITE_PROPERTY} IS NOT NULL \
                     RETURN count(DISTINCT p.name) AS cnt"
                ),
                json!({}),
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("cnt"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }
}

/// Whether a stored refresh timestamp is older than the staleness window
///
/// The store reports nanosecond precision; fractional seconds beyond six
/// digits are truncated before parsing. Unparseable values count as stale.
fn is_stale(refreshed_at: Option<&str>) -> bool {
    let Some(text) = refreshed_at else {
        return true;
    };

    let truncated = truncate_subseconds(text);
    let parsed = DateTime::parse_from_rfc3339(&truncated)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(&truncated, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
        });

    match parsed {
        Ok(dt) => (Utc::now() - dt).num_hours() >= STALE_THRESHOLD_HOURS,
        Err(_) => true,
    }
}

/// Cut fractional seconds down to microsecond precision
fn truncate_subseconds(text: &str) -> String {
    let Some(dot) = text.find('.') else {
        return text.to_string();
    };

    let digits_end = text[dot + 1..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|offset| dot + 1 + offset)
        .unwrap_or(text.len());

    let keep = (dot + 7).min(digits_end);
    format!("{}{}", &text[..keep], &text[digits_end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graph_store::Result as StoreResult;
    use parking_lot::Mutex as SyncMutex;

    struct GdsRunner {
        queries: SyncMutex<Vec<String>>,
        meta: Option<Value>,
        fail_on: Option<&'static str>,
        gate: Option<Arc<tokio::sync::Notify>>,
    }

    impl GdsRunner {
        fn new(meta: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                queries: SyncMutex::new(Vec::new()),
                meta,
                fail_on: None,
                gate: None,
            })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().clone()
        }
    }

    #[async_trait]
    impl QueryRunner for GdsRunner {
        async fn run(&self, cypher: &str, _params: Value) -> StoreResult<Vec<Value>> {
            self.queries.lock().push(cypher.to_string());
            if cypher.contains("CommunityMeta") {
                return Ok(self.meta.clone().into_iter().collect());
            }
            if cypher.contains("count(DISTINCT p.name)") {
                return Ok(vec![json!({"cnt": 42})]);
            }
            Ok(vec![])
        }

        async fn run_write(&self, cypher: &str, _params: Value) -> StoreResult<Vec<Value>> {
            self.queries.lock().push(cypher.to_string());

            if let Some(marker) = self.fail_on {
                if cypher.contains(marker) {
                    return Err(GraphStoreError::QueryExecution("scripted failure".into()));
                }
            }
            if let Some(gate) = &self.gate {
                if cypher.contains("nodeSimilarity") {
                    gate.notified().await;
                }
            }

            if cypher.contains("gds.graph.drop") {
                return Ok(vec![json!({"graphName": "dropped"})]);
            }
            if cypher.contains("gds.graph.project") {
                return Ok(vec![json!({"nodeCount": 30, "relationshipCount": 120})]);
            }
            if cypher.contains("nodeSimilarity") {
                return Ok(vec![json!({"relationshipsWritten": 120})]);
            }
            if cypher.contains("gds.leiden.write") || cypher.contains("gds.louvain.write") {
                return Ok(vec![json!({
                    "communityCount": 5,
                    "modularity": 0.71,
                    "nodePropertiesWritten": 30,
                })]);
            }
            if cypher.contains("CommunityMeta") {
                return Ok(vec![json!({"community_count": 5})]);
            }
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_refresh_runs_similarity_pipeline() {
        let runner = GdsRunner::new(None);
        let service = CommunityBatchService::new(runner.clone());

        let result = service
            .refresh(CommunityAlgorithm::Leiden, 1.0, 2)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.algorithm, "leiden");
        assert_eq!(result.community_count, 5);
        assert_eq!(result.modularity, 0.71);
        assert_eq!(result.node_count, 30);

        let queries = runner.queries();
        // Old SIMILAR edges are removed before the bipartite projection.
        let similar_cleanup = queries
            .iter()
            .position(|q| q.contains("MATCH ()-[r:SIMILAR]->() DELETE r"))
            .expect("SIMILAR cleanup ran");
        let bipartite = queries
            .iter()
            .position(|q| q.contains("['Person', 'Skill']"))
            .expect("bipartite projection ran");
        let similarity = queries
            .iter()
            .position(|q| q.contains("gds.nodeSimilarity.write"))
            .expect("node similarity ran");
        let clustering = queries
            .iter()
            .position(|q| q.contains("gds.leiden.write"))
            .expect("leiden ran");
        assert!(similar_cleanup < bipartite);
        assert!(bipartite < similarity);
        assert!(similarity < clustering);

        // The clustering runs on the SIMILAR re-projection, not the raw graph.
        assert!(queries.iter().any(|q| q.contains("{SIMILAR: {orientation: 'UNDIRECTED'")));
        assert!(queries.iter().any(|q| q.contains("CommunityMeta")));
    }

    #[tokio::test]
    async fn test_louvain_selection() {
        let runner = GdsRunner::new(None);
        let service = CommunityBatchService::new(runner.clone());

        let result = service
            .refresh(CommunityAlgorithm::Louvain, 1.0, 1)
            .await
            .unwrap();

        assert_eq!(result.algorithm, "louvain");
        assert!(runner.queries().iter().any(|q| q.contains("gds.louvain.write")));
        assert!(!runner.queries().iter().any(|q| q.contains("gds.leiden.write")));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_rejected() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let runner = Arc::new(GdsRunner {
            queries: SyncMutex::new(Vec::new()),
            meta: None,
            fail_on: None,
            gate: Some(gate.clone()),
        });
        let service = Arc::new(CommunityBatchService::new(runner));

        // First refresh parks inside the pipeline at the similarity step.
        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.refresh(CommunityAlgorithm::Leiden, 1.0, 2).await })
        };
        tokio::task::yield_now().await;

        let second = service.refresh(CommunityAlgorithm::Leiden, 1.0, 2).await;
        assert!(matches!(second, Err(CommunityError::ConcurrentRefresh)));

        gate.notify_waiters();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_failure_cleans_up_and_propagates() {
        let runner = Arc::new(GdsRunner {
            queries: SyncMutex::new(Vec::new()),
            meta: None,
            fail_on: Some("gds.leiden.write"),
            gate: None,
        });
        let service = CommunityBatchService::new(runner.clone());

        let err = service
            .refresh(CommunityAlgorithm::Leiden, 1.0, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, CommunityError::Store(_)));

        // Projections were dropped again after the failure.
        let queries = runner.queries();
        let failure_at = queries
            .iter()
            .position(|q| q.contains("gds.leiden.write"))
            .unwrap();
        assert!(queries[failure_at..]
            .iter()
            .any(|q| q.contains("gds.graph.drop")));
    }

    #[tokio::test]
    async fn test_status_reads_metadata_and_counts() {
        let runner = GdsRunner::new(Some(json!({
            "refreshed_at": "2026-08-01T00:00:00.123456789Z",
            "algorithm": "leiden",
            "community_count": 5,
            "modularity": 0.71,
        })));
        let service = CommunityBatchService::new(runner);

        let status = service.status().await.unwrap();
        assert!(status.has_communities);
        assert_eq!(status.algorithm.as_deref(), Some("leiden"));
        assert_eq!(status.community_count, 5);
        assert_eq!(status.modularity, Some(0.71));
        assert_eq!(status.assigned_node_count, 42);
    }

    #[tokio::test]
    async fn test_status_without_metadata_is_never_refreshed() {
        let service = CommunityBatchService::new(GdsRunner::new(None));

        let status = service.status().await.unwrap();
        assert!(!status.has_communities);
        assert!(status.refreshed_at.is_none());
        assert!(status.algorithm.is_none());
        assert!(status.modularity.is_none());
        assert!(status.is_stale);
        // Leftover assignments from an earlier deployment are still counted.
        assert_eq!(status.assigned_node_count, 42);
    }

    #[test]
    fn test_is_stale_thresholds() {
        let fresh = Utc::now().to_rfc3339();
        assert!(!is_stale(Some(&fresh)));

        let old = (Utc::now() - chrono::Duration::hours(25)).to_rfc3339();
        assert!(is_stale(Some(&old)));

        assert!(is_stale(None));
        assert!(is_stale(Some("not a timestamp")));
    }

    #[test]
    fn test_truncate_subseconds_handles_nanoseconds() {
        assert_eq!(
            truncate_subseconds("2026-08-01T00:00:00.123456789Z"),
            "2026-08-01T00:00:00.123456Z"
        );
        assert_eq!(
            truncate_subseconds("2026-08-01T00:00:00.123Z"),
            "2026-08-01T00:00:00.123Z"
        );
        assert_eq!(
            truncate_subseconds("2026-08-01T00:00:00Z"),
            "2026-08-01T00:00:00Z"
        );
    }
}
