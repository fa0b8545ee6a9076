//! Query execution seam
//!
//! [`QueryRunner`] is the narrow interface between repositories and the
//! driver: execute a parameterised query, get JSON rows back. The shipped
//! implementation, [`Neo4jRunner`], wraps a `neo4rs` connection pool; test
//! suites implement the trait with canned rows and never touch a database.

use crate::error::{GraphStoreError, Result};
use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde_json::{Map, Value};

/// Default connection pool size
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;

/// Executes parameterised Cypher and returns JSON rows
///
/// Rows are JSON objects keyed by the query's RETURN aliases. Write
/// statements run in a write transaction on the implementation's side.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run a read query
    async fn run(&self, cypher: &str, params: Value) -> Result<Vec<Value>>;

    /// Run a write query in a write transaction
    async fn run_write(&self, cypher: &str, params: Value) -> Result<Vec<Value>>;
}

/// `neo4rs`-backed runner with a bounded connection pool
pub struct Neo4jRunner {
    graph: Graph,
}

impl Neo4jRunner {
    /// Connect with the default pool size
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        Self::connect_with_pool(uri, user, password, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit pool size
    pub async fn connect_with_pool(
        uri: &str,
        user: &str,
        password: &str,
        max_connections: usize,
    ) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .max_connections(max_connections)
            .build()
            .map_err(|e| GraphStoreError::Connectivity(e.to_string()))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| GraphStoreError::Connectivity(e.to_string()))?;

        tracing::info!(max_connections, "Connected to graph database");

        Ok(Self { graph })
    }

    /// Wrap an existing driver handle (sharing its pool)
    pub fn from_graph(graph: Graph) -> Self {
        Self { graph }
    }

    /// Lightweight connectivity probe
    pub async fn health_check(&self) -> Result<bool> {
        let rows = self.run("RETURN 1 AS ok", Value::Object(Map::new())).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("ok"))
            .and_then(Value::as_i64)
            == Some(1))
    }

    fn build_query(cypher: &str, params: Value) -> Result<Query> {
        let mut query = neo4rs::query(cypher);

        if let Value::Object(map) = params {
            for (key, value) in map {
                query = query.param(&key, json_to_bolt(value));
            }
        }

        Ok(query)
    }

    async fn collect_rows(
        &self,
        cypher: &str,
        params: Value,
    ) -> Result<Vec<Value>> {
        let query = Self::build_query(cypher, params)?;

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| GraphStoreError::QueryExecution(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphStoreError::QueryExecution(e.to_string()))?
        {
            rows.push(crate::wire::row_to_wire(&row)?);
        }

        Ok(rows)
    }
}

#[async_trait]
impl QueryRunner for Neo4jRunner {
    async fn run(&self, cypher: &str, params: Value) -> Result<Vec<Value>> {
        tracing::debug!(query = %truncate(cypher, 120), "Executing read query");
        self.collect_rows(cypher, params).await
    }

    async fn run_write(&self, cypher: &str, params: Value) -> Result<Vec<Value>> {
        tracing::debug!(query = %truncate(cypher, 120), "Executing write query");
        // neo4rs routes everything through the same session; MERGE/SET/CREATE
        // statements are executed as auto-commit write transactions.
        self.collect_rows(cypher, params).await
    }
}

/// Convert a JSON value into a driver parameter
///
/// Temporal values are carried as ISO strings; the graph's own `datetime()`
/// function parses them where needed.
pub fn json_to_bolt(value: Value) -> neo4rs::BoltType {
    use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType};

    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::Integer(BoltInteger::new(i))
            } else {
                BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(0.0)))
            }
        }
        Value::String(s) => BoltType::String(BoltString::new(&s)),
        Value::Array(items) => {
            let mut list = BoltList::default();
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => {
            let mut bolt_map = BoltMap::default();
            for (key, item) in map {
                bolt_map.put(BoltString::new(&key), json_to_bolt(item));
            }
            BoltType::Map(bolt_map)
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
