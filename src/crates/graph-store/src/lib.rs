//! Property-graph access layer for the Graph-RAG pipeline.
//!
//! Everything the pipeline asks of the graph database goes through this
//! crate:
//!
//! - [`validators`] - Cypher identifier validation (the injection defence:
//!   labels, relationship types and property names must be alphanumeric,
//!   underscore or Unicode letters, checked *before* any query text is
//!   assembled)
//! - [`QueryRunner`] - the driver seam: read/write execution returning
//!   JSON rows. [`Neo4jRunner`] implements it over a bounded `neo4rs`
//!   connection pool; tests implement it with canned rows.
//! - [`SchemaCache`] - labels / relationship types / sampled properties /
//!   indexes / constraints behind a TTL cache with explicit invalidation
//! - [`GraphRepository`] - the facade the nodes use: entity resolution
//!   strategies, neighbour and subgraph queries, generic node/edge CRUD,
//!   vector search, embedding upserts
//! - [`QueryCacheRepository`] - embedding-fingerprinted question → Cypher
//!   cache

pub mod error;
pub mod query_cache;
pub mod repository;
pub mod runner;
pub mod schema;
pub mod validators;
pub mod wire;

pub use error::{GraphStoreError, Result};
pub use query_cache::{CachedQuery, QueryCacheRepository};
pub use repository::{GraphRepository, ResolvedNode, SuffixSource};
pub use runner::{Neo4jRunner, QueryRunner};
pub use schema::{GraphSchema, SchemaCache};
