//! Graph-RAG query pipeline.
//!
//! Turns a natural-language question about a corporate knowledge graph
//! into a grounded answer: classify intent, extract and resolve entities
//! against the graph, synthesise a Cypher query, execute it, and generate
//! a response - with an adaptive ontology loop learning from the terms the
//! resolver could not match.
//!
//! The pipeline is a fixed DAG of cooperative nodes over
//! [`pipeline_core`]'s execution engine:
//!
//! ```text
//! intent_classifier
//!   ├─ unknown ───────────────► response_generator
//!   ├─ ontology_update ───────► ontology_update_handler
//!   ├─ global_analysis ───────► community_summarizer
//!   └─ otherwise ─► cache_checker (optional)
//!        ├─ hit ──────────────► cypher_generator (cached) ─► graph_executor
//!        └─ miss ─► [entity_extractor ‖ schema_fetcher]    ─► ...
//!                       └── fan-in ─► concept_expander ─► entity_resolver
//!                             ├─ unresolved ─► clarification_handler
//!                             ├─ multi-hop ──► query_decomposer ─► cypher_generator
//!                             └─ otherwise ──► cypher_generator ─► graph_executor
//!                                                                    └─► response_generator
//! ```
//!
//! Node failures never escape the DAG: every node collapses its errors
//! into a state patch carrying `error` and a `<name>_error` execution-path
//! label, and the response generator renders the apology.

pub mod access;
pub mod community;
pub mod config;
pub mod intents;
pub mod nodes;
pub mod pipeline;
pub mod state;

pub use access::UserContext;
pub use community::{
    CommunityAlgorithm, CommunityBatchService, CommunityError, CommunityRefreshResult,
    CommunityStatusResult,
};
pub use config::{ExpansionStrategy, GraphSettings, Settings};
pub use intents::Intent;
pub use pipeline::{GraphRagPipeline, PipelineEvent, PipelineMetadata, PipelineResult};
pub use state::{ChatMessage, MessageRole, PipelineState, ResolvedEntity};
