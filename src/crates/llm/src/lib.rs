//! LLM provider layer for the Graph-RAG pipeline.
//!
//! The pipeline talks to its language models through two seams:
//!
//! - [`LanguageModel`] - the raw provider trait: text generation, strict
//!   JSON generation, embeddings, in two model tiers ([`ModelTier::Light`]
//!   for classification-sized calls, [`ModelTier::Heavy`] for multi-hop
//!   query synthesis). [`AzureLlmClient`] is the shipped implementation.
//! - [`LlmGateway`] - typed operations over any `LanguageModel`: intent
//!   classification + entity extraction, query decomposition, Cypher
//!   generation, response/clarification/community-summary text, ontology
//!   term analysis, update-request parsing, and embeddings. Each operation
//!   parses the model's JSON strictly into a typed struct; a malformed
//!   payload is a [`LlmError::ResponseShape`], never a panic.
//!
//! Tests (and the pipeline's own test suites) implement `LanguageModel`
//! with canned responses, so no network access is needed anywhere below
//! the client itself.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prompts;
pub mod retry;
pub mod traits;

pub use client::AzureLlmClient;
pub use config::{LlmSettings, ModelTier};
pub use error::{LlmError, Result};
pub use gateway::{
    ExtractedEntity, GeneratedCypher, IntentExtraction, LlmGateway, OntologyAnalysis,
    QueryDecomposition, QueryHop, UpdateParse,
};
pub use retry::RetryPolicy;
pub use traits::LanguageModel;
