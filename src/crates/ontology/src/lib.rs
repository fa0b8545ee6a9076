//! Ontology subsystem of the Graph-RAG pipeline.
//!
//! The ontology is the catalogue of concepts (skills, positions,
//! departments) and their synonym / hierarchy relationships. Two halves
//! live here:
//!
//! **Read side** - resolving terms to canonical names and expanding them:
//!
//! - [`OntologyLookup`] - the loader trait (canonical, synonyms, children,
//!   concept expansion)
//! - [`YamlOntologyLoader`] - file-backed loader over `schema.yaml` +
//!   `synonyms.yaml`
//! - [`GraphOntologyLoader`] - Cypher-backed loader over `Concept` nodes
//! - [`HybridOntologyLoader`] - graph first, file fallback
//! - [`OntologyRegistry`] - owns the active loader; serialises refresh so
//!   approved changes become visible without a restart
//!
//! **Write side** - the adaptive control loop:
//!
//! - [`OntologyProposal`] - a typed, versioned change proposal
//! - [`ProposalRepository`] / [`ConceptRepository`] - graph persistence
//! - [`OntologyService`] - the transactional boundary: approve / reject /
//!   apply / batch operations with optimistic locking
//! - [`OntologyLearner`] - background analyser turning unresolved entities
//!   into proposals, with atomic daily-capped auto-approval

pub mod concept_repo;
pub mod error;
pub mod expansion;
pub mod graph_loader;
pub mod hybrid;
pub mod learner;
pub mod lookup;
pub mod proposal;
pub mod proposal_repo;
pub mod registry;
pub mod service;
pub mod yaml_loader;

pub use concept_repo::ConceptRepository;
pub use error::{OntologyError, Result};
pub use expansion::ExpansionConfig;
pub use graph_loader::GraphOntologyLoader;
pub use hybrid::{HybridOntologyLoader, OntologyMode};
pub use learner::{AdaptiveOntologySettings, OntologyLearner, UnresolvedEntity};
pub use lookup::OntologyLookup;
pub use proposal::{OntologyProposal, ProposalSource, ProposalStatus, ProposalType};
pub use proposal_repo::{ProposalFilter, ProposalRepository, ProposalStats};
pub use registry::OntologyRegistry;
pub use service::{BatchResult, OntologyService};
pub use yaml_loader::YamlOntologyLoader;
