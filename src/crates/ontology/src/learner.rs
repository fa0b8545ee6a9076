//! Background ontology learner
//!
//! After every resolver pass the pipeline hands the learner its unresolved
//! entities (fire-and-forget: the request path never awaits it). For each
//! validated term the learner either bumps the frequency of the existing
//! pending proposal or asks the light model to classify the term into a
//! proposal type, persists the result, and evaluates auto-approval - an
//! atomic compare-and-set in the store that enforces the daily cap.
//!
//! Learner tasks run detached with their own per-term deadline; a
//! semaphore bounds how many are in flight at once. Cancelling the
//! originating request does not cancel the learner.

use crate::error::Result;
use crate::proposal::{OntologyProposal, ProposalSource, ProposalStatus, ProposalType};
use crate::proposal_repo::ProposalRepository;
use crate::registry::OntologyRegistry;
use crate::service::OntologyService;
use chrono::{DateTime, Utc};
use llm::LlmGateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default bound on in-flight learner tasks
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

/// A surface form the resolver could not match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedEntity {
    /// The surface form
    pub term: String,
    /// Category bucket derived from the entity type
    pub category: String,
    /// Question the term appeared in
    pub question: String,
    /// When the resolver observed it (UTC)
    pub timestamp: DateTime<Utc>,
}

/// Configuration of the adaptive-ontology loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveOntologySettings {
    /// Master switch for the background learner
    pub enabled: bool,
    /// Whether auto-approval runs at all
    pub auto_approve_enabled: bool,
    /// Minimum confidence for auto-approval
    pub auto_approve_confidence: f64,
    /// Minimum frequency for auto-approval
    pub auto_approve_min_frequency: i64,
    /// Daily auto-approval cap (non-positive disables the cap)
    pub auto_approve_daily_limit: i64,
    /// Proposal types eligible for auto-approval
    pub auto_approve_types: Vec<String>,
    /// Per-term LLM analysis budget in seconds
    pub analysis_timeout_secs: u64,
    /// Shortest term worth learning
    pub min_term_length: usize,
    /// Longest term worth learning
    pub max_term_length: usize,
    /// Bound on concurrently running learner tasks
    pub max_in_flight: usize,
}

impl Default for AdaptiveOntologySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_approve_enabled: false,
            auto_approve_confidence: 0.95,
            auto_approve_min_frequency: 5,
            auto_approve_daily_limit: 10,
            auto_approve_types: vec!["NEW_SYNONYM".to_string()],
            analysis_timeout_secs: 8,
            min_term_length: 2,
            max_term_length: 50,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl AdaptiveOntologySettings {
    fn allowed_types(&self) -> Vec<ProposalType> {
        self.auto_approve_types
            .iter()
            .filter_map(|t| ProposalType::parse_loose(t))
            .collect()
    }
}

/// Turns unresolved terms into ontology proposals in the background
pub struct OntologyLearner {
    settings: AdaptiveOntologySettings,
    gateway: LlmGateway,
    proposals: ProposalRepository,
    service: Arc<OntologyService>,
    registry: Arc<OntologyRegistry>,
    in_flight: Arc<Semaphore>,
}

impl OntologyLearner {
    /// Create a learner
    pub fn new(
        settings: AdaptiveOntologySettings,
        gateway: LlmGateway,
        proposals: ProposalRepository,
        service: Arc<OntologyService>,
        registry: Arc<OntologyRegistry>,
    ) -> Self {
        let permits = settings.max_in_flight.max(1);
        tracing::info!(
            enabled = settings.enabled,
            auto_approve = settings.auto_approve_enabled,
            "OntologyLearner initialized"
        );
        Self {
            settings,
            gateway,
            proposals,
            service,
            registry,
            in_flight: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Whether the learner is active
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Validate a term before spending an LLM call on it
    ///
    /// Rejects empty/whitespace terms, terms outside the configured length
    /// band, pure digit strings, and strings with no alphabetic character.
    pub fn validate_term(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return false;
        }

        let length = term.chars().count();
        if length < self.settings.min_term_length || length > self.settings.max_term_length {
            return false;
        }

        if term.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }

        term.chars().any(char::is_alphabetic)
    }

    /// Detach a learner run; the caller never awaits it
    ///
    /// The task takes its own snapshot of the inputs and runs under the
    /// in-flight semaphore; when all permits are busy the batch is dropped
    /// with a warning rather than queueing behind the request path.
    pub fn spawn(
        self: &Arc<Self>,
        unresolved: Vec<UnresolvedEntity>,
        schema_snapshot: Option<Value>,
    ) {
        if !self.settings.enabled || unresolved.is_empty() {
            return;
        }

        let Ok(permit) = self.in_flight.clone().try_acquire_owned() else {
            tracing::warn!(
                dropped = unresolved.len(),
                "Learner at capacity; dropping unresolved batch"
            );
            return;
        };

        let learner = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match learner.process_unresolved(unresolved, schema_snapshot).await {
                Ok(proposals) => {
                    tracing::info!(count = proposals.len(), "Learner pass complete")
                }
                Err(e) => tracing::error!(error = %e, "Learner pass failed"),
            }
        });
    }

    /// Analyse a batch of unresolved entities
    pub async fn process_unresolved(
        &self,
        unresolved: Vec<UnresolvedEntity>,
        _schema_snapshot: Option<Value>,
    ) -> Result<Vec<OntologyProposal>> {
        if !self.settings.enabled {
            return Ok(Vec::new());
        }

        let valid: Vec<&UnresolvedEntity> = unresolved
            .iter()
            .filter(|entity| self.validate_term(&entity.term))
            .collect();

        if valid.is_empty() {
            tracing::debug!("No valid unresolved entities to process");
            return Ok(Vec::new());
        }

        tracing::info!(count = valid.len(), "Processing unresolved entities");

        let mut proposals = Vec::new();
        for entity in valid {
            match self.process_single(entity).await {
                Ok(Some(proposal)) => proposals.push(proposal),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(term = %entity.term, error = %e, "Failed to process entity");
                }
            }
        }

        tracing::info!(count = proposals.len(), "Generated ontology proposals");
        Ok(proposals)
    }

    async fn process_single(
        &self,
        entity: &UnresolvedEntity,
    ) -> Result<Option<OntologyProposal>> {
        let term = entity.term.trim();
        let category = if entity.category.is_empty() {
            "skills"
        } else {
            &entity.category
        };

        // Existing pending proposal: bump and re-evaluate auto-approval.
        if let Some(mut existing) = self.proposals.find_active(term, category).await? {
            self.proposals
                .bump_frequency(&existing.id, &entity.question)
                .await?;
            existing.add_evidence(entity.question.clone());
            // bump_frequency advanced the stored version
            existing.version += 1;

            self.check_and_auto_approve(&existing).await;

            tracing::debug!(term = %term, frequency = existing.frequency, "Updated existing proposal");
            return Ok(Some(existing));
        }

        // Fresh term: classify with the light model under a deadline.
        let known_concepts = self
            .registry
            .get_loader()
            .list_concepts(category, 50)
            .await
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");

        let analysis = tokio::time::timeout(
            Duration::from_secs(self.settings.analysis_timeout_secs),
            self.gateway
                .analyze_ontology_term(term, category, &entity.question, &known_concepts),
        )
        .await;

        let analysis = match analysis {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => {
                tracing::warn!(term = %term, error = %e, "LLM analysis failed");
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!(term = %term, "LLM analysis timed out");
                return Ok(None);
            }
        };

        let Some(proposal_type) = ProposalType::parse_loose(&analysis.proposal_type) else {
            tracing::warn!(term = %term, reported = %analysis.proposal_type, "Invalid proposal type from model");
            return Ok(None);
        };

        let mut proposal = OntologyProposal::new(proposal_type, term, category, analysis.action);
        proposal.suggested_parent = analysis.parent;
        proposal.suggested_canonical = analysis.canonical;
        proposal.confidence = analysis.confidence;
        proposal.source = ProposalSource::Background;
        if !entity.question.is_empty() {
            proposal.evidence_questions.push(entity.question.clone());
        }

        let saved = self.proposals.create(&proposal).await?;
        self.check_and_auto_approve(&saved).await;

        tracing::info!(
            term = %term,
            proposal_type = proposal_type.as_str(),
            confidence = saved.confidence,
            "Created proposal"
        );

        Ok(Some(saved))
    }

    /// Evaluate and, when eligible, atomically auto-approve a proposal
    pub async fn check_and_auto_approve(&self, proposal: &OntologyProposal) -> bool {
        if !self.settings.auto_approve_enabled {
            return false;
        }
        if proposal.status != ProposalStatus::Pending {
            return false;
        }

        if !proposal.can_auto_approve(
            self.settings.auto_approve_confidence,
            self.settings.auto_approve_min_frequency,
            &self.settings.allowed_types(),
        ) {
            return false;
        }

        let approved = match self
            .proposals
            .try_auto_approve_with_limit(
                &proposal.id,
                proposal.version,
                self.settings.auto_approve_daily_limit,
            )
            .await
        {
            Ok(approved) => approved,
            Err(e) => {
                tracing::error!(proposal_id = %proposal.id, error = %e, "Auto-approve failed");
                return false;
            }
        };

        if !approved {
            tracing::debug!(
                term = %proposal.term,
                "Auto-approve skipped: limit reached or concurrent modification"
            );
            return false;
        }

        tracing::info!(
            term = %proposal.term,
            proposal_type = proposal.proposal_type.as_str(),
            frequency = proposal.frequency,
            "Auto-approved proposal"
        );

        // Apply the now-approved proposal and make it visible.
        let mut applied_copy = proposal.clone();
        applied_copy.approve(None, true);

        match self.service.apply_proposal(&applied_copy).await {
            Ok(true) => {
                if let Err(e) = self.proposals.set_applied_at(&proposal.id).await {
                    tracing::error!(proposal_id = %proposal.id, error = %e, "Failed to stamp applied_at");
                }
                self.service.refresh_registry("auto-approve").await;
            }
            Ok(false) => {
                tracing::warn!(proposal_id = %proposal.id, "Auto-approved proposal not applied");
            }
            Err(e) => {
                tracing::error!(proposal_id = %proposal.id, error = %e, "Failed to apply auto-approved proposal");
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_repo::ConceptRepository;
    use crate::hybrid::OntologyMode;
    use crate::lookup::OntologyLookup;
    use async_trait::async_trait;
    use graph_store::{QueryRunner, Result as StoreResult};
    use llm::{LanguageModel, ModelTier};
    use parking_lot::Mutex;
    use serde_json::json;

    struct NullLoader;

    #[async_trait]
    impl OntologyLookup for NullLoader {
        async fn get_canonical(&self, term: &str, _category: &str) -> String {
            term.to_string()
        }
        async fn get_synonyms(&self, term: &str, _category: &str) -> Vec<String> {
            vec![term.to_string()]
        }
        async fn get_children(&self, _concept: &str, _category: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[derive(Clone)]
    struct SynonymModel;

    #[async_trait]
    impl LanguageModel for SynonymModel {
        async fn generate_text(
            &self,
            _system: &str,
            _user: &str,
            _tier: ModelTier,
        ) -> llm::Result<String> {
            Ok("text".to_string())
        }

        async fn generate_json(
            &self,
            _system: &str,
            _user: &str,
            _tier: ModelTier,
        ) -> llm::Result<Value> {
            Ok(json!({
                "type": "NEW_SYNONYM",
                "action": "register alias",
                "canonical": "LangGraph",
                "confidence": 0.88,
            }))
        }

        async fn embed(&self, _text: &str) -> llm::Result<Vec<f32>> {
            Ok(vec![0.0])
        }

        fn clone_box(&self) -> Box<dyn LanguageModel> {
            Box::new(self.clone())
        }
    }

    /// Graph that stores created proposals in memory
    struct ProposalSink {
        created: Mutex<Vec<Value>>,
        auto_approvals: Mutex<usize>,
    }

    #[async_trait]
    impl QueryRunner for ProposalSink {
        async fn run(&self, cypher: &str, _params: Value) -> StoreResult<Vec<Value>> {
            if cypher.contains("p.status = 'pending'") && cypher.contains("toLower(p.term)") {
                return Ok(vec![]); // no existing proposal
            }
            Ok(vec![])
        }

        async fn run_write(&self, cypher: &str, params: Value) -> StoreResult<Vec<Value>> {
            if cypher.contains("CREATE (p:OntologyProposal)") {
                let mut props = params["props"].clone();
                props["created_at"] = params["created_at"].clone();
                props["updated_at"] = params["updated_at"].clone();
                self.created.lock().push(props.clone());
                return Ok(vec![json!({ "proposal": props })]);
            }
            if cypher.contains("p.status = 'auto_approved'")
                || cypher.contains("SET p.status = 'auto_approved'")
            {
                *self.auto_approvals.lock() += 1;
                return Ok(vec![json!({ "id": "x" })]);
            }
            Ok(vec![])
        }
    }

    fn learner(
        settings: AdaptiveOntologySettings,
        sink: Arc<ProposalSink>,
    ) -> OntologyLearner {
        let gateway = LlmGateway::new(Arc::new(SynonymModel));
        let proposals = ProposalRepository::new(sink.clone());
        let registry = Arc::new(OntologyRegistry::new(
            OntologyMode::Graph,
            Arc::new(NullLoader),
        ));
        let service = Arc::new(OntologyService::new(
            proposals.clone(),
            ConceptRepository::new(sink),
            Some(registry.clone()),
        ));
        OntologyLearner::new(settings, gateway, proposals, service, registry)
    }

    fn sink() -> Arc<ProposalSink> {
        Arc::new(ProposalSink {
            created: Mutex::new(Vec::new()),
            auto_approvals: Mutex::new(0),
        })
    }

    fn unresolved(term: &str) -> UnresolvedEntity {
        UnresolvedEntity {
            term: term.to_string(),
            category: "skills".to_string(),
            question: "랭그래프 쓰는 사람?".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_validate_term() {
        let learner = learner(AdaptiveOntologySettings::default(), sink());
        assert!(learner.validate_term("LangGraph"));
        assert!(learner.validate_term("랭그래프"));
        assert!(!learner.validate_term(""));
        assert!(!learner.validate_term("a"));
        assert!(!learner.validate_term("12345"));
        assert!(!learner.validate_term("!!!"));
        assert!(!learner.validate_term(&"x".repeat(51)));
    }

    #[tokio::test]
    async fn test_new_term_creates_proposal() {
        let sink = sink();
        let learner = learner(AdaptiveOntologySettings::default(), sink.clone());

        let proposals = learner
            .process_unresolved(vec![unresolved("랭그래프")], None)
            .await
            .unwrap();

        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].proposal_type, ProposalType::NewSynonym);
        assert_eq!(proposals[0].suggested_canonical.as_deref(), Some("LangGraph"));
        assert_eq!(sink.created.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_terms_are_filtered() {
        let sink = sink();
        let learner = learner(AdaptiveOntologySettings::default(), sink.clone());

        let proposals = learner
            .process_unresolved(vec![unresolved("42"), unresolved("!")], None)
            .await
            .unwrap();

        assert!(proposals.is_empty());
        assert!(sink.created.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_learner_is_inert() {
        let settings = AdaptiveOntologySettings {
            enabled: false,
            ..Default::default()
        };
        let sink = sink();
        let learner = learner(settings, sink.clone());

        let proposals = learner
            .process_unresolved(vec![unresolved("랭그래프")], None)
            .await
            .unwrap();
        assert!(proposals.is_empty());
    }

    #[tokio::test]
    async fn test_auto_approve_gated_by_thresholds() {
        let settings = AdaptiveOntologySettings {
            auto_approve_enabled: true,
            auto_approve_confidence: 0.8,
            auto_approve_min_frequency: 1,
            ..Default::default()
        };
        let sink = sink();
        let learner = learner(settings, sink.clone());

        let mut proposal = OntologyProposal::new(
            ProposalType::NewSynonym,
            "랭그래프",
            "skills",
            "alias",
        );
        proposal.suggested_canonical = Some("LangGraph".to_string());
        proposal.confidence = 0.9;

        assert!(learner.check_and_auto_approve(&proposal).await);
        assert!(*sink.auto_approvals.lock() >= 1);

        // Below the confidence bar: no CAS attempt.
        proposal.confidence = 0.5;
        assert!(!learner.check_and_auto_approve(&proposal).await);
    }
}
