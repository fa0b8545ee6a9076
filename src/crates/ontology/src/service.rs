//! Proposal service
//!
//! [`OntologyService`] is the transactional boundary around proposals:
//! lookups, admin creation, optimistic-locked updates, the
//! approve/reject state machine, batch operations, and application of
//! approved proposals to the concept graph followed by a registry
//! refresh. Domain errors ([`OntologyError`]) propagate to the caller
//! here - unlike inside the query pipeline, nothing is swallowed.

use crate::concept_repo::ConceptRepository;
use crate::error::{OntologyError, Result};
use crate::proposal::{OntologyProposal, ProposalSource, ProposalStatus, ProposalType};
use crate::proposal_repo::{ProposalFilter, ProposalRepository, ProposalStats};
use crate::registry::OntologyRegistry;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Outcome of a batch approve/reject
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Number of proposals transitioned
    pub success_count: usize,
    /// Number that failed
    pub failed_count: usize,
    /// Ids that failed (not found or not pending)
    pub failed_ids: Vec<String>,
    /// Per-id failure messages
    pub errors: Vec<(String, String)>,
}

/// Business logic over the proposal store
#[derive(Clone)]
pub struct OntologyService {
    proposals: ProposalRepository,
    concepts: ConceptRepository,
    registry: Option<Arc<OntologyRegistry>>,
}

impl OntologyService {
    /// Create a service
    pub fn new(
        proposals: ProposalRepository,
        concepts: ConceptRepository,
        registry: Option<Arc<OntologyRegistry>>,
    ) -> Self {
        Self {
            proposals,
            concepts,
            registry,
        }
    }

    /// Borrow the proposal repository
    pub fn proposals(&self) -> &ProposalRepository {
        &self.proposals
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Load a proposal or fail with `ProposalNotFound`
    pub async fn get_proposal(&self, proposal_id: &str) -> Result<OntologyProposal> {
        self.proposals
            .get_by_id(proposal_id)
            .await?
            .ok_or_else(|| OntologyError::ProposalNotFound(proposal_id.to_string()))
    }

    /// Paginated listing; the literal filter value `"all"` means no filter
    #[allow(clippy::too_many_arguments)]
    pub async fn list_proposals(
        &self,
        status: Option<String>,
        proposal_type: Option<String>,
        source: Option<String>,
        category: Option<String>,
        term_search: Option<String>,
        sort_by: &str,
        descending: bool,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<OntologyProposal>, i64)> {
        let drop_all = |v: Option<String>| v.filter(|s| s != "all");

        let filter = ProposalFilter {
            status: drop_all(status),
            proposal_type: drop_all(proposal_type),
            source: drop_all(source),
            category,
            term_search,
        };

        let offset = (page.max(1) - 1) * page_size;
        self.proposals
            .list_paginated(&filter, sort_by, descending, offset, page_size)
            .await
    }

    /// Aggregate statistics
    pub async fn get_stats(&self) -> Result<ProposalStats> {
        self.proposals.stats().await
    }

    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Create a proposal on behalf of an administrator
    pub async fn create_proposal(
        &self,
        term: &str,
        category: &str,
        proposal_type: &str,
        suggested_parent: Option<String>,
        suggested_canonical: Option<String>,
        relation_type: Option<String>,
        note: Option<String>,
    ) -> Result<OntologyProposal> {
        let proposal_type = ProposalType::parse_loose(proposal_type).ok_or_else(|| {
            OntologyError::validation(
                format!("Unknown proposal type '{proposal_type}'"),
                "proposal_type",
            )
        })?;

        let mut proposal = OntologyProposal::new(
            proposal_type,
            term,
            category,
            note.unwrap_or_else(|| {
                format!("Manual proposal: {} for '{term}'", proposal_type.as_str())
            }),
        );
        proposal.suggested_parent = suggested_parent;
        proposal.suggested_canonical = suggested_canonical;
        proposal.suggested_relation_type = relation_type;
        proposal.confidence = 1.0;
        proposal.source = ProposalSource::Admin;

        self.proposals.create(&proposal).await
    }

    /// Optimistic-locked update of whitelisted fields; nulls are dropped
    pub async fn update_proposal(
        &self,
        proposal_id: &str,
        expected_version: i64,
        updates: Map<String, Value>,
    ) -> Result<OntologyProposal> {
        let current_version = self
            .proposals
            .current_version(proposal_id)
            .await?
            .ok_or_else(|| OntologyError::ProposalNotFound(proposal_id.to_string()))?;

        if current_version != expected_version {
            return Err(OntologyError::Conflict {
                expected: expected_version,
                current: current_version,
            });
        }

        let filtered: Map<String, Value> = updates
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();

        self.proposals
            .update_with_version(proposal_id, expected_version, &filtered)
            .await?
            .ok_or(OntologyError::Conflict {
                expected: expected_version,
                current: -1,
            })
    }

    // ------------------------------------------------------------------
    // Approve / reject
    // ------------------------------------------------------------------

    /// Approve a pending proposal, apply it, refresh the registry
    ///
    /// Application failure leaves the proposal approved but unapplied
    /// (`applied_at` null); an administrator can retry via
    /// [`apply_proposal`](Self::apply_proposal).
    pub async fn approve_proposal(
        &self,
        proposal_id: &str,
        expected_version: i64,
        reviewer: Option<&str>,
        canonical: Option<String>,
        parent: Option<String>,
        note: Option<String>,
    ) -> Result<OntologyProposal> {
        let proposal = self.get_proposal(proposal_id).await?;
        self.ensure_pending(&proposal)?;
        self.ensure_version(&proposal, expected_version)?;

        let mut updates = Map::new();
        updates.insert("status".to_string(), json!(ProposalStatus::Approved.as_str()));
        updates.insert("reviewed_at".to_string(), json!(Utc::now().to_rfc3339()));
        updates.insert(
            "reviewed_by".to_string(),
            json!(reviewer.unwrap_or("admin")),
        );
        if let Some(canonical) = canonical {
            updates.insert("suggested_canonical".to_string(), json!(canonical));
        }
        if let Some(parent) = parent {
            updates.insert("suggested_parent".to_string(), json!(parent));
        }
        if let Some(note) = note {
            let action = format!("{}\n[Approved] {note}", proposal.suggested_action)
                .trim()
                .to_string();
            updates.insert("suggested_action".to_string(), json!(action));
        }

        let mut approved = self
            .proposals
            .update_with_version(proposal_id, expected_version, &updates)
            .await?
            .ok_or(OntologyError::Conflict {
                expected: expected_version,
                current: -1,
            })?;

        tracing::info!(proposal_id = %proposal_id, reviewer = reviewer.unwrap_or("admin"), "Proposal approved");

        // Application failure must not undo the approval.
        match self.apply_proposal(&approved).await {
            Ok(true) => {
                self.proposals.set_applied_at(proposal_id).await?;
                approved.applied_at = Some(Utc::now());
                tracing::info!(proposal_id = %proposal_id, "Proposal applied to ontology");
                self.refresh_registry("approve").await;
            }
            Ok(false) => {
                tracing::warn!(proposal_id = %proposal_id, "Proposal approved but not applied");
            }
            Err(e) => {
                tracing::error!(proposal_id = %proposal_id, error = %e, "Failed to apply proposal");
            }
        }

        Ok(approved)
    }

    /// Reject a pending proposal
    pub async fn reject_proposal(
        &self,
        proposal_id: &str,
        expected_version: i64,
        reviewer: Option<&str>,
        reason: &str,
    ) -> Result<OntologyProposal> {
        let proposal = self.get_proposal(proposal_id).await?;
        self.ensure_pending(&proposal)?;
        self.ensure_version(&proposal, expected_version)?;

        let mut updates = Map::new();
        updates.insert("status".to_string(), json!(ProposalStatus::Rejected.as_str()));
        updates.insert("reviewed_at".to_string(), json!(Utc::now().to_rfc3339()));
        updates.insert(
            "reviewed_by".to_string(),
            json!(reviewer.unwrap_or("admin")),
        );
        updates.insert("rejection_reason".to_string(), json!(reason));

        let rejected = self
            .proposals
            .update_with_version(proposal_id, expected_version, &updates)
            .await?
            .ok_or(OntologyError::Conflict {
                expected: expected_version,
                current: -1,
            })?;

        tracing::info!(proposal_id = %proposal_id, reason = %reason, "Proposal rejected");
        Ok(rejected)
    }

    /// Batch approve (no optimistic locking); refreshes the registry once
    pub async fn batch_approve(
        &self,
        proposal_ids: &[String],
        reviewer: Option<&str>,
    ) -> Result<BatchResult> {
        let (success_count, failed_ids) = self
            .proposals
            .batch_update_status(
                proposal_ids,
                ProposalStatus::Approved,
                reviewer.unwrap_or("admin"),
                None,
            )
            .await?;

        tracing::info!(success_count, failed = failed_ids.len(), "Batch approve complete");

        if success_count > 0 {
            self.refresh_registry("batch-approve").await;
        }

        Ok(batch_result(success_count, failed_ids))
    }

    /// Batch reject (no optimistic locking)
    pub async fn batch_reject(
        &self,
        proposal_ids: &[String],
        reviewer: Option<&str>,
        reason: &str,
    ) -> Result<BatchResult> {
        let (success_count, failed_ids) = self
            .proposals
            .batch_update_status(
                proposal_ids,
                ProposalStatus::Rejected,
                reviewer.unwrap_or("admin"),
                Some(reason),
            )
            .await?;

        tracing::info!(success_count, failed = failed_ids.len(), "Batch reject complete");
        Ok(batch_result(success_count, failed_ids))
    }

    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    /// Write an approved proposal into the concept graph
    ///
    /// # Errors
    ///
    /// [`OntologyError::InvalidState`] unless the proposal is approved or
    /// auto-approved; [`OntologyError::Validation`] when type-specific
    /// target information is missing (e.g. a NEW_SYNONYM without a
    /// canonical).
    pub async fn apply_proposal(&self, proposal: &OntologyProposal) -> Result<bool> {
        if !matches!(
            proposal.status,
            ProposalStatus::Approved | ProposalStatus::AutoApproved
        ) {
            return Err(OntologyError::invalid_state(
                format!(
                    "Only approved proposals can be applied (current: {})",
                    proposal.status.as_str()
                ),
                proposal.status.as_str(),
            ));
        }

        match proposal.proposal_type {
            ProposalType::NewConcept => self.apply_new_concept(proposal).await,
            ProposalType::NewSynonym => self.apply_new_synonym(proposal).await,
            ProposalType::NewRelation => self.apply_new_relation(proposal).await,
        }
    }

    async fn apply_new_concept(&self, proposal: &OntologyProposal) -> Result<bool> {
        self.concepts
            .create_or_get(
                &proposal.term,
                &proposal.category,
                true,
                &proposal.suggested_action,
                &format!("proposal:{}", proposal.id),
            )
            .await?;

        if let Some(parent) = &proposal.suggested_parent {
            if !self.concepts.exists(parent).await? {
                self.concepts
                    .create_or_get(
                        parent,
                        &proposal.category,
                        true,
                        &format!("Auto-created parent for '{}'", proposal.term),
                        &format!("auto_parent_of:{}", proposal.id),
                    )
                    .await?;
            }

            if !self
                .concepts
                .create_is_a(&proposal.term, parent, &proposal.id)
                .await?
            {
                tracing::warn!(
                    term = %proposal.term,
                    parent = %parent,
                    "Failed to create IS_A relation"
                );
                return Ok(false);
            }
        }

        tracing::info!(term = %proposal.term, "Applied NEW_CONCEPT");
        Ok(true)
    }

    async fn apply_new_synonym(&self, proposal: &OntologyProposal) -> Result<bool> {
        let canonical = proposal.suggested_canonical.as_ref().ok_or_else(|| {
            OntologyError::validation(
                "NEW_SYNONYM proposal requires suggested_canonical",
                "suggested_canonical",
            )
        })?;

        if !self.concepts.exists(canonical).await? {
            self.concepts
                .create_or_get(
                    canonical,
                    &proposal.category,
                    true,
                    &format!("Auto-created canonical for '{}'", proposal.term),
                    &format!("auto_canonical_for:{}", proposal.id),
                )
                .await?;
        }

        self.concepts
            .create_or_get(
                &proposal.term,
                &proposal.category,
                false,
                &format!("Alias for {canonical}"),
                &format!("proposal:{}", proposal.id),
            )
            .await?;

        if !self
            .concepts
            .create_same_as(&proposal.term, canonical, &proposal.id)
            .await?
        {
            tracing::warn!(
                alias = %proposal.term,
                canonical = %canonical,
                "Failed to create SAME_AS relation"
            );
            return Ok(false);
        }

        tracing::info!(alias = %proposal.term, canonical = %canonical, "Applied NEW_SYNONYM");
        Ok(true)
    }

    async fn apply_new_relation(&self, proposal: &OntologyProposal) -> Result<bool> {
        let relation_type = proposal
            .suggested_relation_type
            .as_deref()
            .unwrap_or("IS_A");

        // SAME_AS targets the canonical; everything else targets the parent.
        let target = proposal
            .suggested_parent
            .as_ref()
            .or(proposal.suggested_canonical.as_ref())
            .ok_or_else(|| {
                OntologyError::validation(
                    "NEW_RELATION proposal requires suggested_parent or suggested_canonical",
                    "suggested_parent",
                )
            })?;

        for (name, role) in [(&proposal.term, "source"), (target, "target")] {
            if !self.concepts.exists(name).await? {
                self.concepts
                    .create_or_get(
                        name,
                        &proposal.category,
                        true,
                        &format!("Auto-created as {relation_type} {role}"),
                        &format!("auto_{role}_for:{}", proposal.id),
                    )
                    .await?;
            }
        }

        let created = match relation_type {
            "IS_A" => {
                self.concepts
                    .create_is_a(&proposal.term, target, &proposal.id)
                    .await?
            }
            "SAME_AS" => {
                self.concepts
                    .create_same_as(&proposal.term, target, &proposal.id)
                    .await?
            }
            "REQUIRES" => {
                self.concepts
                    .create_requires(&proposal.term, target, &proposal.id)
                    .await?
            }
            "PART_OF" => {
                self.concepts
                    .create_part_of(&proposal.term, target, &proposal.id)
                    .await?
            }
            other => {
                tracing::warn!(relation_type = %other, "Unknown relation type");
                return Ok(false);
            }
        };

        if created {
            tracing::info!(
                term = %proposal.term,
                relation_type,
                target = %target,
                "Applied NEW_RELATION"
            );
        }
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn ensure_pending(&self, proposal: &OntologyProposal) -> Result<()> {
        if proposal.status != ProposalStatus::Pending {
            return Err(OntologyError::invalid_state(
                format!(
                    "Cannot review proposal with status '{}'",
                    proposal.status.as_str()
                ),
                proposal.status.as_str(),
            ));
        }
        Ok(())
    }

    fn ensure_version(&self, proposal: &OntologyProposal, expected: i64) -> Result<()> {
        if proposal.version != expected {
            return Err(OntologyError::Conflict {
                expected,
                current: proposal.version,
            });
        }
        Ok(())
    }

    /// Refresh the registry, logging failures rather than surfacing them
    pub async fn refresh_registry(&self, reason: &str) {
        if let Some(registry) = &self.registry {
            if !registry.refresh().await {
                tracing::error!(reason, "Ontology registry refresh failed");
            }
        }
    }
}

fn batch_result(success_count: usize, failed_ids: Vec<String>) -> BatchResult {
    let errors = failed_ids
        .iter()
        .map(|id| (id.clone(), "Not in pending state or not found".to_string()))
        .collect();
    BatchResult {
        success_count,
        failed_count: failed_ids.len(),
        failed_ids,
        errors,
    }
}
