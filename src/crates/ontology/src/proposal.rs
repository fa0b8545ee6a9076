//! Proposal model
//!
//! An [`OntologyProposal`] records one suggested change to the concept
//! catalogue, where it came from, the questions it was observed in, and
//! its review lifecycle: `pending → approved | auto_approved | rejected`,
//! with `applied_at` stamped only after the change actually landed in the
//! graph. `version` is the optimistic lock - every mutation bumps it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of change a proposal describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalType {
    /// Add a new canonical concept (optionally under a parent)
    #[serde(rename = "NEW_CONCEPT")]
    NewConcept,
    /// Register an alias for an existing canonical concept
    #[serde(rename = "NEW_SYNONYM")]
    NewSynonym,
    /// Add a relationship between two concepts
    #[serde(rename = "NEW_RELATION")]
    NewRelation,
}

impl ProposalType {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewConcept => "NEW_CONCEPT",
            Self::NewSynonym => "NEW_SYNONYM",
            Self::NewRelation => "NEW_RELATION",
        }
    }

    /// Parse a model-reported type string, tolerating loose spellings
    ///
    /// Accepts `NEW_CONCEPT`, `new concept`, bare `SYNONYM`, and similar.
    pub fn parse_loose(text: &str) -> Option<Self> {
        let normalized = text.trim().to_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "NEW_CONCEPT" | "CONCEPT" => Some(Self::NewConcept),
            "NEW_SYNONYM" | "SYNONYM" => Some(Self::NewSynonym),
            "NEW_RELATION" | "RELATION" => Some(Self::NewRelation),
            _ => None,
        }
    }
}

/// Review state of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Awaiting review
    Pending,
    /// Approved by a reviewer
    Approved,
    /// Rejected by a reviewer
    Rejected,
    /// Approved automatically under the configured thresholds
    AutoApproved,
}

impl ProposalStatus {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AutoApproved => "auto_approved",
        }
    }
}

/// Where a proposal originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSource {
    /// A user asked for the change in chat
    Chat,
    /// The background learner observed an unresolved term
    #[default]
    Background,
    /// Created directly through the admin surface
    Admin,
}

impl ProposalSource {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Background => "background",
            Self::Admin => "admin",
        }
    }
}

/// A stored ontology change proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyProposal {
    /// Primary key
    pub id: String,
    /// Optimistic-lock version, bumped on every mutation
    pub version: i64,
    /// Kind of change
    pub proposal_type: ProposalType,
    /// The unresolved surface form
    pub term: String,
    /// Category bucket ("skills", "positions", ...)
    pub category: String,
    /// Action description from the analyser or reviewer
    pub suggested_action: String,
    /// Parent concept (NEW_CONCEPT, IS_A relations)
    pub suggested_parent: Option<String>,
    /// Canonical form (NEW_SYNONYM, SAME_AS relations)
    pub suggested_canonical: Option<String>,
    /// Relation type for NEW_RELATION (IS_A, SAME_AS, REQUIRES, PART_OF)
    pub suggested_relation_type: Option<String>,
    /// Questions the term appeared in
    pub evidence_questions: Vec<String>,
    /// Occurrence count
    pub frequency: i64,
    /// Analyser-reported certainty in [0, 1]
    pub confidence: f64,
    /// Review state
    pub status: ProposalStatus,
    /// Origin
    pub source: ProposalSource,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Review completion time (set iff status != pending)
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer id
    pub reviewed_by: Option<String>,
    /// Reason recorded on rejection
    pub rejection_reason: Option<String>,
    /// Set only after a successful ontology write
    pub applied_at: Option<DateTime<Utc>>,
}

impl OntologyProposal {
    /// Create a fresh pending proposal
    pub fn new(
        proposal_type: ProposalType,
        term: impl Into<String>,
        category: impl Into<String>,
        suggested_action: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            version: 1,
            proposal_type,
            term: term.into(),
            category: category.into(),
            suggested_action: suggested_action.into(),
            suggested_parent: None,
            suggested_canonical: None,
            suggested_relation_type: None,
            evidence_questions: Vec::new(),
            frequency: 1,
            confidence: 0.0,
            status: ProposalStatus::Pending,
            source: ProposalSource::Background,
            created_at: now,
            updated_at: now,
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
            applied_at: None,
        }
    }

    /// Record an evidence question and bump the frequency
    pub fn add_evidence(&mut self, question: impl Into<String>) {
        let question = question.into();
        if !question.is_empty() && !self.evidence_questions.contains(&question) {
            self.evidence_questions.push(question);
        }
        self.frequency += 1;
        self.updated_at = Utc::now();
    }

    /// Mark the proposal approved
    pub fn approve(&mut self, reviewer: Option<&str>, auto: bool) {
        self.status = if auto {
            ProposalStatus::AutoApproved
        } else {
            ProposalStatus::Approved
        };
        self.reviewed_at = Some(Utc::now());
        self.reviewed_by = reviewer
            .map(str::to_string)
            .or_else(|| auto.then(|| "system".to_string()));
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Mark the proposal rejected
    pub fn reject(&mut self, reviewer: &str, reason: Option<&str>) {
        self.status = ProposalStatus::Rejected;
        self.reviewed_at = Some(Utc::now());
        self.reviewed_by = Some(reviewer.to_string());
        self.rejection_reason = reason.map(str::to_string);
        self.updated_at = Utc::now();
        self.version += 1;
    }

    /// Whether the proposal currently meets the auto-approval conditions
    ///
    /// The daily cap is *not* checked here; that check is atomic with the
    /// status update in the repository.
    pub fn can_auto_approve(
        &self,
        min_confidence: f64,
        min_frequency: i64,
        allowed_types: &[ProposalType],
    ) -> bool {
        self.status == ProposalStatus::Pending
            && allowed_types.contains(&self.proposal_type)
            && self.confidence >= min_confidence
            && self.frequency >= min_frequency
    }
}

/// Parse a stored datetime value tolerantly
///
/// Accepts RFC 3339 strings (with or without a trailing `Z`); anything
/// else yields `None`.
pub(crate) fn parse_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            // Second chance for values missing an offset entirely.
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
