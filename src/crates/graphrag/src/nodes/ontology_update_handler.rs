//! Chat-initiated ontology update node

use crate::nodes::PipelineNode;
use crate::state::{ChatMessage, PipelineState};
use async_trait::async_trait;
use llm::{LlmGateway, UpdateParse};
use ontology::{OntologyProposal, OntologyService, ProposalSource, ProposalType};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Requests below this confidence are bounced back to the user
const MIN_PARSE_CONFIDENCE: f64 = 0.7;

/// Partial update emitted by [`OntologyUpdateHandlerNode`]
#[derive(Debug, Serialize)]
pub struct OntologyUpdateHandlerUpdate {
    /// Confirmation or error message shown to the user
    pub response: String,
    /// Assistant turn appended to the history
    pub messages: Vec<ChatMessage>,
    /// Path label
    pub execution_path: Vec<String>,
    /// Error annotation on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handles "add X as a skill"-style requests from chat
///
/// The foreground path of the adaptive loop: parse the request with the
/// light model, build a proposal, persist it, **immediately approve** it
/// on behalf of the synthetic `chat_user` reviewer (which applies it and
/// refreshes the registry), and confirm to the user.
pub struct OntologyUpdateHandlerNode {
    gateway: LlmGateway,
    service: Arc<OntologyService>,
}

impl OntologyUpdateHandlerNode {
    /// Create the node
    pub fn new(gateway: LlmGateway, service: Arc<OntologyService>) -> Self {
        Self { gateway, service }
    }

    fn reply(&self, response: String, suffix: &str, error: Option<String>) -> Value {
        serde_json::to_value(OntologyUpdateHandlerUpdate {
            messages: vec![ChatMessage::assistant(&response)],
            response,
            execution_path: vec![format!("{}{suffix}", self.name())],
            error,
        })
        .unwrap_or_else(|_| json!({}))
    }

    /// Singular category names normalise to the plural buckets
    fn normalise_category(raw: &str) -> String {
        match raw.to_lowercase().as_str() {
            "skill" => "skills".to_string(),
            "person" => "persons".to_string(),
            "department" => "departments".to_string(),
            "project" => "projects".to_string(),
            "certificate" => "certificates".to_string(),
            "position" => "positions".to_string(),
            other if !other.is_empty() => other.to_string(),
            _ => "skills".to_string(),
        }
    }

    fn build_proposal(parsed: &UpdateParse, question: &str) -> OntologyProposal {
        let action = parsed.action.to_lowercase();
        let category = Self::normalise_category(&parsed.category);

        let (proposal_type, canonical, parent, relation_type) = match action.as_str() {
            "add_synonym" => (
                ProposalType::NewSynonym,
                parsed.target.clone(),
                None,
                Some("SAME_AS".to_string()),
            ),
            "add_relation" => {
                let relation = parsed
                    .relation_type
                    .clone()
                    .unwrap_or_else(|| "IS_A".to_string())
                    .to_uppercase();
                if relation == "SAME_AS" {
                    (
                        ProposalType::NewRelation,
                        parsed.target.clone(),
                        None,
                        Some(relation),
                    )
                } else {
                    (
                        ProposalType::NewRelation,
                        None,
                        parsed.target.clone(),
                        Some(relation),
                    )
                }
            }
            _ => {
                // add_concept: the target, when given, acts as the parent.
                let parent = parsed.target.clone();
                let relation = parent.as_ref().map(|_| "IS_A".to_string());
                (ProposalType::NewConcept, None, parent, relation)
            }
        };

        let mut proposal = OntologyProposal::new(
            proposal_type,
            parsed.term.trim(),
            category,
            if parsed.reasoning.is_empty() {
                "User-driven update".to_string()
            } else {
                parsed.reasoning.clone()
            },
        );
        proposal.suggested_canonical = canonical;
        proposal.suggested_parent = parent;
        proposal.suggested_relation_type = relation_type;
        proposal.confidence = parsed.confidence;
        proposal.source = ProposalSource::Chat;
        proposal.evidence_questions = vec![question.to_string()];
        proposal
    }

    fn confirmation(parsed: &UpdateParse, proposal: &OntologyProposal, applied: bool) -> String {
        let term = &proposal.term;

        if !applied {
            return format!(
                "'{term}'에 대한 온톨로지 제안이 생성되었습니다. 관리자 승인 후 적용됩니다."
            );
        }

        match parsed.action.to_lowercase().as_str() {
            "add_synonym" => {
                let canonical = proposal.suggested_canonical.as_deref().unwrap_or("?");
                format!("'{term}'을(를) '{canonical}'의 동의어로 등록했습니다.")
            }
            "add_relation" => {
                let target = proposal
                    .suggested_parent
                    .as_deref()
                    .or(proposal.suggested_canonical.as_deref())
                    .unwrap_or("?");
                let relation = proposal.suggested_relation_type.as_deref().unwrap_or("관계");
                format!("'{term}'과(와) '{target}' 사이에 {relation} 관계를 추가했습니다.")
            }
            _ => match &proposal.suggested_parent {
                Some(parent) => format!(
                    "'{term}'을(를) {}에 추가했습니다 (상위: {parent}).",
                    proposal.category
                ),
                None => format!("'{term}'을(를) {}에 추가했습니다.", proposal.category),
            },
        }
    }
}

#[async_trait]
impl PipelineNode for OntologyUpdateHandlerNode {
    fn name(&self) -> &'static str {
        "ontology_update_handler"
    }

    fn input_keys(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn process(&self, state: &PipelineState) -> Value {
        tracing::info!(
            question = %state.question.chars().take(50).collect::<String>(),
            "Processing ontology update request"
        );

        let parsed = match self.gateway.parse_ontology_update(&state.question).await {
            Ok(parsed) if !parsed.action.is_empty() && !parsed.term.trim().is_empty() => parsed,
            Ok(_) | Err(_) => {
                return self.reply(
                    "온톨로지 업데이트 요청을 이해하지 못했습니다. \
                     예시: 'LangGraph를 스킬로 추가해줘'"
                        .to_string(),
                    "_parse_failed",
                    None,
                );
            }
        };

        if parsed.confidence < MIN_PARSE_CONFIDENCE {
            return self.reply(
                format!(
                    "요청이 불명확합니다. '{}'에 대해 더 명확하게 설명해주세요.",
                    parsed.term
                ),
                "_low_confidence",
                None,
            );
        }

        let proposal = Self::build_proposal(&parsed, &state.question);
        let saved = match self.service.proposals().create(&proposal).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create proposal");
                return self.reply(
                    "온톨로지 제안 생성 중 오류가 발생했습니다.".to_string(),
                    "_proposal_error",
                    Some(e.to_string()),
                );
            }
        };

        // Immediate approval on behalf of the chat user; application and
        // registry refresh happen inside the service.
        let approved = match self
            .service
            .approve_proposal(&saved.id, saved.version, Some("chat_user"), None, None, None)
            .await
        {
            Ok(approved) => approved,
            Err(e) => {
                tracing::error!(error = %e, "Failed to approve proposal");
                let message = format!(
                    "'{}' 제안이 생성되었지만 자동 적용에 실패했습니다.",
                    saved.term
                );
                return self.reply(message, "_approve_error", Some(e.to_string()));
            }
        };

        let applied = approved.applied_at.is_some();
        let response = Self::confirmation(&parsed, &approved, applied);

        tracing::info!(
            action = %parsed.action,
            term = %approved.term,
            applied,
            "Ontology update completed"
        );

        self.reply(response, "", None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(action: &str, term: &str, target: Option<&str>) -> UpdateParse {
        UpdateParse {
            action: action.to_string(),
            term: term.to_string(),
            category: "Skill".to_string(),
            target: target.map(str::to_string),
            relation_type: None,
            confidence: 0.9,
            reasoning: "user asked".to_string(),
        }
    }

    #[test]
    fn test_add_concept_builds_new_concept_proposal() {
        let proposal =
            OntologyUpdateHandlerNode::build_proposal(&parsed("add_concept", "LangGraph", None), "q");
        assert_eq!(proposal.proposal_type, ProposalType::NewConcept);
        assert_eq!(proposal.category, "skills");
        assert_eq!(proposal.source, ProposalSource::Chat);
        assert!(proposal.suggested_parent.is_none());
    }

    #[test]
    fn test_add_synonym_requires_canonical_target() {
        let proposal = OntologyUpdateHandlerNode::build_proposal(
            &parsed("add_synonym", "랭그래프", Some("LangGraph")),
            "q",
        );
        assert_eq!(proposal.proposal_type, ProposalType::NewSynonym);
        assert_eq!(proposal.suggested_canonical.as_deref(), Some("LangGraph"));
        assert_eq!(proposal.suggested_relation_type.as_deref(), Some("SAME_AS"));
    }

    #[test]
    fn test_add_relation_routes_target_by_relation_type() {
        let mut request = parsed("add_relation", "FastAPI", Some("Web Framework"));
        request.relation_type = Some("is_a".to_string());

        let proposal = OntologyUpdateHandlerNode::build_proposal(&request, "q");
        assert_eq!(proposal.proposal_type, ProposalType::NewRelation);
        assert_eq!(proposal.suggested_parent.as_deref(), Some("Web Framework"));
        assert_eq!(proposal.suggested_relation_type.as_deref(), Some("IS_A"));
    }

    #[test]
    fn test_confirmation_matches_expected_wording() {
        let request = parsed("add_concept", "LangGraph", None);
        let proposal = OntologyUpdateHandlerNode::build_proposal(&request, "q");

        let message = OntologyUpdateHandlerNode::confirmation(&request, &proposal, true);
        assert_eq!(message, "'LangGraph'을(를) skills에 추가했습니다.");

        let unapplied = OntologyUpdateHandlerNode::confirmation(&request, &proposal, false);
        assert!(unapplied.contains("관리자 승인 후 적용됩니다"));
    }

    #[test]
    fn test_category_normalisation() {
        assert_eq!(OntologyUpdateHandlerNode::normalise_category("Skill"), "skills");
        assert_eq!(
            OntologyUpdateHandlerNode::normalise_category("department"),
            "departments"
        );
        assert_eq!(OntologyUpdateHandlerNode::normalise_category(""), "skills");
        assert_eq!(OntologyUpdateHandlerNode::normalise_category("skills"), "skills");
    }
}
