//! Intent and entity vocabularies

use serde::{Deserialize, Serialize};

/// The closed intent vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Find people by skill, role or experience
    PersonnelSearch,
    /// Match people to a project's requirements
    ProjectMatching,
    /// Explore relationships between entities
    RelationshipSearch,
    /// Analyse an organisational unit
    OrgAnalysis,
    /// Mentoring relationships and chains
    MentoringNetwork,
    /// Search by certificate or qualification
    CertificateSearch,
    /// Path-based traversal questions
    PathAnalysis,
    /// User-driven ontology change request
    OntologyUpdate,
    /// Organisation-wide macro analysis
    GlobalAnalysis,
    /// Could not be classified
    Unknown,
}

impl Intent {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonnelSearch => "personnel_search",
            Self::ProjectMatching => "project_matching",
            Self::RelationshipSearch => "relationship_search",
            Self::OrgAnalysis => "org_analysis",
            Self::MentoringNetwork => "mentoring_network",
            Self::CertificateSearch => "certificate_search",
            Self::PathAnalysis => "path_analysis",
            Self::OntologyUpdate => "ontology_update",
            Self::GlobalAnalysis => "global_analysis",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a classifier-reported intent; anything unrecognised is
    /// [`Intent::Unknown`]
    pub fn parse(text: &str) -> Self {
        match text {
            "personnel_search" => Self::PersonnelSearch,
            "project_matching" => Self::ProjectMatching,
            "relationship_search" => Self::RelationshipSearch,
            "org_analysis" => Self::OrgAnalysis,
            "mentoring_network" => Self::MentoringNetwork,
            "certificate_search" => Self::CertificateSearch,
            "path_analysis" => Self::PathAnalysis,
            "ontology_update" => Self::OntologyUpdate,
            "global_analysis" => Self::GlobalAnalysis,
            _ => Self::Unknown,
        }
    }

    /// Aggregate/statistical intents proceed with partial resolution
    /// instead of asking for clarification
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::GlobalAnalysis
                | Self::OrgAnalysis
                | Self::MentoringNetwork
                | Self::CertificateSearch
        )
    }

    /// Intents whose questions routinely need more than one hop
    pub fn is_multi_hop(&self) -> bool {
        matches!(
            self,
            Self::PathAnalysis | Self::RelationshipSearch | Self::MentoringNetwork
        )
    }

    /// Intents eligible for the light Cypher model tier
    pub fn is_simple_generation(&self) -> bool {
        matches!(
            self,
            Self::PersonnelSearch
                | Self::CertificateSearch
                | Self::OrgAnalysis
                | Self::ProjectMatching
        )
    }
}

/// Intents offered to the classifier (everything except `unknown`)
pub const AVAILABLE_INTENTS: [&str; 9] = [
    "personnel_search",
    "project_matching",
    "relationship_search",
    "org_analysis",
    "mentoring_network",
    "certificate_search",
    "path_analysis",
    "ontology_update",
    "global_analysis",
];

/// Entity types offered to the extractor (aligned with node labels)
pub const DEFAULT_ENTITY_TYPES: [&str; 8] = [
    "Person",
    "Organization",
    "Department",
    "Position",
    "Project",
    "Skill",
    "Location",
    "Date",
];

/// Entity type → ontology category for concept expansion
///
/// Unmapped entity types pass through expansion untouched.
pub fn ontology_category(entity_type: &str) -> Option<&'static str> {
    match entity_type {
        "Skill" => Some("skills"),
        "Position" => Some("positions"),
        "Department" => Some("departments"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for name in AVAILABLE_INTENTS {
            assert_eq!(Intent::parse(name).as_str(), name);
        }
        assert_eq!(Intent::parse("nonsense"), Intent::Unknown);
    }

    #[test]
    fn test_aggregate_set() {
        assert!(Intent::GlobalAnalysis.is_aggregate());
        assert!(Intent::OrgAnalysis.is_aggregate());
        assert!(Intent::MentoringNetwork.is_aggregate());
        assert!(Intent::CertificateSearch.is_aggregate());
        assert!(!Intent::PersonnelSearch.is_aggregate());
        assert!(!Intent::PathAnalysis.is_aggregate());
    }

    #[test]
    fn test_multi_hop_set() {
        assert!(Intent::PathAnalysis.is_multi_hop());
        assert!(Intent::RelationshipSearch.is_multi_hop());
        assert!(Intent::MentoringNetwork.is_multi_hop());
        assert!(!Intent::OrgAnalysis.is_multi_hop());
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(ontology_category("Skill"), Some("skills"));
        assert_eq!(ontology_category("Position"), Some("positions"));
        assert_eq!(ontology_category("Department"), Some("departments"));
        assert_eq!(ontology_category("Person"), None);
    }
}
