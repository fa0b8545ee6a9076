//! Access-control context
//!
//! When a [`UserContext`] rides along in the pipeline state, the Cypher
//! generator narrows the schema shown to the model to the labels the
//! context permits and injects a department scope predicate into the
//! generated query. Absent a context, the full schema is visible.

use graph_store::GraphSchema;
use serde::{Deserialize, Serialize};

/// Caller identity and scope for access policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    /// Caller id
    pub user_id: String,
    /// Assigned roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Department the caller may see; `None` means unscoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_scope: Option<String>,
    /// Labels the caller may query; empty means all
    #[serde(default)]
    pub allowed_labels: Vec<String>,
}

impl UserContext {
    /// Whether the context permits querying a label
    pub fn allows_label(&self, label: &str) -> bool {
        self.allowed_labels.is_empty()
            || self.allowed_labels.iter().any(|l| l == label)
    }

    /// Restrict a schema snapshot to what this context permits
    ///
    /// Relationship types survive only while both implied endpoints could
    /// still exist; with label-level granularity the conservative choice
    /// is to keep them all unless labels were restricted.
    pub fn filter_schema(&self, schema: &GraphSchema) -> GraphSchema {
        if self.allowed_labels.is_empty() {
            return schema.clone();
        }

        let mut filtered = schema.clone();
        filtered.labels.retain(|label| self.allows_label(label));
        filtered
            .node_properties
            .retain(|label, _| self.allows_label(label));
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> GraphSchema {
        let mut schema = GraphSchema {
            labels: vec!["Person".into(), "Salary".into(), "Skill".into()],
            relationship_types: vec!["HAS_SKILL".into()],
            ..Default::default()
        };
        schema
            .node_properties
            .insert("Salary".into(), vec!["amount".into()]);
        schema
            .node_properties
            .insert("Person".into(), vec!["name".into()]);
        schema
    }

    #[test]
    fn test_empty_allowlist_permits_everything() {
        let context = UserContext::default();
        assert!(context.allows_label("Salary"));
        assert_eq!(context.filter_schema(&schema()).labels.len(), 3);
    }

    #[test]
    fn test_restricted_context_filters_labels_and_properties() {
        let context = UserContext {
            user_id: "u1".into(),
            allowed_labels: vec!["Person".into(), "Skill".into()],
            ..Default::default()
        };

        let filtered = context.filter_schema(&schema());
        assert_eq!(filtered.labels, vec!["Person", "Skill"]);
        assert!(!filtered.node_properties.contains_key("Salary"));
        assert!(filtered.node_properties.contains_key("Person"));
    }
}
