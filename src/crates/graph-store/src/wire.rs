//! Result serialisation to the wire format
//!
//! Rows come back as JSON objects keyed by the query's RETURN aliases.
//! Queries that return structural values project them explicitly into the
//! wire shapes the rest of the system consumes:
//!
//! - node: `{id, elementId, labels, properties}`
//! - relationship: `{id, type, startNodeId, endNodeId, properties}`
//! - path: `{nodes, relationships}`
//!
//! (see the projections in [`crate::repository`]). Scalars pass through,
//! temporal values serialise as ISO-8601 strings, lists and maps recurse.

use crate::error::{GraphStoreError, Result};
use serde_json::Value;

/// Decode one driver row into a JSON object keyed by column alias
pub fn row_to_wire(row: &neo4rs::Row) -> Result<Value> {
    row.to::<Value>()
        .map_err(|e| GraphStoreError::QueryExecution(format!("row decode: {e}")))
}

/// Assemble the node wire shape from projected parts
///
/// Used by callers that fetch `elementId(n)`, `labels(n)` and
/// `properties(n)` separately and need the canonical object.
pub fn node_wire(id: &str, labels: Vec<String>, properties: Value) -> Value {
    serde_json::json!({
        "id": id,
        "elementId": id,
        "labels": labels,
        "properties": properties,
    })
}

/// Assemble the relationship wire shape from projected parts
pub fn relationship_wire(
    id: &str,
    rel_type: &str,
    start_node_id: &str,
    end_node_id: &str,
    properties: Value,
) -> Value {
    serde_json::json!({
        "id": id,
        "type": rel_type,
        "startNodeId": start_node_id,
        "endNodeId": end_node_id,
        "properties": properties,
    })
}

/// Assemble the path wire shape from its nodes and relationships
pub fn path_wire(nodes: Vec<Value>, relationships: Vec<Value>) -> Value {
    serde_json::json!({
        "nodes": nodes,
        "relationships": relationships,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_wire_shape() {
        let node = node_wire(
            "4:abc:42",
            vec!["Person".to_string()],
            json!({"name": "홍길동"}),
        );
        assert_eq!(node["id"], "4:abc:42");
        assert_eq!(node["elementId"], "4:abc:42");
        assert_eq!(node["labels"][0], "Person");
        assert_eq!(node["properties"]["name"], "홍길동");
    }

    #[test]
    fn test_relationship_wire_shape() {
        let rel = relationship_wire("7", "HAS_SKILL", "42", "43", json!({}));
        assert_eq!(rel["type"], "HAS_SKILL");
        assert_eq!(rel["startNodeId"], "42");
        assert_eq!(rel["endNodeId"], "43");
    }

    #[test]
    fn test_path_wire_nests_both_lists() {
        let path = path_wire(
            vec![node_wire("1", vec![], json!({})), node_wire("2", vec![], json!({}))],
            vec![relationship_wire("9", "MENTORS", "1", "2", json!({}))],
        );
        assert_eq!(path["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(path["relationships"][0]["type"], "MENTORS");
    }
}
