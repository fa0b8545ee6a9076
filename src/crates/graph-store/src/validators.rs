//! Cypher identifier validation and safe filter builders
//!
//! Labels, relationship types and property names cannot be parameterised in
//! Cypher, so any value interpolated into query text must pass through
//! [`validate_identifier`] first. The accepted alphabet is ASCII
//! alphanumerics, underscore and Unicode letters (Korean labels are legal);
//! anything else is a hard [`GraphStoreError::Validation`] before query
//! assembly.

use crate::error::{GraphStoreError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum accepted concept name length
pub const CONCEPT_NAME_MAX_LENGTH: usize = 100;

/// Valid traversal directions for neighbour queries
pub const VALID_DIRECTIONS: [&str; 3] = ["in", "out", "both"];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_\p{L}][A-Za-z0-9_\p{L}]*$").expect("identifier pattern is valid")
    })
}

/// Validate a Cypher identifier (label, relationship type, property name)
///
/// # Errors
///
/// [`GraphStoreError::Validation`] when empty or containing characters
/// outside `[A-Za-z0-9_\p{L}]` (or starting with a digit).
pub fn validate_identifier(value: &str, field_name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(GraphStoreError::validation(
            format!("Empty {field_name} is not allowed"),
            field_name,
        ));
    }
    if !identifier_pattern().is_match(value) {
        return Err(GraphStoreError::validation(
            format!(
                "Invalid {field_name} format: '{value}'. Must start with a letter and \
                 contain only alphanumeric, underscore, or Unicode letter characters."
            ),
            field_name,
        ));
    }
    Ok(())
}

/// Validate a list of labels
pub fn validate_labels(labels: &[String]) -> Result<()> {
    for label in labels {
        validate_identifier(label, "label")?;
    }
    Ok(())
}

/// Validate a list of relationship types
pub fn validate_relationship_types(rel_types: &[String]) -> Result<()> {
    for rel_type in rel_types {
        validate_identifier(rel_type, "relationship_type")?;
    }
    Ok(())
}

/// Validate a traversal direction
pub fn validate_direction(direction: &str) -> Result<()> {
    if !VALID_DIRECTIONS.contains(&direction) {
        return Err(GraphStoreError::validation(
            format!("Invalid direction: '{direction}'. Must be one of {VALID_DIRECTIONS:?}"),
            "direction",
        ));
    }
    Ok(())
}

/// Build a `:Label1:Label2` filter from validated labels
///
/// Empty input produces an empty string (no label constraint).
pub fn build_label_filter(labels: &[String]) -> Result<String> {
    if labels.is_empty() {
        return Ok(String::new());
    }
    validate_labels(labels)?;
    Ok(format!(":{}", labels.join(":")))
}

/// Build a `:TYPE1|TYPE2` relationship filter from validated types
pub fn build_rel_filter(rel_types: &[String]) -> Result<String> {
    if rel_types.is_empty() {
        return Ok(String::new());
    }
    validate_relationship_types(rel_types)?;
    Ok(format!(":{}", rel_types.join("|")))
}

/// Validate and normalise a concept name (trim, non-empty, bounded length)
pub fn validate_concept_name(name: &str, field_name: &str) -> Result<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(GraphStoreError::validation(
            format!("{field_name} cannot be empty or whitespace only"),
            field_name,
        ));
    }
    if trimmed.chars().count() > CONCEPT_NAME_MAX_LENGTH {
        return Err(GraphStoreError::validation(
            format!("{field_name} must be at most {CONCEPT_NAME_MAX_LENGTH} characters"),
            field_name,
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for id in ["Person", "HAS_SKILL", "_internal", "개발팀", "Skill2"] {
            assert!(validate_identifier(id, "label").is_ok(), "rejected {id}");
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for id in ["", "has space", "semi;colon", "dash-ed", "1leading", "a.b", "x`y"] {
            assert!(validate_identifier(id, "label").is_err(), "accepted {id}");
        }
    }

    #[test]
    fn test_injection_attempt_is_rejected() {
        let attempt = "Person) DETACH DELETE (n";
        assert!(validate_identifier(attempt, "label").is_err());
    }

    #[test]
    fn test_label_filter() {
        let filter =
            build_label_filter(&["Person".to_string(), "Employee".to_string()]).unwrap();
        assert_eq!(filter, ":Person:Employee");
        assert_eq!(build_label_filter(&[]).unwrap(), "");
    }

    #[test]
    fn test_rel_filter() {
        let filter =
            build_rel_filter(&["HAS_SKILL".to_string(), "MENTORS".to_string()]).unwrap();
        assert_eq!(filter, ":HAS_SKILL|MENTORS");
    }

    #[test]
    fn test_direction() {
        assert!(validate_direction("both").is_ok());
        assert!(validate_direction("sideways").is_err());
    }

    #[test]
    fn test_concept_name_normalises() {
        assert_eq!(validate_concept_name("  Python  ", "name").unwrap(), "Python");
        assert!(validate_concept_name("   ", "name").is_err());
        assert!(validate_concept_name(&"x".repeat(101), "name").is_err());
    }
}
