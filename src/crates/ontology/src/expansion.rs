//! Concept expansion limits
//!
//! Expansion without limits over-matches badly ("Backend" would pull in a
//! dozen skills); [`ExpansionConfig`] bounds each class of expansion and
//! the total. Synonyms are added first, then children, then the final
//! truncation at `max_total`.

use serde::{Deserialize, Serialize};

/// Limits applied during concept expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Include synonyms of the term
    pub include_synonyms: bool,

    /// Include transitive children of the canonical concept
    pub include_children: bool,

    /// Maximum number of synonyms taken
    pub max_synonyms: usize,

    /// Maximum number of children taken
    pub max_children: usize,

    /// Upper bound on the full expansion (term and canonical included)
    pub max_total: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            include_synonyms: true,
            include_children: true,
            max_synonyms: 5,
            max_children: 10,
            max_total: 15,
        }
    }
}

impl ExpansionConfig {
    /// Validate the limits
    ///
    /// `max_total` must be at least 1 so that the expansion always contains
    /// the term itself.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_total < 1 {
            return Err("max_total must be at least 1".to_string());
        }
        Ok(())
    }

    /// Config for the `strict` expansion strategy (no expansion)
    pub fn strict() -> Self {
        Self {
            include_synonyms: false,
            include_children: false,
            ..Self::default()
        }
    }

    /// Config for the `broad` expansion strategy (looser caps)
    pub fn broad() -> Self {
        Self {
            max_synonyms: 10,
            max_children: 20,
            max_total: 30,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExpansionConfig::default();
        assert_eq!(config.max_synonyms, 5);
        assert_eq!(config.max_children, 10);
        assert_eq!(config.max_total, 15);
        assert!(config.include_synonyms);
        assert!(config.include_children);
    }

    #[test]
    fn test_validate_rejects_zero_total() {
        let config = ExpansionConfig {
            max_total: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strict_disables_expansion() {
        let config = ExpansionConfig::strict();
        assert!(!config.include_synonyms);
        assert!(!config.include_children);
    }
}
