//! Loader trait
//!
//! [`OntologyLookup`] is the read interface every consumer goes through.
//! Consumers must fetch the loader from the
//! [`OntologyRegistry`](crate::registry::OntologyRegistry) on each
//! operation rather than holding onto it, so a registry refresh is
//! immediately visible.

use crate::expansion::ExpansionConfig;
use async_trait::async_trait;

/// Ontology categories with structured content
pub mod categories {
    /// Skill concepts
    pub const SKILLS: &str = "skills";
    /// Position concepts
    pub const POSITIONS: &str = "positions";
    /// Department concepts
    pub const DEPARTMENTS: &str = "departments";
}

/// Built-in organisational suffixes, used when the ontology files do not
/// configure their own list
pub const DEFAULT_KOREAN_SUFFIXES: [&str; 7] =
    ["프로젝트", "팀", "부서", "본부", "파트", "씨", "님"];

/// Read access to the concept catalogue
///
/// All lookups are case-insensitive on the term. Unknown terms and unknown
/// categories pass through: `get_canonical` returns the input,
/// `get_synonyms` returns `[term]`, `get_children` returns nothing.
#[async_trait]
pub trait OntologyLookup: Send + Sync {
    /// Canonical spelling of a term (identity when unknown)
    async fn get_canonical(&self, term: &str, category: &str) -> String;

    /// Full synonym group of a term, canonical included
    ///
    /// Bidirectional: looking up either an alias or the canonical returns
    /// the whole group.
    async fn get_synonyms(&self, term: &str, category: &str) -> Vec<String>;

    /// Transitive children of a concept within its category
    async fn get_children(&self, concept: &str, category: &str) -> Vec<String>;

    /// Known canonical concepts of a category (context for the learner)
    ///
    /// Best effort: loaders without an enumerable catalogue return nothing.
    async fn list_concepts(&self, _category: &str, _limit: usize) -> Vec<String> {
        Vec::new()
    }

    /// Organisational suffixes the entity resolver strips during name
    /// matching (e.g. "챗봇 리뉴얼 프로젝트" → "챗봇 리뉴얼")
    ///
    /// File-backed loaders source this list from the ontology files so it
    /// can grow without a code change; the built-in list is the fallback.
    async fn korean_suffixes(&self) -> Vec<String> {
        DEFAULT_KOREAN_SUFFIXES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Drop any internal caches so the next lookup sees fresh data
    async fn clear_cache(&self) {}

    /// Expand a term into itself, its canonical, synonyms and children
    ///
    /// Order is deterministic: term, canonical, synonyms (up to
    /// `max_synonyms`), children of the canonical (up to `max_children`),
    /// deduplicated case-insensitively and truncated at `max_total`.
    async fn expand_concept(
        &self,
        term: &str,
        category: &str,
        config: &ExpansionConfig,
    ) -> Vec<String> {
        let mut expanded: Vec<String> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

        let mut push = |value: String, out: &mut Vec<String>| {
            let key = value.to_lowercase();
            if seen.insert(key) {
                out.push(value);
            }
        };

        push(term.to_string(), &mut expanded);

        let canonical = self.get_canonical(term, category).await;
        push(canonical.clone(), &mut expanded);

        if config.include_synonyms {
            for synonym in self
                .get_synonyms(term, category)
                .await
                .into_iter()
                .take(config.max_synonyms)
            {
                push(synonym, &mut expanded);
            }
        }

        if config.include_children {
            for child in self
                .get_children(&canonical, category)
                .await
                .into_iter()
                .take(config.max_children)
            {
                push(child, &mut expanded);
            }
        }

        expanded.truncate(config.max_total);
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal loader used to pin the provided expand_concept behaviour
    struct FixedLoader;

    #[async_trait]
    impl OntologyLookup for FixedLoader {
        async fn get_canonical(&self, term: &str, _category: &str) -> String {
            if term.eq_ignore_ascii_case("파이썬") {
                "Python".to_string()
            } else {
                term.to_string()
            }
        }

        async fn get_synonyms(&self, _term: &str, _category: &str) -> Vec<String> {
            vec![
                "Python".to_string(),
                "파이썬".to_string(),
                "Python3".to_string(),
                "Py".to_string(),
            ]
        }

        async fn get_children(&self, concept: &str, _category: &str) -> Vec<String> {
            if concept == "Python" {
                vec!["Django".to_string(), "FastAPI".to_string()]
            } else {
                Vec::new()
            }
        }
    }

    #[tokio::test]
    async fn test_expansion_contains_term_and_canonical() {
        let expanded = FixedLoader
            .expand_concept("파이썬", "skills", &ExpansionConfig::default())
            .await;
        assert_eq!(expanded[0], "파이썬");
        assert!(expanded.contains(&"Python".to_string()));
    }

    #[tokio::test]
    async fn test_expansion_dedupes_case_insensitively() {
        let expanded = FixedLoader
            .expand_concept("python", "skills", &ExpansionConfig::default())
            .await;
        let lowered: Vec<String> = expanded.iter().map(|s| s.to_lowercase()).collect();
        let mut unique = lowered.clone();
        unique.dedup();
        assert_eq!(lowered.len(), unique.len());
    }

    #[tokio::test]
    async fn test_expansion_respects_max_total() {
        let config = ExpansionConfig {
            max_total: 3,
            ..Default::default()
        };
        let expanded = FixedLoader.expand_concept("파이썬", "skills", &config).await;
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0], "파이썬");
    }

    #[tokio::test]
    async fn test_strict_config_keeps_term_and_canonical_only() {
        let expanded = FixedLoader
            .expand_concept("파이썬", "skills", &ExpansionConfig::strict())
            .await;
        assert_eq!(expanded, vec!["파이썬".to_string(), "Python".to_string()]);
    }

    #[tokio::test]
    async fn test_expansion_is_deterministic() {
        let first = FixedLoader
            .expand_concept("파이썬", "skills", &ExpansionConfig::default())
            .await;
        let second = FixedLoader
            .expand_concept("파이썬", "skills", &ExpansionConfig::default())
            .await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_default_korean_suffixes() {
        let suffixes = FixedLoader.korean_suffixes().await;
        assert!(suffixes.contains(&"프로젝트".to_string()));
        assert!(suffixes.contains(&"팀".to_string()));
    }
}
