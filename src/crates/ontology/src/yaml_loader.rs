//! File-backed ontology loader
//!
//! Parses `schema.yaml` (the concept taxonomy: skill categories with
//! subcategories, position levels) and `synonyms.yaml` (canonical names
//! with aliases, per category), and builds a lowercase reverse index
//! alias → canonical for O(1) canonicalisation. Missing or malformed files
//! degrade to an empty ontology with a warning; lookups then pass terms
//! through unchanged.

use crate::lookup::{categories, OntologyLookup, DEFAULT_KOREAN_SUFFIXES};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
struct SchemaFile {
    #[serde(default)]
    concepts: Concepts,
    /// Organisational suffixes stripped during entity-name matching
    #[serde(default)]
    korean_suffixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct Concepts {
    #[serde(rename = "SkillCategory", default)]
    skill_categories: Vec<SkillCategory>,
    #[serde(rename = "PositionLevel", default)]
    position_level: PositionLevel,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SkillCategory {
    #[serde(default)]
    name: String,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    subcategories: Vec<SkillSubcategory>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SkillSubcategory {
    #[serde(default)]
    name: String,
    #[serde(default)]
    skills: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PositionLevel {
    #[serde(default)]
    hierarchy: Vec<PositionLevelEntry>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PositionLevelEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    level: i64,
    #[serde(default)]
    includes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SynonymEntry {
    #[serde(default)]
    canonical: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

type SynonymTable = HashMap<String, Vec<(String, SynonymEntry)>>;

#[derive(Default)]
struct LoadedOntology {
    schema: SchemaFile,
    /// category → ordered (main term, entry) pairs
    synonyms: SynonymTable,
    /// category → lowercase alias → canonical
    reverse_index: HashMap<String, HashMap<String, String>>,
}

/// YAML-backed [`OntologyLookup`]
pub struct YamlOntologyLoader {
    dir: PathBuf,
    /// Inline sources take precedence over the directory (tests, fixtures)
    inline: Option<(String, String)>,
    loaded: RwLock<Option<std::sync::Arc<LoadedOntology>>>,
}

impl YamlOntologyLoader {
    /// Load from `<dir>/schema.yaml` and `<dir>/synonyms.yaml`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            inline: None,
            loaded: RwLock::new(None),
        }
    }

    /// Load from in-memory YAML sources
    pub fn from_strings(schema_yaml: &str, synonyms_yaml: &str) -> Self {
        Self {
            dir: PathBuf::new(),
            inline: Some((schema_yaml.to_string(), synonyms_yaml.to_string())),
            loaded: RwLock::new(None),
        }
    }

    fn load(&self) -> std::sync::Arc<LoadedOntology> {
        if let Some(loaded) = self.loaded.read().as_ref() {
            return loaded.clone();
        }

        let (schema_text, synonyms_text) = match &self.inline {
            Some((schema, synonyms)) => (Some(schema.clone()), Some(synonyms.clone())),
            None => (
                read_optional(&self.dir.join("schema.yaml")),
                read_optional(&self.dir.join("synonyms.yaml")),
            ),
        };

        let schema: SchemaFile = schema_text
            .as_deref()
            .and_then(|text| match serde_yaml::from_str(text) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to parse schema.yaml");
                    None
                }
            })
            .unwrap_or_default();

        let synonyms = synonyms_text
            .as_deref()
            .map(parse_synonyms)
            .unwrap_or_default();

        let reverse_index = build_reverse_index(&synonyms);

        let loaded = std::sync::Arc::new(LoadedOntology {
            schema,
            synonyms,
            reverse_index,
        });

        *self.loaded.write() = Some(loaded.clone());
        tracing::info!(
            categories = loaded.reverse_index.len(),
            "Ontology files loaded"
        );
        loaded
    }

    fn skill_children(schema: &SchemaFile, concept: &str) -> Vec<String> {
        let mut result = Vec::new();

        for top in &schema.concepts.skill_categories {
            if top.name.eq_ignore_ascii_case(concept) {
                result.extend(top.skills.iter().cloned());
                for sub in &top.subcategories {
                    result.extend(sub.skills.iter().cloned());
                }
                return result;
            }
            for sub in &top.subcategories {
                if sub.name.eq_ignore_ascii_case(concept) {
                    return sub.skills.clone();
                }
            }
        }

        result
    }

    fn position_children(schema: &SchemaFile, concept: &str) -> Vec<String> {
        let hierarchy = &schema.concepts.position_level.hierarchy;

        let Some(target) = hierarchy
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(concept))
        else {
            return Vec::new();
        };

        let mut result = target.includes.clone();
        for entry in hierarchy {
            if entry.level < target.level {
                result.extend(entry.includes.iter().cloned());
            }
        }
        result
    }
}

fn read_optional(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ontology file not readable");
            None
        }
    }
}

fn parse_synonyms(text: &str) -> SynonymTable {
    let raw: HashMap<String, serde_yaml::Value> = match serde_yaml::from_str(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse synonyms.yaml");
            return HashMap::new();
        }
    };

    let mut table = SynonymTable::new();
    for (category, value) in raw {
        // Metadata keys like `_meta` are not categories.
        if category.starts_with('_') {
            continue;
        }
        let Ok(entries) =
            serde_yaml::from_value::<HashMap<String, SynonymEntry>>(value)
        else {
            tracing::warn!(category = %category, "Skipping malformed synonym category");
            continue;
        };
        let mut ordered: Vec<(String, SynonymEntry)> = entries.into_iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));
        table.insert(category, ordered);
    }
    table
}

fn build_reverse_index(synonyms: &SynonymTable) -> HashMap<String, HashMap<String, String>> {
    let mut index = HashMap::new();

    for (category, entries) in synonyms {
        let mut category_index: HashMap<String, String> = HashMap::new();

        for (main_term, entry) in entries {
            let canonical = entry.canonical.clone().unwrap_or_else(|| main_term.clone());
            category_index.insert(main_term.to_lowercase(), canonical.clone());
            for alias in &entry.aliases {
                category_index.insert(alias.to_lowercase(), canonical.clone());
            }
        }

        index.insert(category.clone(), category_index);
    }

    index
}

#[async_trait]
impl OntologyLookup for YamlOntologyLoader {
    async fn get_canonical(&self, term: &str, category: &str) -> String {
        let loaded = self.load();
        loaded
            .reverse_index
            .get(category)
            .and_then(|index| index.get(&term.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| term.to_string())
    }

    async fn get_synonyms(&self, term: &str, category: &str) -> Vec<String> {
        let loaded = self.load();
        let canonical = self.get_canonical(term, category).await;

        if let Some(entries) = loaded.synonyms.get(category) {
            for (main_term, entry) in entries {
                let entry_canonical = entry.canonical.as_deref().unwrap_or(main_term);
                if entry_canonical.eq_ignore_ascii_case(&canonical) {
                    let mut group = vec![entry_canonical.to_string()];
                    for alias in &entry.aliases {
                        if !group.iter().any(|g| g.eq_ignore_ascii_case(alias)) {
                            group.push(alias.clone());
                        }
                    }
                    return group;
                }
            }
        }

        vec![term.to_string()]
    }

    async fn get_children(&self, concept: &str, category: &str) -> Vec<String> {
        let loaded = self.load();
        match category {
            categories::SKILLS => Self::skill_children(&loaded.schema, concept),
            categories::POSITIONS => Self::position_children(&loaded.schema, concept),
            _ => Vec::new(),
        }
    }

    async fn list_concepts(&self, category: &str, limit: usize) -> Vec<String> {
        let loaded = self.load();
        let mut concepts: Vec<String> = Vec::new();

        if category == categories::SKILLS {
            for top in &loaded.schema.concepts.skill_categories {
                concepts.extend(top.skills.iter().cloned());
                for sub in &top.subcategories {
                    concepts.extend(sub.skills.iter().cloned());
                }
            }
        }

        if let Some(entries) = loaded.synonyms.get(category) {
            for (main_term, entry) in entries {
                let canonical = entry.canonical.clone().unwrap_or_else(|| main_term.clone());
                concepts.push(canonical);
            }
        }

        let mut seen = std::collections::HashSet::new();
        concepts.retain(|c| seen.insert(c.to_lowercase()));
        concepts.truncate(limit);
        concepts
    }

    async fn korean_suffixes(&self) -> Vec<String> {
        let loaded = self.load();
        if loaded.schema.korean_suffixes.is_empty() {
            DEFAULT_KOREAN_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            loaded.schema.korean_suffixes.clone()
        }
    }

    async fn clear_cache(&self) {
        *self.loaded.write() = None;
    }
}
