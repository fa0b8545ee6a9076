//! Application settings
//!
//! Settings default sensibly and can be overridden from the environment
//! (`GRAPHRAG_*` variables). Everything configuration-driven in the
//! pipeline funnels through here: feature gates (vector cache, light
//! Cypher tier, concept expansion), the ontology mode, cache lifetimes and
//! the adaptive-ontology thresholds.

use llm::LlmSettings;
use ontology::{AdaptiveOntologySettings, OntologyMode};
use serde::{Deserialize, Serialize};

/// Graph database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Bolt URI, e.g. `bolt://localhost:7687`
    pub uri: String,
    /// Username
    pub user: String,
    /// Password
    pub password: String,
    /// Connection pool bound
    pub max_connections: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            max_connections: 50,
        }
    }
}

/// How aggressively concepts expand before resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionStrategy {
    /// No synonym/children expansion
    Strict,
    /// Default limits
    #[default]
    Normal,
    /// Looser limits for recall-heavy deployments
    Broad,
}

impl ExpansionStrategy {
    /// Stored string form (recorded in the pipeline state for auditing)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Normal => "normal",
            Self::Broad => "broad",
        }
    }

    /// The expansion limits this strategy implies
    pub fn expansion_config(&self) -> ontology::ExpansionConfig {
        match self {
            Self::Strict => ontology::ExpansionConfig::strict(),
            Self::Normal => ontology::ExpansionConfig::default(),
            Self::Broad => ontology::ExpansionConfig::broad(),
        }
    }
}

/// Top-level application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Graph connection
    #[serde(default)]
    pub graph: GraphSettings,

    /// LLM provider connection
    #[serde(default)]
    pub llm: LlmSettings,

    /// Enables the CacheChecker node
    pub vector_search_enabled: bool,

    /// Cosine threshold for a query-cache hit
    pub cache_similarity_threshold: f64,

    /// Enables light-tier selection in the Cypher generator
    pub cypher_light_model_enabled: bool,

    /// Which ontology backend the registry loads
    pub ontology_mode: OntologyMode,

    /// Directory holding `schema.yaml` / `synonyms.yaml` (file/hybrid mode)
    pub ontology_dir: String,

    /// Enables the ConceptExpander node
    pub concept_expansion_enabled: bool,

    /// Expansion aggressiveness
    pub expansion_strategy: ExpansionStrategy,

    /// SchemaFetcher cache lifetime in seconds
    pub schema_cache_ttl_secs: u64,

    /// Adaptive-ontology loop configuration
    #[serde(default)]
    pub adaptive_ontology: AdaptiveOntologySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            graph: GraphSettings::default(),
            llm: LlmSettings::default(),
            vector_search_enabled: false,
            cache_similarity_threshold: 0.92,
            cypher_light_model_enabled: true,
            ontology_mode: OntologyMode::File,
            ontology_dir: "ontology".to_string(),
            concept_expansion_enabled: true,
            expansion_strategy: ExpansionStrategy::Normal,
            schema_cache_ttl_secs: 60,
            adaptive_ontology: AdaptiveOntologySettings::default(),
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(uri) = std::env::var("GRAPHRAG_NEO4J_URI") {
            settings.graph.uri = uri;
        }
        if let Ok(user) = std::env::var("GRAPHRAG_NEO4J_USER") {
            settings.graph.user = user;
        }
        if let Ok(password) = std::env::var("GRAPHRAG_NEO4J_PASSWORD") {
            settings.graph.password = password;
        }
        if let Ok(endpoint) = std::env::var("GRAPHRAG_LLM_ENDPOINT") {
            settings.llm.endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var("GRAPHRAG_LLM_API_KEY") {
            settings.llm.api_key = api_key;
        }

        settings.vector_search_enabled =
            env_bool("GRAPHRAG_VECTOR_SEARCH_ENABLED", settings.vector_search_enabled);
        settings.cypher_light_model_enabled = env_bool(
            "GRAPHRAG_CYPHER_LIGHT_MODEL_ENABLED",
            settings.cypher_light_model_enabled,
        );
        settings.concept_expansion_enabled = env_bool(
            "GRAPHRAG_CONCEPT_EXPANSION_ENABLED",
            settings.concept_expansion_enabled,
        );

        if let Ok(mode) = std::env::var("GRAPHRAG_ONTOLOGY_MODE") {
            if let Ok(mode) = mode.parse() {
                settings.ontology_mode = mode;
            }
        }
        if let Ok(dir) = std::env::var("GRAPHRAG_ONTOLOGY_DIR") {
            settings.ontology_dir = dir;
        }
        if let Ok(ttl) = std::env::var("GRAPHRAG_SCHEMA_CACHE_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                settings.schema_cache_ttl_secs = ttl;
            }
        }

        settings.adaptive_ontology.enabled = env_bool(
            "GRAPHRAG_ADAPTIVE_ONTOLOGY_ENABLED",
            settings.adaptive_ontology.enabled,
        );
        settings.adaptive_ontology.auto_approve_enabled = env_bool(
            "GRAPHRAG_AUTO_APPROVE_ENABLED",
            settings.adaptive_ontology.auto_approve_enabled,
        );
        if let Ok(limit) = std::env::var("GRAPHRAG_AUTO_APPROVE_DAILY_LIMIT") {
            if let Ok(limit) = limit.parse() {
                settings.adaptive_ontology.auto_approve_daily_limit = limit;
            }
        }

        settings
    }
}

impl Settings {
    /// Build the schema cache with this configuration's TTL
    pub fn schema_cache(
        &self,
        runner: std::sync::Arc<dyn graph_store::QueryRunner>,
    ) -> graph_store::SchemaCache {
        graph_store::SchemaCache::with_ttl(
            runner,
            std::time::Duration::from_secs(self.schema_cache_ttl_secs),
        )
    }

    /// Build the query cache with this configuration's similarity threshold
    pub fn query_cache(
        &self,
        repository: graph_store::GraphRepository,
    ) -> graph_store::QueryCacheRepository {
        graph_store::QueryCacheRepository::with_threshold(
            repository,
            self.cache_similarity_threshold,
        )
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
