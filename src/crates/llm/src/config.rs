//! Provider configuration

use serde::{Deserialize, Serialize};

/// Which model deployment a call should use
///
/// The pipeline routes classification-sized work (intent, entity
/// extraction, ontology analysis) to the light tier and query synthesis
/// for multi-hop questions to the heavy tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Fast, cheap deployment for classification-style calls
    Light,
    /// Larger deployment for complex generation
    Heavy,
}

/// Connection settings for the LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Provider base endpoint, e.g. `https://myorg.openai.azure.com`
    pub endpoint: String,

    /// API key sent in the `api-key` header
    pub api_key: String,

    /// Deployment name for the light tier
    pub light_deployment: String,

    /// Deployment name for the heavy tier
    pub heavy_deployment: String,

    /// Deployment name for embeddings
    pub embedding_deployment: String,

    /// API version query parameter
    pub api_version: String,

    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,

    /// Sampling temperature for generation calls
    pub temperature: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            api_key: String::new(),
            light_deployment: "gpt-4o-mini".to_string(),
            heavy_deployment: "gpt-4o".to_string(),
            embedding_deployment: "text-embedding-3-small".to_string(),
            api_version: "2024-06-01".to_string(),
            request_timeout_secs: 30,
            temperature: 0.0,
        }
    }
}

impl LlmSettings {
    /// Deployment name for a tier
    pub fn deployment(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Light => &self.light_deployment,
            ModelTier::Heavy => &self.heavy_deployment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_selection() {
        let settings = LlmSettings {
            light_deployment: "small".into(),
            heavy_deployment: "big".into(),
            ..Default::default()
        };
        assert_eq!(settings.deployment(ModelTier::Light), "small");
        assert_eq!(settings.deployment(ModelTier::Heavy), "big");
    }
}
