//! Provider trait
//!
//! [`LanguageModel`] is the seam between the pipeline and any concrete LLM
//! provider. The gateway and every pipeline node depend only on this trait;
//! the shipped [`AzureLlmClient`](crate::client::AzureLlmClient) is one
//! implementation, and test suites supply canned ones.

use crate::config::ModelTier;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A chat-style language model with two deployments and an embedder
///
/// Implementations must be `Send + Sync`; the pipeline shares them as
/// `Arc<dyn LanguageModel>` across nodes and background learners.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate free text from a system + user prompt pair
    async fn generate_text(&self, system: &str, user: &str, tier: ModelTier) -> Result<String>;

    /// Generate a JSON object from a system + user prompt pair
    ///
    /// Implementations should request JSON output mode where the provider
    /// supports it. The returned value is the parsed object; a payload that
    /// does not parse is a [`LlmError::ResponseShape`](crate::LlmError).
    async fn generate_json(&self, system: &str, user: &str, tier: ModelTier) -> Result<Value>;

    /// Embed a text into a float vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Clone this model into a boxed trait object
    fn clone_box(&self) -> Box<dyn LanguageModel>;
}

impl Clone for Box<dyn LanguageModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
