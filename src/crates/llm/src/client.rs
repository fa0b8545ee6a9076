//! Azure OpenAI-style HTTP client
//!
//! One `reqwest::Client` per deployment (light, heavy, embedding), a
//! per-request deadline from [`LlmSettings`], and a bounded
//! backoff-and-retry loop for throttled calls. Authentication and response
//! shape problems are terminal; 429 and transient 5xx are retried up to the
//! policy's attempt cap.

use crate::config::{LlmSettings, ModelTier};
use crate::error::{LlmError, Result};
use crate::retry::RetryPolicy;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP client for an Azure OpenAI-compatible provider
#[derive(Clone)]
pub struct AzureLlmClient {
    settings: LlmSettings,
    light_client: reqwest::Client,
    heavy_client: reqwest::Client,
    embedding_client: reqwest::Client,
    retry: RetryPolicy,
}

impl AzureLlmClient {
    /// Build a client from settings
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let build = || {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.request_timeout_secs))
                .build()
                .map_err(LlmError::from)
        };

        Ok(Self {
            light_client: build()?,
            heavy_client: build()?,
            embedding_client: build()?,
            retry: RetryPolicy::default(),
            settings,
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn chat_url(&self, tier: ModelTier) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint,
            self.settings.deployment(tier),
            self.settings.api_version,
        )
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.settings.endpoint, self.settings.embedding_deployment, self.settings.api_version,
        )
    }

    fn http(&self, tier: ModelTier) -> &reqwest::Client {
        match tier {
            ModelTier::Light => &self.light_client,
            ModelTier::Heavy => &self.heavy_client,
        }
    }

    /// POST with bounded retry on 429/5xx
    async fn post_with_retry(
        &self,
        client: &reqwest::Client,
        url: &str,
        body: &Value,
    ) -> Result<Value> {
        let mut attempt = 0usize;

        loop {
            let response = client
                .post(url)
                .header("api-key", &self.settings.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout(self.settings.request_timeout_secs))
                }
                Err(e) => return Err(LlmError::Connectivity(e.to_string())),
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<Value>()
                    .await
                    .map_err(|e| LlmError::ResponseShape(e.to_string()));
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(LlmError::Authentication(format!("status {status}")));
            }

            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

            if retryable && attempt + 1 < self.retry.max_attempts {
                let delay = self.retry.delay_for(attempt);
                tracing::warn!(
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "LLM call throttled, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited {
                    attempts: attempt + 1,
                });
            }

            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message,
            });
        }
    }

    fn extract_content(payload: &Value) -> Result<String> {
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::ResponseShape("missing choices[0].message.content".to_string())
            })
    }
}

#[async_trait]
impl LanguageModel for AzureLlmClient {
    #[tracing::instrument(skip(self, system, user), fields(tier = ?tier))]
    async fn generate_text(&self, system: &str, user: &str, tier: ModelTier) -> Result<String> {
        let body = json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.settings.temperature,
        });

        let payload = self
            .post_with_retry(self.http(tier), &self.chat_url(tier), &body)
            .await?;

        Self::extract_content(&payload)
    }

    #[tracing::instrument(skip(self, system, user), fields(tier = ?tier))]
    async fn generate_json(&self, system: &str, user: &str, tier: ModelTier) -> Result<Value> {
        let body = json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.settings.temperature,
            "response_format": {"type": "json_object"},
        });

        let payload = self
            .post_with_retry(self.http(tier), &self.chat_url(tier), &body)
            .await?;

        let content = Self::extract_content(&payload)?;
        serde_json::from_str(&content)
            .map_err(|e| LlmError::ResponseShape(format!("invalid JSON payload: {e}")))
    }

    #[tracing::instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({"input": text});

        let payload = self
            .post_with_retry(&self.embedding_client, &self.embeddings_url(), &body)
            .await?;

        let embedding = payload["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseShape("missing data[0].embedding".to_string()))?;

        embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| LlmError::ResponseShape("non-numeric embedding".to_string()))
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn LanguageModel> {
        Box::new(self.clone())
    }
}
