//! Unified OpenAI-compatible provider.
//!
//! One struct that handles chat completions for any OpenAI-compatible API.
//! Endpoints are distinguished only by base URL, model name, and API key.

use async_trait::async_trait;
use briefcast_core::config::BriefcastConfig;
use briefcast_core::error::{BriefcastError, Result};
use briefcast_core::traits::LlmProvider;
use serde_json::{Value, json};

/// Environment variables probed when no API key is configured.
const ENV_KEYS: &[&str] = &["BRIEFCAST_LLM_API_KEY", "OPENAI_API_KEY"];

pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from configuration.
    ///
    /// API key resolution: `config.llm.api_key` > env vars > empty (local
    /// endpoints like Ollama need none).
    pub fn from_config(config: &BriefcastConfig) -> Result<Self> {
        let api_key = if !config.llm.api_key.is_empty() {
            config.llm.api_key.clone()
        } else {
            ENV_KEYS
                .iter()
                .find_map(|key| std::env::var(key).ok())
                .unwrap_or_default()
        };

        Ok(Self {
            base_url: config.llm.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, system: &str, prompt: &str, temperature: f32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| BriefcastError::Provider(format!("Request to {url}: {e}")))?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| BriefcastError::Provider(format!("Bad response body: {e}")))?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(BriefcastError::Provider(format!(
                "{status}: {message}"
            )));
        }

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                tracing::debug!("Provider payload without content: {payload}");
                BriefcastError::Provider("Response has no message content".into())
            })
    }
}
