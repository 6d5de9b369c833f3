use super::{status_error, transport_error, GenerationRequest, LLMError, LLMProvider, MessageRole};
use crate::config::AnthropicConfig;
use crate::secrets::{SecretCache, ANTHROPIC_API_KEY};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct AnthropicProvider {
    config: AnthropicConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }

    /// System text is sent separately; the schema instruction rides along with it.
    fn payload(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut system_prompt = String::new();
        let mut api_messages = Vec::new();
        for msg in request.messages_with_schema_instruction() {
            if msg.role == MessageRole::System {
                system_prompt.push_str(&msg.content);
                system_prompt.push('\n');
                continue;
            }
            api_messages.push(json!({
                "role": if msg.role == MessageRole::Assistant { "assistant" } else { "user" },
                "content": msg.content
            }));
        }

        json!({
            "model": self.config.model,
            "max_tokens": 4096,
            "system": system_prompt.trim_end(),
            "messages": api_messages,
        })
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.003 per 1k tokens
        (tokens as f64 / 1000.0) * 0.003
    }

    async fn check_health(&self) -> bool {
        self.secret_cache.get_secret(ANTHROPIC_API_KEY).is_ok()
    }

    async fn generate(&self, request: &GenerationRequest) -> super::Result<String> {
        let api_key = self
            .secret_cache
            .get_secret(ANTHROPIC_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.unsecure())
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let content_arr = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LLMError::ParseError("No content array in response".to_string()))?;

        let full_content: String = content_arr
            .iter()
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect();

        Ok(full_content.trim().to_string())
    }
}
