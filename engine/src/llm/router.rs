//! LLM Router
//!
//! Orders the configured providers and calls them with automatic failover.
//! The configured default provider is always tried first; the remaining
//! providers follow, cheapest first. Every attempt runs under the configured
//! timeout and is retried once before moving on to the next provider.

use super::anthropic::AnthropicProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::{GenerationRequest, LLMError, LLMProvider};
use crate::config::LLMConfig;
use crate::retry::{retry_once, RetryPolicy};
use crate::secrets::{SecretCache, ANTHROPIC_API_KEY, OPENAI_API_KEY};
use async_trait::async_trait;
use std::sync::Arc;

/// LLM Router that selects providers in preference order
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// Default provider name
    default_provider: String,

    /// Timeout and backoff applied to each provider call
    policy: RetryPolicy,
}

impl LLMRouter {
    /// Create a new LLM router
    ///
    /// # Arguments
    /// * `providers` - List of available LLM providers
    /// * `config` - LLM configuration
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: &LLMConfig) -> Self {
        Self {
            providers,
            default_provider: config.default_provider.clone(),
            policy: RetryPolicy::new(config.request_timeout(), config.retry_backoff()),
        }
    }

    /// Build the router from configuration.
    ///
    /// The default provider is always registered. Cloud providers whose
    /// credentials resolve are added as fallbacks; Ollama only joins when it
    /// is the default, since an absent local server would stall every failover.
    pub fn from_config(config: &LLMConfig, secret_cache: Arc<SecretCache>) -> Self {
        let mut providers: Vec<Box<dyn LLMProvider>> = Vec::new();

        let wants = |name: &str, key: Option<&str>| {
            config.default_provider == name
                || key.is_some_and(|k| secret_cache.get_secret(k).is_ok())
        };

        if wants("openai", Some(OPENAI_API_KEY)) {
            providers.push(Box::new(OpenAIProvider::new(
                config.openai.clone(),
                Arc::clone(&secret_cache),
            )));
        }
        if wants("anthropic", Some(ANTHROPIC_API_KEY)) {
            providers.push(Box::new(AnthropicProvider::new(
                config.anthropic.clone(),
                Arc::clone(&secret_cache),
            )));
        }
        if wants("ollama", None) {
            providers.push(Box::new(OllamaProvider::new(
                config.ollama.base_url.clone(),
                config.ollama.model.clone(),
            )));
        }

        tracing::debug!(
            "LLM router providers: {:?}",
            providers.iter().map(|p| p.name()).collect::<Vec<_>>()
        );

        Self::new(providers, config)
    }

    /// Estimate token count for a request
    ///
    /// Uses a simple heuristic: ~4 characters per token
    fn estimate_tokens(request: &GenerationRequest) -> usize {
        request.total_chars() / 4
    }

    /// Rank providers: default first, then by estimated cost.
    /// Returns a sorted list of providers (best first)
    pub fn rank_providers(&self, estimated_tokens: usize) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        providers.sort_by(|a, b| {
            let a_default = a.name() == self.default_provider;
            let b_default = b.name() == self.default_provider;
            b_default.cmp(&a_default).then_with(|| {
                a.estimated_cost(estimated_tokens)
                    .partial_cmp(&b.estimated_cost(estimated_tokens))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        providers
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health_all(&self) -> Vec<(String, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name().to_string(), is_healthy));
        }
        results
    }
}

#[async_trait]
impl LLMProvider for LLMRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn is_local(&self) -> bool {
        self.providers.iter().all(|p| p.is_local())
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        self.rank_providers(tokens)
            .first()
            .map(|p| p.estimated_cost(tokens))
            .unwrap_or(0.0)
    }

    /// Call providers in rank order with automatic failover
    ///
    /// Returns `ProviderUnavailable` if all fail.
    async fn generate(&self, request: &GenerationRequest) -> super::Result<String> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let ranked_providers = self.rank_providers(Self::estimate_tokens(request));

        for provider in ranked_providers {
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s, schema: {:?})",
                provider.name(),
                self.policy.timeout.as_secs(),
                request.schema_name()
            );

            let label = format!("LLM provider {}", provider.name());
            match retry_once(&label, self.policy, || provider.generate(request)).await {
                Ok(reply) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok(reply);
                }
                Err(e) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(LLMError::ProviderUnavailable(
            "All LLM providers failed".to_string(),
        ))
    }

    async fn check_health(&self) -> bool {
        for provider in &self.providers {
            if provider.check_health().await {
                return true;
            }
        }
        false
    }
}
