//! Configuration management
//!
//! This module handles loading, validation, and management of the concierge
//! configuration. Configuration is stored in TOML format at ~/.concierge/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Language model provider selection, timeouts and per-provider settings
//! - **search**: Web search provider, depth and result limits
//! - **assistant**: Interview turn cap, recommendation count, target market
//! - **memory**: Preference memory enablement and retention window
//!
//! # Environment Overrides
//!
//! A handful of settings can be overridden without editing the file:
//! `OPENAI_MODEL`, `ASSISTANT_MAX_QUESTIONS`, `ASSISTANT_RECOMMENDATION_COUNT`
//! and `TAVILY_SEARCH_DEPTH`.
//!
//! # Examples
//!
//! ```no_run
//! use concierge_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Max turns: {}", config.assistant.max_turns);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use crate::search::SearchDepth;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Language model configuration
    pub llm: LLMConfig,

    /// Web search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Interview and recommendation settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Preference memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (openai, anthropic, ollama)
    pub default_provider: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,

    /// Delay before the single retry of a failed call
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Anthropic provider settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

impl LLMConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Model identifier of the default provider
    pub fn model(&self) -> &str {
        match self.default_provider.as_str() {
            "anthropic" => &self.anthropic.model,
            "ollama" => &self.ollama.model,
            _ => &self.openai.model,
        }
    }
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
    // Note: API key comes from OPENAI_API_KEY or the OS keychain, not the config
}

/// Anthropic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Base URL for Anthropic API
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_anthropic_model")]
    pub model: String,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search provider (tavily)
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// Base URL of the search API
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Search depth: basic or advanced
    #[serde(default)]
    pub depth: SearchDepth,

    /// Results requested per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub request_timeout_secs: u64,

    /// Delay before the single retry of a failed call
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            base_url: default_search_base_url(),
            depth: SearchDepth::default(),
            max_results: default_max_results(),
            request_timeout_secs: default_search_timeout(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Interview and recommendation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Maximum clarification turns before the interview is closed
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Number of recommendations presented
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Market recommendations are biased toward
    #[serde(default = "default_target_market")]
    pub target_market: String,

    /// Currency budgets are assumed to be stated in
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            recommendation_count: default_recommendation_count(),
            target_market: default_target_market(),
            currency: default_currency(),
        }
    }
}

/// Preference memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Remember stable preferences across sessions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Days after which a remembered preference is ignored
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: default_retention_days(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.concierge")
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_search_timeout() -> u64 {
    20
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_search_provider() -> String {
    "tavily".to_string()
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_max_turns() -> u32 {
    6
}

fn default_recommendation_count() -> usize {
    3
}

fn default_target_market() -> String {
    "Switzerland".to_string()
}

fn default_currency() -> String {
    "CHF".to_string()
}

fn default_retention_days() -> u32 {
    90
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            request_timeout_secs: default_llm_timeout(),
            retry_backoff_ms: default_retry_backoff_ms(),
            openai: OpenAIConfig::default(),
            anthropic: AnthropicConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.concierge/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    /// Environment overrides are applied before validation.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Parse a TOML document without touching the file system
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        toml::from_str(contents)
            .map_err(|e| EngineError::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Configuration(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default_config();

        let toml_string = toml::to_string_pretty(&config).map_err(|e| {
            EngineError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            EngineError::Configuration(format!("Failed to write config file: {}", e))
        })?;

        let mut config = config;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.concierge/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir().ok_or_else(|| {
            EngineError::Configuration("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".concierge").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            assistant: AssistantConfig::default(),
            memory: MemoryConfig::default(),
        }
    }

    /// Path of the preference database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("concierge.db")
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.llm.openai.model = model.trim().to_string();
        }

        if let Some(raw) = lookup("ASSISTANT_MAX_QUESTIONS") {
            self.assistant.max_turns = raw.trim().parse().map_err(|_| {
                EngineError::Configuration(format!("ASSISTANT_MAX_QUESTIONS is not a number: {}", raw))
            })?;
        }

        if let Some(raw) = lookup("ASSISTANT_RECOMMENDATION_COUNT") {
            self.assistant.recommendation_count = raw.trim().parse().map_err(|_| {
                EngineError::Configuration(format!(
                    "ASSISTANT_RECOMMENDATION_COUNT is not a number: {}",
                    raw
                ))
            })?;
        }

        if let Some(raw) = lookup("TAVILY_SEARCH_DEPTH") {
            self.search.depth = raw.parse().map_err(EngineError::Configuration)?;
        }

        Ok(())
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates enumerated and bounded fields
    /// - Expands ~ in the data directory
    /// - Creates the data directory if it doesn't exist
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Configuration(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }

    /// Validate settings without touching the file system
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["openai", "anthropic", "ollama"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Configuration(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.search.provider != "tavily" {
            return Err(EngineError::Configuration(format!(
                "Invalid search provider '{}'. Must be: tavily",
                self.search.provider
            )));
        }

        if self.llm.request_timeout_secs == 0 || self.search.request_timeout_secs == 0 {
            return Err(EngineError::Configuration(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(EngineError::Configuration(
                "search.max_results must be greater than 0".to_string(),
            ));
        }

        if !(1..=20).contains(&self.assistant.max_turns) {
            return Err(EngineError::Configuration(
                "assistant.max_turns must be between 1 and 20".to_string(),
            ));
        }

        if !(1..=10).contains(&self.assistant.recommendation_count) {
            return Err(EngineError::Configuration(
                "assistant.recommendation_count must be between 1 and 10".to_string(),
            ));
        }

        if self.memory.retention_days == 0 {
            return Err(EngineError::Configuration(
                "memory.retention_days must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Configuration("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            EngineError::Configuration("Could not determine home directory".to_string())
        })?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir().ok_or_else(|| {
            EngineError::Configuration("Could not determine home directory".to_string())
        })
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.default_provider, "openai");
        assert_eq!(config.llm.model(), "gpt-4o-mini");
        assert_eq!(config.assistant.max_turns, 6);
        assert_eq!(config.assistant.recommendation_count, 3);
        assert_eq!(config.search.depth, SearchDepth::Advanced);
        assert_eq!(config.memory.retention_days, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
[core]
log_level = "debug"

[llm]
default_provider = "ollama"
"#,
        )
        .unwrap();

        assert_eq!(config.core.log_level, "debug");
        assert_eq!(config.llm.model(), "llama3.1:8b");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.assistant.target_market, "Switzerland");
        assert!(config.memory.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default_config();
        let env: HashMap<&str, &str> = [
            ("OPENAI_MODEL", "gpt-4o"),
            ("ASSISTANT_MAX_QUESTIONS", "4"),
            ("ASSISTANT_RECOMMENDATION_COUNT", "5"),
            ("TAVILY_SEARCH_DEPTH", "basic"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.openai.model, "gpt-4o");
        assert_eq!(config.assistant.max_turns, 4);
        assert_eq!(config.assistant.recommendation_count, 5);
        assert_eq!(config.search.depth, SearchDepth::Basic);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::default_config();
        let result = config.apply_env_overrides(|key| {
            (key == "ASSISTANT_MAX_QUESTIONS").then(|| "six".to_string())
        });
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let mut config = Config::default_config();
        config.assistant.max_turns = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.assistant.recommendation_count = 11;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.memory.retention_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default_config();
        config.llm.default_provider = "gemini".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.search.depth, deserialized.search.depth);
        assert_eq!(
            config.assistant.recommendation_count,
            deserialized.assistant.recommendation_count
        );
    }
}
