//! Language Generation Port
//!
//! This module provides a common interface for interacting with multiple LLM providers
//! (OpenAI, Anthropic, Ollama). The LLMProvider trait defines the contract that all
//! providers must implement, enabling the router to fail over between them
//! transparently.
//!
//! A request optionally carries an [`OutputSchema`]. Providers then ask their API for
//! JSON output; turning the reply into a typed value is the job of [`structured`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::retry::RetryableError;

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod router;
pub mod structured;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl RetryableError for LLMError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimitExceeded
                | LLMError::NetworkError(_)
                | LLMError::Timeout(_)
                | LLMError::ProviderUnavailable(_)
        )
    }

    fn timed_out(after: Duration) -> Self {
        LLMError::Timeout(after)
    }
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Shape the reply of a structured request must follow
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Stable identifier, e.g. `clarifier_question`
    pub name: String,

    /// Example-style description of the expected JSON object
    pub shape: serde_json::Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, shape: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Instruction appended to prompts for providers without a native JSON mode
    pub fn instruction(&self) -> String {
        format!(
            "Respond strictly with a single JSON object ({}) shaped as:\n{}\nDo not include markdown code fences or any other text.",
            self.name, self.shape
        )
    }
}

/// One call to the Language Generation Port
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub schema: Option<OutputSchema>,
}

impl GenerationRequest {
    /// Free-text request
    pub fn text(messages: Vec<Message>) -> Self {
        Self {
            messages,
            schema: None,
        }
    }

    /// Structured request
    pub fn structured(messages: Vec<Message>, schema: OutputSchema) -> Self {
        Self {
            messages,
            schema: Some(schema),
        }
    }

    /// Name of the requested schema, if any
    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.name.as_str())
    }

    /// Total characters across all messages
    pub fn total_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }

    /// Messages with the schema instruction folded into the system prompt
    pub fn messages_with_schema_instruction(&self) -> Vec<Message> {
        let mut messages = self.messages.clone();
        if let Some(schema) = &self.schema {
            let instruction = schema.instruction();
            match messages.iter_mut().find(|m| m.role == MessageRole::System) {
                Some(system) => {
                    system.content.push_str("\n\n");
                    system.content.push_str(&instruction);
                }
                None => messages.insert(0, Message::system(instruction)),
            }
        }
        messages
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai", "anthropic")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for cloud providers
    fn is_local(&self) -> bool;

    /// Returns the estimated cost in USD for the given token count.
    /// Local providers should return 0.0
    fn estimated_cost(&self, tokens: usize) -> f64;

    /// Generate a reply
    ///
    /// # Returns
    /// * `Ok(String)` - Raw reply text (JSON text when a schema was requested)
    /// * `Err(LLMError)` - If the request fails
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Map a non-success HTTP status to an LLMError
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> LLMError {
    match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed(body),
        429 => LLMError::RateLimitExceeded,
        500..=599 => LLMError::ProviderUnavailable(format!("HTTP {}: {}", status, body)),
        _ => LLMError::InvalidRequest(body),
    }
}

/// Map a transport failure to an LLMError
pub(crate) fn transport_error(e: reqwest::Error) -> LLMError {
    if e.is_timeout() {
        LLMError::NetworkError(format!("request timed out: {}", e))
    } else {
        LLMError::NetworkError(e.to_string())
    }
}

/// Locate a JSON object in model output.
///
/// Handles:
/// 1. Raw JSON (the whole reply)
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. JSON embedded in prose; the first balanced `{...}` is taken
pub fn extract_json_payload(content: &str) -> Option<&str> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        let inner = inner.trim();
        if inner.starts_with('{') {
            return Some(inner);
        }
    }

    let pos = trimmed.find('{')?;
    extract_balanced_json(&trimmed[pos..])
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
