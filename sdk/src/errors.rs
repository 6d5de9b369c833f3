//! Error types and handling
//!
//! This module provides the error taxonomy shared by every stage of a shopping
//! session. All errors implement the `ConciergeErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Propagation
//!
//! Errors raised inside a single interview turn or a single candidate are
//! contained by the stage that produced them. Only configuration failures and
//! repeated transport failures leave the core, wrapped in a [`StageError`] so
//! the boundary can report exactly where a session stopped.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Trait for concierge error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait ConciergeErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets, file paths or provider payloads.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors degrade a single turn or stage. Non-recoverable
    /// errors end the session.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: a required Port is unusable (missing credentials, invalid settings)
/// - **Generation format**: structured output could not be obtained after retry and fallback parsing
/// - **Search unavailable**: search transport failed after retry
/// - **Grounding violation**: a generated candidate had no supporting evidence (log-only)
///
/// # Examples
///
/// ```
/// use sdk::errors::{ConciergeErrorExt, EngineError};
///
/// let error = EngineError::GenerationFormat("missing field `question`".to_string());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Configuration("TAVILY_API_KEY is not set".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation format error: {0}")]
    GenerationFormat(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Grounding violation: {url} is not in the retrieved evidence")]
    GroundingViolation { url: String },

    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConciergeErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Configuration(_) => {
                "Check your config.toml and that OPENAI_API_KEY / TAVILY_API_KEY are set"
            }
            Self::GenerationFormat(_) => "The assistant returned an unexpected answer. Try again",
            Self::SearchUnavailable(_) => {
                "Product search is unavailable right now. Check your network and try again"
            }
            Self::GroundingViolation { .. } => "Some suggestions were filtered for lack of evidence",
            Self::LLMProvider(_) => "Language model unavailable. Check your API keys and network",
            Self::Database(_) => "Preference storage failed. Your session was not saved",
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::SearchUnavailable(_))
    }
}

/// Session stage in which an error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Setup,
    Clarification,
    Research,
    Ranking,
    Memory,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Clarification => "clarification",
            Stage::Research => "research",
            Stage::Ranking => "ranking",
            Stage::Memory => "memory",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged with the stage in which it occurred
#[derive(Debug, Error)]
#[error("[{stage}] {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: EngineError,
}

impl StageError {
    pub fn new(stage: Stage, source: EngineError) -> Self {
        Self { stage, source }
    }
}

impl ConciergeErrorExt for StageError {
    fn user_hint(&self) -> &str {
        self.source.user_hint()
    }

    fn is_recoverable(&self) -> bool {
        self.source.is_recoverable()
    }
}
