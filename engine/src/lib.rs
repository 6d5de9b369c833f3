//! Concierge Engine Library
//!
//! This library provides the core of the shopping concierge: the interview,
//! grounded product research, ranking and preference memory.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Timeout and retry policy for external calls
pub mod retry;

/// LLM provider abstraction layer
pub mod llm;

/// Web search abstraction layer
pub mod search;

/// Requirement interview state machine
pub mod clarifier;

/// Grounded product research
pub mod research;

/// Candidate ranking and explanation
pub mod ranking;

/// Database persistence module
pub mod db;

/// Preference memory
pub mod memory;

/// Session orchestration
pub mod session;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
