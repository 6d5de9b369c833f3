//! Search Port
//!
//! A [`SearchProvider`] turns a query plus a depth setting into ranked web
//! results. [`SearchClient`] runs the queries of one research pass
//! concurrently, bounds each call with a timeout and a single retry, and
//! merges the hits into normalized, de-duplicated [`SearchResult`]s.

pub mod normalize;
pub mod tavily;

use crate::config::SearchConfig;
use crate::retry::{retry_once, RetryPolicy, RetryableError};
use async_trait::async_trait;
use futures::future::join_all;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use normalize::normalize_url;

/// Search depth requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    #[default]
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

impl fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(SearchDepth::Basic),
            "advanced" => Ok(SearchDepth::Advanced),
            other => Err(format!(
                "Invalid search depth '{}'. Must be one of: basic, advanced",
                other
            )),
        }
    }
}

/// A query string plus its depth
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub depth: SearchDepth,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, depth: SearchDepth) -> Self {
        Self {
            text: text.into(),
            depth,
        }
    }
}

/// Raw hit as returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Normalized, immutable search evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Normalized URL
    pub url: String,
    pub snippet: String,
    /// Query that produced this result
    pub source_query: String,
}

/// Transport-level search failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RetryableError for SearchError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchError::Network(_) | SearchError::Timeout(_) => true,
            SearchError::Status { status, .. } => *status == 429 || *status >= 500,
            SearchError::Authentication(_) | SearchError::Parse(_) => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        SearchError::Timeout(after)
    }
}

/// Search provider contract. Empty results are a valid response.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &SearchQuery,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Bounded, concurrent access to a [`SearchProvider`]
#[derive(Clone)]
pub struct SearchClient {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    policy: RetryPolicy,
}

impl SearchClient {
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize, policy: RetryPolicy) -> Self {
        Self {
            provider,
            max_results,
            policy,
        }
    }

    pub fn from_config(provider: Arc<dyn SearchProvider>, config: &SearchConfig) -> Self {
        Self::new(
            provider,
            config.max_results,
            RetryPolicy::new(config.request_timeout(), config.retry_backoff()),
        )
    }

    /// Execute every query concurrently and merge the results.
    ///
    /// # Errors
    /// `EngineError::SearchUnavailable` when every query failed. Failures of
    /// individual queries are logged and their results are simply absent.
    pub async fn run_all(&self, queries: &[SearchQuery]) -> Result<Vec<SearchResult>, EngineError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let calls = queries.iter().map(|query| {
            let label = format!("search '{}'", query.text);
            async move {
                let outcome = retry_once(&label, self.policy, || {
                    self.provider.search(query, self.max_results)
                })
                .await;
                (query, outcome)
            }
        });

        let mut batches = Vec::new();
        let mut failures = Vec::new();
        for (query, outcome) in join_all(calls).await {
            match outcome {
                Ok(hits) => {
                    tracing::debug!("Query '{}' returned {} hits", query.text, hits.len());
                    batches.push((query.text.clone(), hits));
                }
                Err(e) => {
                    tracing::warn!("Query '{}' failed: {}", query.text, e);
                    failures.push(e.to_string());
                }
            }
        }

        if batches.is_empty() {
            return Err(EngineError::SearchUnavailable(format!(
                "{} failed all {} queries: {}",
                self.provider.name(),
                queries.len(),
                failures.join("; ")
            )));
        }

        let merged = merge_results(batches);
        tracing::info!(
            "Search produced {} unique results from {} queries",
            merged.len(),
            queries.len()
        );
        Ok(merged)
    }
}

/// Concatenate per-query hits in query order, keeping the first occurrence
/// of each normalized URL. Hits without a URL are dropped.
pub fn merge_results(batches: Vec<(String, Vec<SearchHit>)>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for (source_query, hits) in batches {
        for hit in hits {
            if hit.url.trim().is_empty() {
                continue;
            }
            let url = normalize_url(&hit.url);
            if !seen.insert(url.clone()) {
                continue;
            }
            merged.push(SearchResult {
                title: hit.title,
                url,
                snippet: hit.snippet,
                source_query: source_query.clone(),
            });
        }
    }

    merged
}
