//! Tavily search provider

use super::{SearchError, SearchHit, SearchProvider, SearchQuery};
use crate::config::SearchConfig;
use crate::secrets::{SecretCache, TAVILY_API_KEY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct TavilyProvider {
    base_url: String,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl From<TavilyResult> for SearchHit {
    fn from(r: TavilyResult) -> Self {
        SearchHit {
            title: r
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled result".to_string()),
            url: r.url.unwrap_or_default(),
            snippet: r.content.or(r.snippet).unwrap_or_default(),
        }
    }
}

impl TavilyProvider {
    pub fn new(config: &SearchConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_cache,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &SearchQuery,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let api_key = self
            .secret_cache
            .get_secret(TAVILY_API_KEY)
            .map_err(|e| SearchError::Authentication(e.to_string()))?;

        let body = TavilyRequest {
            api_key: api_key.unsecure(),
            query: &query.text,
            search_depth: query.depth.as_str(),
            max_results,
            include_images: false,
        };

        tracing::debug!("Tavily search: '{}' (depth={})", query.text, query.depth);

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => SearchError::Authentication(text),
                code => SearchError::Status {
                    status: code,
                    body: text,
                },
            });
        }

        let payload: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(payload.results.into_iter().map(SearchHit::from).collect())
    }
}
