//! Integration tests for the Tavily search provider and the search client
//!
//! The Tavily API is replaced by a wiremock server.

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use concierge_engine::config::SearchConfig;
use concierge_engine::search::{
    tavily::TavilyProvider, SearchClient, SearchDepth, SearchError, SearchProvider, SearchQuery,
};
use concierge_engine::secrets::{SecretCache, SecretManager};
use sdk::errors::EngineError;

fn search_config(base_url: String) -> SearchConfig {
    SearchConfig {
        base_url,
        request_timeout_secs: 5,
        retry_backoff_ms: 10,
        ..Default::default()
    }
}

fn secrets_with_key() -> Arc<SecretCache> {
    Arc::new(SecretCache::new(Arc::new(SecretManager::from_lookup(
        "test",
        |name| (name == "TAVILY_API_KEY").then(|| "tvly-test".to_string()),
    ))))
}

fn tavily_body() -> serde_json::Value {
    json!({
        "query": "robot vacuum buy Switzerland",
        "results": [
            {
                "title": "Roborock S8 review",
                "url": "https://www.example.ch/roborock-s8/?utm_source=feed",
                "content": "The S8 handles carpets and pet hair well."
            },
            {
                "title": "",
                "url": "https://shop.example.ch/dreame-l10",
                "content": "Dreame L10s Ultra, CHF 699"
            },
            {
                "title": "No link",
                "content": "dropped because it has no URL"
            }
        ]
    })
}

#[tokio::test]
async fn test_tavily_search_maps_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "api_key": "tvly-test",
            "query": "robot vacuum buy Switzerland",
            "search_depth": "basic",
            "max_results": 5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = TavilyProvider::new(&search_config(server.uri()), secrets_with_key());
    let hits = provider
        .search(
            &SearchQuery::new("robot vacuum buy Switzerland", SearchDepth::Basic),
            5,
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].title, "Roborock S8 review");
    assert_eq!(hits[1].title, "Untitled result");
    assert_eq!(hits[1].snippet, "Dreame L10s Ultra, CHF 699");
    assert!(hits[2].url.is_empty());
}

#[tokio::test]
async fn test_tavily_rejected_key_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let provider = TavilyProvider::new(&search_config(server.uri()), secrets_with_key());
    let result = provider
        .search(&SearchQuery::new("kettle", SearchDepth::Basic), 5)
        .await;

    assert!(matches!(result, Err(SearchError::Authentication(_))));
}

#[tokio::test]
async fn test_tavily_missing_key_never_calls_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(0)
        .mount(&server)
        .await;

    let secrets = Arc::new(SecretCache::new(Arc::new(SecretManager::from_lookup(
        "test",
        |_| None,
    ))));
    let provider = TavilyProvider::new(&search_config(server.uri()), secrets);
    let result = provider
        .search(&SearchQuery::new("kettle", SearchDepth::Basic), 5)
        .await;

    match result {
        Err(SearchError::Authentication(msg)) => assert!(msg.contains("TAVILY_API_KEY")),
        other => panic!("Expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_client_retries_server_error_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = search_config(server.uri());
    let provider = Arc::new(TavilyProvider::new(&config, secrets_with_key()));
    let client = SearchClient::from_config(provider, &config);

    let results = client
        .run_all(&[SearchQuery::new("robot vacuum", SearchDepth::Basic)])
        .await
        .unwrap();

    // Normalized, deduplicated and URL-less hits dropped
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, "https://www.example.ch/roborock-s8");
    assert_eq!(results[0].source_query, "robot vacuum");
}

#[tokio::test]
async fn test_search_client_all_queries_failing_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = search_config(server.uri());
    let provider = Arc::new(TavilyProvider::new(&config, secrets_with_key()));
    let client = SearchClient::from_config(provider, &config);

    let result = client
        .run_all(&[
            SearchQuery::new("robot vacuum", SearchDepth::Basic),
            SearchQuery::new("robot vacuum review", SearchDepth::Basic),
        ])
        .await;

    match result {
        Err(EngineError::SearchUnavailable(msg)) => assert!(msg.contains("all 2 queries")),
        other => panic!("Expected SearchUnavailable, got {:?}", other),
    }
}
