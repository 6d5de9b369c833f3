//! Integration tests for Ollama provider
//!
//! These tests verify the Ollama provider implementation.
//! Note: These tests do NOT require a running Ollama instance.
//! They test the provider's public behavior and error handling.

use concierge_engine::llm::{
    ollama::OllamaProvider, GenerationRequest, LLMError, LLMProvider, Message,
};

#[tokio::test]
async fn test_ollama_provider_properties() {
    let provider = OllamaProvider::new("http://localhost:11434", "llama3.1:8b");

    assert_eq!(provider.name(), "ollama");
    assert!(provider.is_local());
    assert_eq!(provider.estimated_cost(1000), 0.0);
    assert_eq!(provider.estimated_cost(100000), 0.0);
}

#[tokio::test]
async fn test_ollama_connection_error() {
    // Use an invalid port to ensure connection fails
    let provider = OllamaProvider::new("http://localhost:99999", "llama3.1:8b");
    let request = GenerationRequest::text(vec![Message::user("Hello")]);

    let result = provider.generate(&request).await;

    match result.unwrap_err() {
        LLMError::ProviderUnavailable(msg) => {
            assert!(msg.contains("Cannot connect to Ollama"));
        }
        LLMError::NetworkError(_) => {
            // Also acceptable - an invalid port can fail before connecting
        }
        other => panic!(
            "Expected ProviderUnavailable or NetworkError, got: {:?}",
            other
        ),
    }
}

#[tokio::test]
async fn test_ollama_unreachable_is_unhealthy() {
    let provider = OllamaProvider::new("http://localhost:99999", "llama3.1:8b");
    assert!(!provider.check_health().await);
}
