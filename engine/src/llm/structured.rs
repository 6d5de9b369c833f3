//! Typed structured generation
//!
//! A structured call either yields a value of the requested type or a tagged
//! [`GenerationError`]. The reply is parsed directly first; stripping code
//! fences or prose around the JSON object is only a fallback. When neither
//! parses, the call is repeated once with a corrective message.

use super::{extract_json_payload, GenerationRequest, LLMError, LLMProvider, Message};
use sdk::errors::EngineError;
use serde::de::DeserializeOwned;

/// Failure of a generation call
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The reply did not conform to the requested schema after retry and fallback parsing
    #[error("{schema}: {detail}")]
    Format { schema: String, detail: String },

    #[error(transparent)]
    Provider(#[from] LLMError),
}

impl From<GenerationError> for EngineError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Format { .. } => EngineError::GenerationFormat(e.to_string()),
            GenerationError::Provider(inner) => EngineError::LLMProvider(inner.to_string()),
        }
    }
}

/// Parse a reply into `T`, falling back to the embedded JSON object.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, String> {
    let direct_error = match serde_json::from_str::<T>(reply.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    match extract_json_payload(reply) {
        Some(payload) => serde_json::from_str::<T>(payload).map_err(|e| e.to_string()),
        None => Err(direct_error),
    }
}

/// Request a schema-conformant value.
pub async fn generate_structured<T: DeserializeOwned>(
    llm: &dyn LLMProvider,
    request: &GenerationRequest,
) -> Result<T, GenerationError> {
    let schema = request.schema_name().unwrap_or("unnamed").to_string();

    let reply = llm.generate(request).await?;
    let detail = match parse_reply::<T>(&reply) {
        Ok(value) => return Ok(value),
        Err(detail) => detail,
    };

    tracing::debug!("Reply for {} did not parse ({}), asking again", schema, detail);

    let mut corrective = request.clone();
    corrective.messages.push(Message::assistant(reply));
    corrective.messages.push(Message::user(format!(
        "Your previous reply could not be parsed ({}). Reply again with only the JSON object, no prose and no code fences.",
        detail
    )));

    let retry_reply = llm.generate(&corrective).await?;
    parse_reply::<T>(&retry_reply).map_err(|detail| {
        tracing::warn!("Structured generation for {} failed: {}", schema, detail);
        GenerationError::Format { schema, detail }
    })
}

/// Request free text; an empty reply counts as a format failure.
pub async fn generate_text(
    llm: &dyn LLMProvider,
    request: &GenerationRequest,
) -> Result<String, GenerationError> {
    let reply = llm.generate(request).await?;
    let text = reply.trim();
    if text.is_empty() {
        return Err(GenerationError::Format {
            schema: "text".to_string(),
            detail: "empty reply".to_string(),
        });
    }
    Ok(text.to_string())
}
