//! Candidate generation from retrieved evidence

use crate::clarifier::input::parse_budget;
use crate::llm::{GenerationRequest, Message, OutputSchema};
use crate::search::SearchResult;
use sdk::requirements::{RequirementSet, Slot};
use sdk::types::{Price, SpecValue};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const CANDIDATE_SCHEMA: &str = "candidate_list";

/// Snippet characters included per result
const SNIPPET_CHARS: usize = 400;

/// A proposed product; transient between generation and grounding
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    pub price: Option<Price>,
    pub specs: BTreeMap<String, SpecValue>,
    /// Generated rationale fragment
    pub rationale: String,
    pub available_in_market: Option<bool>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            price: None,
            specs: BTreeMap::new(),
            rationale: String::new(),
            available_in_market: None,
        }
    }
}

/// Candidate list as generated; items are converted one at a time so a
/// malformed entry only costs itself.
#[derive(Debug, Deserialize)]
pub(crate) struct CandidateList {
    #[serde(default)]
    candidates: Option<Vec<Value>>,
}

impl CandidateList {
    /// Convert every item, returning the usable candidates and the number of
    /// items that could not be read.
    pub(crate) fn into_candidates(self) -> (Vec<Candidate>, usize) {
        let mut candidates = Vec::new();
        let mut malformed = 0;
        for item in self.candidates.unwrap_or_default() {
            match serde_json::from_value::<RawCandidate>(item) {
                Ok(raw) => candidates.push(Candidate::from(raw)),
                Err(e) => {
                    tracing::debug!("Dropping malformed candidate: {}", e);
                    malformed += 1;
                }
            }
        }
        (candidates, malformed)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawPrice {
    Amount(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCandidate {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    price: Option<RawPrice>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    specs: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    available_in_market: Option<Value>,
}

/// Comparable value of one spec entry; nulls and nested objects are skipped
/// and lists collapse into text.
fn spec_value(value: Value) -> Option<SpecValue> {
    match value {
        Value::Number(n) => n.as_f64().map(SpecValue::Number),
        Value::Bool(b) => Some(SpecValue::Flag(b)),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| SpecValue::Text(s.to_string()))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(spec_value)
                .map(|item| item.to_string())
                .collect();
            (!parts.is_empty()).then(|| SpecValue::Text(parts.join(", ")))
        }
        Value::Null | Value::Object(_) => None,
    }
}

fn availability(value: Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" => Some(true),
            "false" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl From<RawCandidate> for Candidate {
    fn from(raw: RawCandidate) -> Self {
        let currency = raw
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        let price = match raw.price {
            Some(RawPrice::Amount(amount)) if amount.is_finite() && amount > 0.0 => Some(Price {
                amount,
                currency,
            }),
            Some(RawPrice::Text(text)) => parse_budget(&text, "").map(|parsed| Price {
                amount: parsed.max,
                currency: currency.or(parsed.currency.filter(|c| !c.is_empty())),
            }),
            _ => None,
        };

        Candidate {
            name: raw
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Unnamed product".to_string()),
            url: raw.url.unwrap_or_default().trim().to_string(),
            price,
            specs: raw
                .specs
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(key, value)| {
                    spec_value(value).map(|v| (key.trim().to_lowercase().replace(' ', "_"), v))
                })
                .collect(),
            rationale: raw.rationale.unwrap_or_default().trim().to_string(),
            available_in_market: raw.available_in_market.and_then(availability),
        }
    }
}

/// Render retrieved results for the prompt
pub fn format_evidence(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let snippet: String = result
                .snippet
                .replace('\n', " ")
                .trim()
                .chars()
                .take(SNIPPET_CHARS)
                .collect();
            format!("[{}] {} ({}) :: {}", i + 1, result.title, result.url, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_requirements(requirements: &RequirementSet) -> String {
    let mut lines = Vec::new();
    for slot in Slot::PRIORITY {
        lines.push(format!(
            "- {}: {}",
            slot.label(),
            requirements.resolved(slot).unwrap_or("unknown")
        ));
    }
    if let Some(budget) = requirements.budget() {
        lines.push(format!(
            "- Budget ceiling: {} {}{}",
            budget.currency.as_deref().unwrap_or(""),
            budget.max,
            if budget.strict { " (firm)" } else { " (flexible)" }
        ));
    }
    lines.join("\n")
}

/// Candidate generation request.
///
/// `strict` is used for the single retry after nothing could be grounded.
pub fn candidate_request(
    requirements: &RequirementSet,
    evidence: &[SearchResult],
    count: usize,
    currency: &str,
    strict: bool,
) -> GenerationRequest {
    let mut system = format!(
        "You are a shopping expert turning live web research into product candidates.\n\
        Use the shopper profile and search results to pick concrete products available now in {market}.\n\
        Requirements:\n\
        - Propose up to {count} products.\n\
        - Every product must use the exact URL of one of the numbered search results.\n\
        - Give price as a number and its currency (prefer {currency}); use null when unknown.\n\
        - specs holds comparable values: numbers with units in the key (battery_hours, weight_kg), booleans for features.\n\
        - rationale is one sentence on why the product fits.\n\
        - available_in_market is true only when the evidence shows the product sold in {market}.\n\
        - When evidence is weak, leave fields null rather than inventing details.",
        market = requirements.target_market,
        count = count,
        currency = currency,
    );
    if strict {
        system.push_str(
            "\n\nIMPORTANT: your previous candidates could not be matched to the search results. \
            Copy each url character for character from the list below. Do not propose any product \
            that does not have its own result in the list.",
        );
    }

    let user = format!(
        "Product request: {}\n\nShopper profile:\n{}\n\nSearch results:\n{}",
        requirements.topic,
        describe_requirements(requirements),
        format_evidence(evidence)
    );

    GenerationRequest::structured(
        vec![Message::system(system), Message::user(user)],
        OutputSchema::new(
            CANDIDATE_SCHEMA,
            json!({
                "candidates": [{
                    "name": "string",
                    "url": "string (from the search results)",
                    "price": "number or null",
                    "currency": "string or null",
                    "specs": { "spec_name": "number | boolean | string" },
                    "rationale": "string",
                    "available_in_market": "boolean or null"
                }]
            }),
        ),
    )
}
