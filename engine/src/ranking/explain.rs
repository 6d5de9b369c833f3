//! Explanation prompts
//!
//! Rationales are generated per shortlisted item; the comparison tip once
//! over the whole shortlist. Both are optional: a failed call leaves the
//! recommendation without prose.

use crate::llm::structured::generate_structured;
use crate::llm::{GenerationRequest, LLMProvider, Message, OutputSchema};
use sdk::requirements::{RequirementSet, Slot};
use sdk::types::{Rationale, Recommendation};
use serde::Deserialize;
use serde_json::json;

pub const RATIONALE_SCHEMA: &str = "recommendation_rationale";
pub const COMPARISON_SCHEMA: &str = "comparison_tip";

const MAX_POINTS: usize = 3;

#[derive(Debug, Deserialize)]
struct ComparisonTip {
    #[serde(default)]
    tip: String,
}

fn shopper_line(requirements: &RequirementSet) -> String {
    Slot::PRIORITY
        .iter()
        .filter_map(|slot| {
            requirements
                .resolved(*slot)
                .map(|value| format!("{}: {}", slot.label(), value))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe(recommendation: &Recommendation) -> String {
    let specs = recommendation
        .specs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} | price: {} | specs: {} | note: {}",
        recommendation.name,
        recommendation
            .price
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        if specs.is_empty() { "none" } else { &specs },
        recommendation.fit_note
    )
}

pub fn rationale_request(
    recommendation: &Recommendation,
    requirements: &RequirementSet,
) -> GenerationRequest {
    let system = format!(
        "You explain product recommendations to a shopper in {}. \
        Give at most {} short highlights and at most {} watch-outs grounded in the listed specs, \
        and one sentence saying who the product is best for. Do not invent specs.",
        requirements.target_market, MAX_POINTS, MAX_POINTS
    );
    let user = format!(
        "Request: {}\nShopper: {}\nProduct: {}",
        requirements.topic,
        shopper_line(requirements),
        describe(recommendation)
    );
    GenerationRequest::structured(
        vec![Message::system(system), Message::user(user)],
        OutputSchema::new(
            RATIONALE_SCHEMA,
            json!({
                "highlights": ["string"],
                "watch_outs": ["string"],
                "best_for": "string"
            }),
        ),
    )
}

pub fn comparison_request(
    shortlist: &[Recommendation],
    requirements: &RequirementSet,
) -> GenerationRequest {
    let items = shortlist
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, describe(r)))
        .collect::<Vec<_>>()
        .join("\n");
    GenerationRequest::structured(
        vec![
            Message::system(
                "Compare the shortlisted products in one practical tip that helps the shopper choose between them.",
            ),
            Message::user(format!(
                "Request: {}\nShopper: {}\nShortlist:\n{}",
                requirements.topic,
                shopper_line(requirements),
                items
            )),
        ],
        OutputSchema::new(COMPARISON_SCHEMA, json!({ "tip": "string" })),
    )
}

fn tidy(points: Vec<String>) -> Vec<String> {
    points
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .take(MAX_POINTS)
        .collect()
}

/// Explain one recommendation; an empty rationale on failure.
pub async fn explain(
    llm: &dyn LLMProvider,
    recommendation: &Recommendation,
    requirements: &RequirementSet,
) -> Rationale {
    let request = rationale_request(recommendation, requirements);
    match generate_structured::<Rationale>(llm, &request).await {
        Ok(rationale) => Rationale {
            highlights: tidy(rationale.highlights),
            watch_outs: tidy(rationale.watch_outs),
            best_for: rationale.best_for.trim().to_string(),
        },
        Err(e) => {
            tracing::warn!("No rationale for '{}': {}", recommendation.name, e);
            Rationale::default()
        }
    }
}

/// One tip across the shortlist; `None` on failure or for fewer than two items.
pub async fn comparison_tip(
    llm: &dyn LLMProvider,
    shortlist: &[Recommendation],
    requirements: &RequirementSet,
) -> Option<String> {
    if shortlist.len() < 2 {
        return None;
    }
    let request = comparison_request(shortlist, requirements);
    match generate_structured::<ComparisonTip>(llm, &request).await {
        Ok(reply) => Some(reply.tip.trim().to_string()).filter(|tip| !tip.is_empty()),
        Err(e) => {
            tracing::warn!("No comparison tip: {}", e);
            None
        }
    }
}
