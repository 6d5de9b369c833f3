//! Prompts and schema-free templates for the interview

use super::ClarifierSettings;
use crate::llm::{GenerationRequest, Message, OutputSchema};
use sdk::requirements::{RequirementSet, Slot, SlotValue};
use serde_json::json;

pub const QUESTION_SCHEMA: &str = "clarifier_question";
pub const INTERPRETATION_SCHEMA: &str = "slot_interpretation";

/// Templated question used when generation fails
pub fn template_question(slot: Slot, settings: &ClarifierSettings) -> String {
    match slot {
        Slot::Budget => format!(
            "What is the maximum budget you want to spend (in {})?",
            settings.currency
        ),
        Slot::PrimaryUse => "What is the main use-case for this purchase?".to_string(),
        Slot::Constraints => {
            "List any hard constraints (e.g., size, OS compatibility, weight, delivery timing)."
                .to_string()
        }
        Slot::PreferenceWeights => "Which factors matter most? (e.g., performance, portability, battery, price, sustainability)".to_string(),
    }
}

fn slot_focus(slot: Slot) -> &'static str {
    match slot {
        Slot::Budget => "the spending ceiling and whether it is firm",
        Slot::PrimaryUse => "what the product will mainly be used for",
        Slot::Constraints => "hard requirements the product must meet",
        Slot::PreferenceWeights => "which factors matter most when comparing options",
    }
}

fn describe_known(requirements: &RequirementSet) -> String {
    let mut lines = Vec::new();
    for slot in Slot::PRIORITY {
        match requirements.slot(slot) {
            Some(SlotValue::Resolved(value)) => lines.push(format!("- {}: {}", slot.label(), value)),
            Some(SlotValue::Unknown) => lines.push(format!("- {}: no preference", slot.label())),
            None => {}
        }
    }
    lines.join("\n")
}

/// Request for the next interview question
pub fn question_request(
    requirements: &RequirementSet,
    slot: Slot,
    settings: &ClarifierSettings,
) -> GenerationRequest {
    let system = Message::system(format!(
        "You are a personable but efficient shopping assistant for shoppers in {}.\n\
        Your job is to understand a shopper's true needs before suggesting products.\n\
        Ask exactly one targeted follow-up question. Reference what you already know.\n\
        Avoid repeating previous questions. Prices are in {}.",
        settings.target_market, settings.currency
    ));

    let mut lines = vec![format!("Product request: {}", requirements.topic), String::new()];
    if !requirements.transcript().is_empty() {
        lines.push("Conversation so far:".to_string());
        for turn in requirements.transcript() {
            lines.push(format!("- Q: {}", turn.question));
            lines.push(format!("  A: {}", turn.answer));
        }
        lines.push(String::new());
    }
    let known = describe_known(requirements);
    if !known.is_empty() {
        lines.push(format!("Known so far:\n{}", known));
        lines.push(String::new());
    }
    lines.push(format!(
        "Ask about {}: {}.",
        slot.label().to_lowercase(),
        slot_focus(slot)
    ));

    GenerationRequest::structured(
        vec![system, Message::user(lines.join("\n"))],
        OutputSchema::new(QUESTION_SCHEMA, json!({ "question": "string" })),
    )
}

/// Request to interpret a free-text answer for one slot
pub fn interpretation_request(
    topic: &str,
    slot: Slot,
    question: &str,
    answer: &str,
    settings: &ClarifierSettings,
) -> GenerationRequest {
    let system = Message::system(format!(
        "You turn a shopper's answer into structured requirements.\n\
        Only use what the shopper said. Amounts without a currency are in {}.\n\
        A budget is strict unless the shopper signals flexibility.\n\
        A constraint is hard only when the shopper says it is a must; give the words a product \
        description must contain to satisfy it as required_terms.\n\
        Preference weights are positive numbers, higher meaning more important; use spec-like \
        factor names such as battery_hours, weight_kg, price.",
        settings.currency
    ));

    let user = Message::user(format!(
        "Product request: {}\nRequirement: {}\nQuestion: {}\nAnswer: {}",
        topic,
        slot.as_str(),
        question,
        answer
    ));

    GenerationRequest::structured(
        vec![system, user],
        OutputSchema::new(
            INTERPRETATION_SCHEMA,
            json!({
                "value": "normalized answer text",
                "budget": { "max": "number or null", "currency": "string or null", "strict": "boolean" },
                "hard_constraints": [{ "label": "string", "required_terms": ["string"] }],
                "soft_constraints": ["string"],
                "weights": { "factor": "number" }
            }),
        ),
    )
}

/// Free-text summary request biased toward the target market
pub fn summary_request(requirements: &RequirementSet, settings: &ClarifierSettings) -> GenerationRequest {
    let mut resolved = serde_json::Map::new();
    for slot in Slot::PRIORITY {
        let value = match requirements.slot(slot) {
            Some(SlotValue::Resolved(value)) => json!(value),
            _ => json!("unknown"),
        };
        resolved.insert(slot.as_str().to_string(), value);
    }

    let system = Message::system(format!(
        "You are a {} market shopping concierge. Summarize the user's requirements succinctly, \
        emphasizing {} budget, {} availability, and key tradeoffs. Use at most five short lines.",
        settings.target_market, settings.currency, settings.target_market
    ));
    let user = Message::user(format!(
        "Product request: {}\nRequirements JSON: {}",
        requirements.topic,
        serde_json::Value::Object(resolved)
    ));

    GenerationRequest::text(vec![system, user])
}

/// Summary rendered without the language model
pub fn fallback_summary(requirements: &RequirementSet) -> String {
    let mut lines = vec![format!("Looking for: {}", requirements.topic)];
    for slot in Slot::PRIORITY {
        let value = requirements.resolved(slot).unwrap_or("unknown");
        lines.push(format!("- {}: {}", slot.label(), value));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ClarifierSettings {
        ClarifierSettings {
            max_turns: 6,
            target_market: "Switzerland".into(),
            currency: "CHF".into(),
        }
    }

    #[test]
    fn test_budget_template_uses_currency() {
        assert!(template_question(Slot::Budget, &settings()).contains("(in CHF)"));
    }

    #[test]
    fn test_question_request_mentions_history_and_slot() {
        let mut req = RequirementSet::new("laptop", "Switzerland", 6);
        req.record_turn(Some(Slot::Budget), "Budget?", "CHF 1200");
        req.resolve(Slot::Budget, "CHF 1200");

        let request = question_request(&req, Slot::PrimaryUse, &settings());
        assert_eq!(request.schema_name(), Some(QUESTION_SCHEMA));
        let user = &request.messages[1].content;
        assert!(user.contains("Product request: laptop"));
        assert!(user.contains("A: CHF 1200"));
        assert!(user.contains("Ask about primary use"));
    }

    #[test]
    fn test_summary_request_is_free_text_and_market_biased() {
        let req = RequirementSet::new("kettle", "Switzerland", 6);
        let request = summary_request(&req, &settings());
        assert!(request.schema.is_none());
        assert!(request.messages[0].content.contains("Switzerland market"));
        assert!(request.messages[1].content.contains("\"budget\":\"unknown\""));
    }

    #[test]
    fn test_fallback_summary_lists_every_slot() {
        let mut req = RequirementSet::new("kettle", "Switzerland", 6);
        req.resolve(Slot::Budget, "CHF 80");
        let summary = fallback_summary(&req);
        assert!(summary.contains("- Budget: CHF 80"));
        assert!(summary.contains("- Priorities: unknown"));
    }
}
