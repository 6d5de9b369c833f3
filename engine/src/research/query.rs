//! Deterministic query crafting
//!
//! Queries are a pure function of the requirement snapshot and the depth
//! setting; the language model is not involved.

use crate::search::{SearchDepth, SearchQuery};
use sdk::requirements::{RequirementSet, Slot};

/// Most weighted factors mentioned in the review query
const MAX_FACTORS: usize = 3;

fn collapse(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Factors ordered by weight (descending), then name
pub fn top_factors(requirements: &RequirementSet, limit: usize) -> Vec<String> {
    let mut factors: Vec<(&String, &f64)> = requirements.preference_weights().iter().collect();
    factors.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    factors
        .into_iter()
        .take(limit)
        .map(|(name, _)| name.replace('_', " "))
        .collect()
}

/// Build at most two search queries.
///
/// - primary: topic, primary use, soft constraints, `buy`, target market
/// - secondary (only with preference weights): `best`, topic, top factors,
///   `review`, target market
pub fn craft_queries(requirements: &RequirementSet, depth: SearchDepth) -> Vec<SearchQuery> {
    let topic = requirements.topic.as_str();
    let market = requirements.target_market.as_str();

    let mut primary: Vec<&str> = vec![topic];
    if let Some(primary_use) = requirements.resolved(Slot::PrimaryUse) {
        primary.push(primary_use);
    }
    for constraint in requirements.constraints().iter().filter(|c| !c.hard) {
        primary.push(&constraint.label);
    }
    primary.push("buy");
    primary.push(market);

    let mut texts = vec![collapse(&primary)];

    let factors = top_factors(requirements, MAX_FACTORS);
    if !factors.is_empty() {
        let mut secondary: Vec<&str> = vec!["best", topic];
        secondary.extend(factors.iter().map(String::as_str));
        secondary.push("review");
        secondary.push(market);
        texts.push(collapse(&secondary));
    }

    texts.dedup();
    texts
        .into_iter()
        .filter(|text| !text.is_empty())
        .map(|text| SearchQuery::new(text, depth))
        .collect()
}
