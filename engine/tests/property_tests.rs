use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

use concierge_engine::clarifier::{Clarifier, ClarifierSettings, ClarifierState, Prompt};
use concierge_engine::config::Config;
use concierge_engine::llm::{GenerationRequest, LLMError, LLMProvider};
use concierge_engine::ranking::RankingEngine;
use concierge_engine::research::candidates::Candidate;
use concierge_engine::research::grounding::{GroundedCandidate, GroundingFilter};
use concierge_engine::research::query::craft_queries;
use concierge_engine::search::{normalize_url, SearchDepth, SearchResult};
use sdk::requirements::{Constraint, RequirementSet, Slot};
use sdk::types::{Price, SpecValue};

/// Language model that is never reachable
struct Offline;

#[async_trait]
impl LLMProvider for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_local(&self) -> bool {
        true
    }

    fn estimated_cost(&self, _tokens: usize) -> f64 {
        0.0
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, LLMError> {
        Err(LLMError::ProviderUnavailable("offline".to_string()))
    }
}

fn result(url: &str) -> SearchResult {
    SearchResult {
        title: url.to_string(),
        url: normalize_url(url),
        snippet: String::new(),
        source_query: "q".to_string(),
    }
}

// Configuration survives a TOML round trip
proptest! {
    #[test]
    fn test_config_parsing_round_trip(
        log_level in "error|warn|info|debug|trace",
        default_provider in "ollama|openai|anthropic",
        max_turns in 1u32..=20,
        recommendation_count in 1usize..=10,
        retention_days in 1u32..=365,
        enabled in any::<bool>(),
    ) {
        let mut config = Config::default_config();
        config.core.log_level = log_level;
        config.llm.default_provider = default_provider;
        config.assistant.max_turns = max_turns;
        config.assistant.recommendation_count = recommendation_count;
        config.memory.retention_days = retention_days;
        config.memory.enabled = enabled;
        prop_assert!(config.validate().is_ok());

        let serialized = toml::to_string_pretty(&config).expect("Failed to serialize config");
        let parsed = Config::from_toml_str(&serialized).expect("Failed to parse config");

        prop_assert_eq!(parsed.core.log_level, config.core.log_level);
        prop_assert_eq!(parsed.llm.default_provider, config.llm.default_provider);
        prop_assert_eq!(parsed.assistant.max_turns, max_turns);
        prop_assert_eq!(parsed.assistant.recommendation_count, recommendation_count);
        prop_assert_eq!(parsed.memory.retention_days, retention_days);
        prop_assert_eq!(parsed.memory.enabled, enabled);
    }
}

// Normalizing a URL twice changes nothing
proptest! {
    #[test]
    fn test_url_normalization_idempotent(
        host in "[a-zA-Z]{1,10}\\.(ch|com|de)",
        path in "(/[a-zA-Z0-9-]{1,8}){0,3}/?",
        query in "(\\?(utm_source=x&)?id=[0-9]{1,4}(&gclid=abc)?)?",
    ) {
        let url = format!("https://{}{}{}", host, path, query);
        let once = normalize_url(&url);
        prop_assert_eq!(normalize_url(&once), once.clone());
        prop_assert!(!once.contains("utm_source"));
        prop_assert!(!once.contains("gclid"));
    }
}

// Queries depend only on the requirement snapshot
proptest! {
    #[test]
    fn test_query_crafting_is_pure(
        topic in "[a-z]{3,10}( [a-z]{3,10})?",
        primary_use in proptest::option::of("[a-z]{3,12}"),
        soft in proptest::collection::vec("[a-z]{3,8}", 0..3),
        weights in proptest::collection::btree_map("[a-z]{3,8}", 0.1f64..5.0, 0..4),
    ) {
        let mut req = RequirementSet::new(topic, "Switzerland", 6);
        if let Some(primary_use) = primary_use {
            req.resolve(Slot::PrimaryUse, primary_use);
        }
        req.set_constraints(soft.into_iter().map(Constraint::soft).collect());
        let has_weights = !weights.is_empty();
        req.set_preference_weights(weights);
        let snapshot = req.clone();

        let first = craft_queries(&req, SearchDepth::Basic);
        let second = craft_queries(&req, SearchDepth::Basic);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(req, snapshot);
        prop_assert_eq!(first.len(), if has_weights { 2 } else { 1 });
        prop_assert!(first.iter().all(|q| q.text.ends_with("Switzerland")));
    }
}

// Every candidate is either accepted or counted as rejected, and accepted
// ones always point at retrieved evidence
proptest! {
    #[test]
    fn test_grounding_accounts_for_every_candidate(
        retrieved in proptest::collection::vec(0usize..8, 0..6),
        proposed in proptest::collection::vec(0usize..12, 0..10),
    ) {
        let results: Vec<SearchResult> = retrieved
            .iter()
            .map(|i| result(&format!("https://shop.ch/p{}", i)))
            .collect();
        let candidates: Vec<Candidate> = proposed
            .iter()
            .map(|i| Candidate::new(format!("p{}", i), format!("https://SHOP.ch/p{}/", i)))
            .collect();
        let input = candidates.len();

        let filter = GroundingFilter::new(&results);
        let report = filter.filter(candidates);

        prop_assert_eq!(report.accepted.len() + report.rejected, input);
        for grounded in &report.accepted {
            prop_assert!(results.iter().any(|r| r.url == grounded.evidence_url));
        }
    }
}

fn grounded(index: usize, price: Option<f64>, battery: Option<f64>) -> GroundedCandidate {
    let mut candidate = Candidate::new(format!("c{}", index), format!("https://shop.ch/c{}", index));
    candidate.price = price.map(|amount| Price {
        amount,
        currency: Some("CHF".to_string()),
    });
    if let Some(hours) = battery {
        candidate
            .specs
            .insert("battery_hours".to_string(), SpecValue::Number(hours));
    }
    GroundedCandidate {
        evidence_url: candidate.url.clone(),
        candidate,
        retrieval_rank: index,
    }
}

// Ranking the same candidates twice gives the same order, sorted by score
proptest! {
    #[test]
    fn test_ranking_is_deterministic(
        specs in proptest::collection::vec(
            (proptest::option::of(50.0f64..2000.0), proptest::option::of(1.0f64..30.0)),
            0..8,
        ),
        price_weight in 0.0f64..3.0,
        battery_weight in 0.0f64..3.0,
    ) {
        let candidates: Vec<GroundedCandidate> = specs
            .iter()
            .enumerate()
            .map(|(i, (price, battery))| grounded(i, *price, *battery))
            .collect();
        let mut req = RequirementSet::new("laptop", "Switzerland", 6);
        req.set_preference_weights(BTreeMap::from([
            ("price".to_string(), price_weight),
            ("battery_hours".to_string(), battery_weight),
        ]));

        let engine = RankingEngine::new(Arc::new(Offline), 10);
        let (first, _) = engine.order(candidates.clone(), &req);
        let (second, _) = engine.order(candidates, &req);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), specs.len());
        for pair in first.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}

// Whatever the shopper types, the interview stays within its turn budget
// and always reaches confirmation
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn test_interview_respects_turn_limit(
        max_turns in 1u32..8,
        replies in proptest::collection::vec("skip|done|CHF [0-9]{2,4}|quiet|edit budget|yes", 1..20),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let mut clarifier = Clarifier::new(
                Arc::new(Offline),
                ClarifierSettings {
                    max_turns,
                    target_market: "Switzerland".to_string(),
                    currency: "CHF".to_string(),
                },
            );
            clarifier.start("headphones", &[]);

            for reply in &replies {
                if clarifier.next_prompt().await == Prompt::Finished {
                    break;
                }
                clarifier.ingest(reply).await;
                prop_assert!(clarifier.requirements().turn() <= max_turns);
            }

            // A shopper who only confirms from here on finishes the interview
            for _ in 0..=(2 * max_turns) {
                if clarifier.state() == ClarifierState::Done {
                    break;
                }
                match clarifier.next_prompt().await {
                    Prompt::Question { .. } => clarifier.ingest("done").await,
                    _ => clarifier.ingest("yes").await,
                };
            }
            prop_assert_eq!(clarifier.state(), ClarifierState::Done);
            prop_assert!(clarifier.requirements().turn() <= max_turns);
            Ok(())
        })?;
    }
}
