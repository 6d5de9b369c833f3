//! Ranking and explanation
//!
//! Turns grounded candidates into an ordered shortlist of recommendations:
//!
//! 1. hard constraints remove candidates outright ([`constraints`])
//! 2. survivors are scored against the preference weights ([`scorer`])
//! 3. the top N are explained, plus one comparison tip ([`explain`])
//!
//! Ordering is score descending, ties broken by retrieval rank and then by
//! generation order. Explanation failures never block the ranking.

pub mod constraints;
pub mod explain;
pub mod scorer;

use crate::config::AssistantConfig;
use crate::llm::LLMProvider;
use crate::research::grounding::GroundedCandidate;
use sdk::requirements::RequirementSet;
use sdk::types::{Rationale, Recommendation};
use std::sync::Arc;

/// Ordered, explained recommendations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedShortlist {
    pub recommendations: Vec<Recommendation>,
    pub comparison_tip: Option<String>,
    /// Candidates removed by hard constraints
    pub constraint_violations: usize,
}

pub struct RankingEngine {
    llm: Arc<dyn LLMProvider>,
    recommendation_count: usize,
}

impl RankingEngine {
    pub fn new(llm: Arc<dyn LLMProvider>, recommendation_count: usize) -> Self {
        Self {
            llm,
            recommendation_count: recommendation_count.max(1),
        }
    }

    pub fn from_config(llm: Arc<dyn LLMProvider>, config: &AssistantConfig) -> Self {
        Self::new(llm, config.recommendation_count)
    }

    /// Filter and order candidates without calling the language model.
    pub fn order(
        &self,
        candidates: Vec<GroundedCandidate>,
        requirements: &RequirementSet,
    ) -> (Vec<Recommendation>, usize) {
        let (survivors, removed) = constraints::apply_hard_constraints(candidates, requirements);

        let refs: Vec<_> = survivors.iter().map(|g| &g.candidate).collect();
        let scores = scorer::score_all(&refs, requirements.preference_weights());

        let mut scored: Vec<(f64, GroundedCandidate)> = scores.into_iter().zip(survivors).collect();
        // Stable: equal score and rank keep generation order
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.retrieval_rank.cmp(&b.1.retrieval_rank))
        });
        scored.truncate(self.recommendation_count);

        let recommendations = scored
            .into_iter()
            .map(|(score, grounded)| {
                let candidate = grounded.candidate;
                Recommendation {
                    name: candidate.name,
                    url: candidate.url,
                    evidence_url: grounded.evidence_url,
                    price: candidate.price,
                    specs: candidate.specs,
                    score,
                    fit_note: candidate.rationale,
                    available_in_market: candidate.available_in_market,
                    rationale: Rationale::default(),
                }
            })
            .collect();

        (recommendations, removed)
    }

    /// Rank, truncate to the configured count and explain.
    pub async fn rank(
        &self,
        candidates: Vec<GroundedCandidate>,
        requirements: &RequirementSet,
    ) -> RankedShortlist {
        let input = candidates.len();
        let (mut recommendations, constraint_violations) = self.order(candidates, requirements);

        for recommendation in &mut recommendations {
            recommendation.rationale =
                explain::explain(self.llm.as_ref(), recommendation, requirements).await;
        }
        let comparison_tip =
            explain::comparison_tip(self.llm.as_ref(), &recommendations, requirements).await;

        tracing::info!(
            "Ranked {} candidates: {} removed by hard constraints, {} recommended",
            input,
            constraint_violations,
            recommendations.len()
        );

        RankedShortlist {
            recommendations,
            comparison_tip,
            constraint_violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationRequest, LLMError};
    use crate::research::candidates::Candidate;
    use async_trait::async_trait;
    use sdk::types::SpecValue;
    use std::collections::BTreeMap;

    struct Explainer {
        fail: bool,
    }

    #[async_trait]
    impl LLMProvider for Explainer {
        fn name(&self) -> &str {
            "explainer"
        }

        fn is_local(&self) -> bool {
            true
        }

        fn estimated_cost(&self, _tokens: usize) -> f64 {
            0.0
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, LLMError> {
            if self.fail {
                return Err(LLMError::ProviderUnavailable("down".into()));
            }
            match request.schema_name() {
                Some(explain::RATIONALE_SCHEMA) => Ok(r#"{"highlights": ["Long battery", " "], "watch_outs": ["Glossy"], "best_for": "Travellers"}"#.into()),
                Some(explain::COMPARISON_SCHEMA) => Ok("```json\n{\"tip\": \"Pick A for battery\"}\n```".into()),
                _ => Err(LLMError::InvalidRequest("unexpected".into())),
            }
        }

        async fn check_health(&self) -> bool {
            !self.fail
        }
    }

    fn grounded(name: &str, battery: f64, rank: usize) -> GroundedCandidate {
        let mut candidate = Candidate::new(name, format!("https://shop.ch/{}", name));
        candidate
            .specs
            .insert("battery_hours".into(), SpecValue::Number(battery));
        GroundedCandidate {
            evidence_url: candidate.url.clone(),
            candidate,
            retrieval_rank: rank,
        }
    }

    fn requirements() -> RequirementSet {
        let mut req = RequirementSet::new("laptop", "Switzerland", 6);
        let mut weights = BTreeMap::new();
        weights.insert("battery".to_string(), 1.0);
        req.set_preference_weights(weights);
        req
    }

    #[test]
    fn test_order_by_score_then_retrieval_rank() {
        let engine = RankingEngine::new(Arc::new(Explainer { fail: false }), 3);
        let (ranked, removed) = engine.order(
            vec![
                grounded("low", 5.0, 0),
                grounded("tie-late", 10.0, 3),
                grounded("tie-early", 10.0, 1),
                grounded("mid", 7.5, 2),
            ],
            &requirements(),
        );
        assert_eq!(removed, 0);
        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["tie-early", "tie-late", "mid"]);
    }

    #[tokio::test]
    async fn test_rank_explains_shortlist() {
        let engine = RankingEngine::new(Arc::new(Explainer { fail: false }), 2);
        let shortlist = engine
            .rank(
                vec![grounded("a", 12.0, 0), grounded("b", 8.0, 1), grounded("c", 4.0, 2)],
                &requirements(),
            )
            .await;

        assert_eq!(shortlist.recommendations.len(), 2);
        let first = &shortlist.recommendations[0];
        assert_eq!(first.rationale.highlights, vec!["Long battery".to_string()]);
        assert_eq!(first.rationale.best_for, "Travellers");
        assert_eq!(shortlist.comparison_tip.as_deref(), Some("Pick A for battery"));
    }

    #[tokio::test]
    async fn test_explanation_failure_keeps_ranking() {
        let engine = RankingEngine::new(Arc::new(Explainer { fail: true }), 3);
        let shortlist = engine
            .rank(vec![grounded("a", 12.0, 0), grounded("b", 8.0, 1)], &requirements())
            .await;

        assert_eq!(shortlist.recommendations.len(), 2);
        assert!(shortlist.recommendations.iter().all(|r| r.rationale.is_empty()));
        assert!(shortlist.recommendations[0].score > shortlist.recommendations[1].score);
        assert!(shortlist.comparison_tip.is_none());
    }
}
