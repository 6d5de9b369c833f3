//! Research Agent
//!
//! Turns a frozen requirement set into grounded recommendations:
//!
//! 1. craft search queries deterministically ([`query`])
//! 2. retrieve and merge results through the Search Port
//! 3. ask the language model for candidates built from those results ([`candidates`])
//! 4. keep only candidates whose URL was retrieved ([`grounding`]), retrying
//!    once with a stricter prompt when nothing survives
//! 5. hand the survivors to the [`RankingEngine`]
//!
//! The agent holds no state between calls. "No results" is an answer, not an
//! error; only search transport failures are surfaced.

pub mod candidates;
pub mod grounding;
pub mod query;

use crate::config::Config;
use crate::llm::structured::generate_structured;
use crate::llm::LLMProvider;
use crate::ranking::RankingEngine;
use crate::search::{SearchClient, SearchDepth, SearchQuery, SearchResult};
use candidates::{candidate_request, Candidate, CandidateList};
use grounding::{GroundingFilter, GroundingReport};
use sdk::errors::EngineError;
use sdk::requirements::RequirementSet;
use sdk::types::Recommendation;
use serde::Serialize;
use std::sync::Arc;

/// Extra candidates requested beyond the recommendation count, so grounding
/// drops still leave a full shortlist.
const CANDIDATE_HEADROOM: usize = 2;

#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub depth: SearchDepth,
    pub recommendation_count: usize,
    pub currency: String,
}

impl From<&Config> for ResearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            depth: config.search.depth,
            recommendation_count: config.assistant.recommendation_count,
            currency: config.assistant.currency.clone(),
        }
    }
}

/// Result of a research pass, as shown to the shopper
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearchOutcome {
    pub recommendations: Vec<Recommendation>,
    /// Candidates proposed across all generation attempts
    pub generated_count: usize,
    /// Candidates dropped for lack of evidence
    pub dropped_count: usize,
    /// Nothing could be grounded in the retrieved evidence
    pub no_grounded_matches: bool,
    pub comparison_tip: Option<String>,
    pub evidence_count: usize,
    pub queries: Vec<String>,
}

/// Everything before ranking
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub queries: Vec<SearchQuery>,
    pub evidence: Vec<SearchResult>,
    pub report: GroundingReport,
    pub generated_count: usize,
    pub dropped_count: usize,
}

pub struct ResearchAgent {
    llm: Arc<dyn LLMProvider>,
    search: SearchClient,
    ranking: RankingEngine,
    settings: ResearchSettings,
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        search: SearchClient,
        ranking: RankingEngine,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            llm,
            search,
            ranking,
            settings,
        }
    }

    async fn generate_candidates(
        &self,
        requirements: &RequirementSet,
        evidence: &[SearchResult],
        strict: bool,
    ) -> (Vec<Candidate>, usize) {
        let request = candidate_request(
            requirements,
            evidence,
            self.settings.recommendation_count + CANDIDATE_HEADROOM,
            &self.settings.currency,
            strict,
        );
        match generate_structured::<CandidateList>(self.llm.as_ref(), &request).await {
            Ok(list) => list.into_candidates(),
            Err(e) => {
                tracing::warn!(
                    "Candidate generation failed{}: {}",
                    if strict { " (strict)" } else { "" },
                    e
                );
                (Vec::new(), 0)
            }
        }
    }

    /// Retrieve evidence and produce grounded candidates.
    ///
    /// # Errors
    /// `EngineError::SearchUnavailable` when every search query failed.
    pub async fn gather(&self, requirements: &RequirementSet) -> Result<Gathered, EngineError> {
        let queries = query::craft_queries(requirements, self.settings.depth);
        tracing::info!("Researching '{}' with {} queries", requirements.topic, queries.len());

        let evidence = self.search.run_all(&queries).await?;
        let mut gathered = Gathered {
            queries,
            ..Default::default()
        };

        if evidence.is_empty() {
            tracing::info!("No search results; skipping candidate generation");
            return Ok(gathered);
        }

        let filter = GroundingFilter::new(&evidence);
        for strict in [false, true] {
            let (proposed, malformed) = self
                .generate_candidates(requirements, &evidence, strict)
                .await;
            gathered.generated_count += proposed.len() + malformed;

            let report = filter.filter(proposed);
            gathered.dropped_count += report.rejected + malformed;
            tracing::info!(
                "Grounding kept {} of {} candidates{}",
                report.accepted.len(),
                report.accepted.len() + report.rejected + malformed,
                if strict { " on strict retry" } else { "" }
            );

            let grounded = !report.accepted.is_empty();
            gathered.report = report;
            if grounded {
                break;
            }
        }

        gathered.evidence = evidence;
        Ok(gathered)
    }

    /// Recommend products for a completed requirement set.
    ///
    /// # Errors
    /// Only search transport failures; an empty recommendation list comes
    /// with `no_grounded_matches` set.
    pub async fn recommend(&self, requirements: RequirementSet) -> Result<ResearchOutcome, EngineError> {
        let gathered = self.gather(&requirements).await?;

        let mut outcome = ResearchOutcome {
            generated_count: gathered.generated_count,
            dropped_count: gathered.dropped_count,
            evidence_count: gathered.evidence.len(),
            queries: gathered.queries.iter().map(|q| q.text.clone()).collect(),
            ..Default::default()
        };

        if gathered.report.accepted.is_empty() {
            tracing::info!("No grounded matches for '{}'", requirements.topic);
            outcome.no_grounded_matches = true;
            return Ok(outcome);
        }

        let shortlist = self.ranking.rank(gathered.report.accepted, &requirements).await;
        outcome.no_grounded_matches = shortlist.recommendations.is_empty();
        outcome.recommendations = shortlist.recommendations;
        outcome.comparison_tip = shortlist.comparison_tip;
        Ok(outcome)
    }
}
