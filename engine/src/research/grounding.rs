//! Grounding filter
//!
//! A candidate survives only when its normalized URL belongs to the search
//! results consumed in the same research pass. Rejections are counted, never
//! silently lost. The filter is pure and needs no Port.

use super::candidates::Candidate;
use crate::search::{normalize_url, SearchResult};
use sdk::errors::EngineError;
use std::collections::{HashMap, HashSet};

/// A candidate backed by retrieved evidence
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedCandidate {
    pub candidate: Candidate,
    /// Normalized URL of the supporting search result
    pub evidence_url: String,
    /// Index of the supporting result in retrieval order
    pub retrieval_rank: usize,
}

/// Outcome of one filtering pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundingReport {
    pub accepted: Vec<GroundedCandidate>,
    pub rejected: usize,
}

#[derive(Debug, Clone)]
pub struct GroundingFilter {
    allow: HashMap<String, usize>,
}

impl GroundingFilter {
    /// Build the allow-set from retrieved results; the first occurrence of a
    /// URL fixes its retrieval rank.
    pub fn new(results: &[SearchResult]) -> Self {
        let mut allow = HashMap::new();
        for (rank, result) in results.iter().enumerate() {
            allow.entry(normalize_url(&result.url)).or_insert(rank);
        }
        Self { allow }
    }

    /// Split candidates into grounded ones and a rejection count.
    ///
    /// A second candidate pointing at already accepted evidence is rejected
    /// as a duplicate.
    pub fn filter(&self, candidates: Vec<Candidate>) -> GroundingReport {
        let mut report = GroundingReport::default();
        let mut used = HashSet::new();

        for candidate in candidates {
            let url = normalize_url(&candidate.url);
            match self.allow.get(&url) {
                Some(&rank) if used.insert(url.clone()) => {
                    report.accepted.push(GroundedCandidate {
                        candidate,
                        evidence_url: url,
                        retrieval_rank: rank,
                    });
                }
                Some(_) => {
                    tracing::debug!("Dropping duplicate candidate '{}' ({})", candidate.name, url);
                    report.rejected += 1;
                }
                None => {
                    tracing::debug!(
                        "Dropping '{}': {}",
                        candidate.name,
                        EngineError::GroundingViolation { url }
                    );
                    report.rejected += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: url.to_string(),
            url: normalize_url(url),
            snippet: String::new(),
            source_query: "q".to_string(),
        }
    }

    #[test]
    fn test_accepts_only_retrieved_urls() {
        let filter = GroundingFilter::new(&[
            result("https://shop.ch/a"),
            result("https://shop.ch/b"),
            result("https://shop.ch/c"),
        ]);
        let report = filter.filter(vec![
            Candidate::new("B", "https://SHOP.ch/b/?utm_source=llm"),
            Candidate::new("Invented", "https://elsewhere.com/x"),
            Candidate::new("A", "https://shop.ch/a#specs"),
        ]);

        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.accepted[0].evidence_url, "https://shop.ch/b");
        assert_eq!(report.accepted[0].retrieval_rank, 1);
        assert_eq!(report.accepted[1].retrieval_rank, 0);
    }

    #[test]
    fn test_duplicates_and_missing_urls_are_rejected() {
        let filter = GroundingFilter::new(&[result("https://shop.ch/a")]);
        let report = filter.filter(vec![
            Candidate::new("A", "https://shop.ch/a"),
            Candidate::new("A again", "https://shop.ch/a/"),
            Candidate::new("No url", ""),
        ]);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.rejected, 2);
    }

    #[test]
    fn test_empty_evidence_rejects_everything() {
        let filter = GroundingFilter::new(&[]);
        let report = filter.filter(vec![Candidate::new("A", "https://shop.ch/a")]);
        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected, 1);
    }
}
