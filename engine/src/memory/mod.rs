//! Preference memory
//!
//! Stable shopper preferences survive between sessions. Expiry is a read-time
//! filter against "now": a record last written more than the retention window
//! ago is simply not returned. A record exactly at the boundary is still
//! active. Nothing is deleted in the background.

use crate::config::MemoryConfig;
use crate::db::PreferenceRepository;
use crate::llm::structured::generate_structured;
use crate::llm::{GenerationRequest, LLMProvider, Message, OutputSchema};
use sdk::errors::EngineError;
use sdk::requirements::{RequirementSet, Slot};
use sdk::types::PreferenceRecord;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

pub const SUMMARY_SCHEMA: &str = "preference_summary";

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Deserialize)]
struct PreferenceSummary {
    #[serde(default)]
    preferences: Vec<SummarizedPreference>,
}

#[derive(Debug, Deserialize)]
struct SummarizedPreference {
    attribute: String,
    #[serde(default)]
    value: String,
}

pub struct PreferenceMemory {
    repository: PreferenceRepository,
    retention_secs: i64,
}

impl PreferenceMemory {
    pub fn new(repository: PreferenceRepository, retention_days: u32) -> Self {
        Self {
            repository,
            retention_secs: i64::from(retention_days) * SECONDS_PER_DAY,
        }
    }

    pub fn from_config(repository: PreferenceRepository, config: &MemoryConfig) -> Self {
        Self::new(repository, config.retention_days)
    }

    /// Oldest `last_updated` that is still active at `now`
    pub fn cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(self.retention_secs)
    }

    /// Active records of a session, ordered by attribute
    pub async fn load(&self, session_id: &str, now: i64) -> Result<Vec<PreferenceRecord>, EngineError> {
        let records = self
            .repository
            .list_since(session_id, self.cutoff(now))
            .await
            .map_err(|e| EngineError::Database(format!("{:#}", e)))?;
        tracing::debug!("Loaded {} active preferences for '{}'", records.len(), session_id);
        Ok(records)
    }

    /// Upsert records by attribute, stamping them with `now`
    pub async fn save(
        &self,
        session_id: &str,
        records: &[PreferenceRecord],
        now: i64,
    ) -> Result<(), EngineError> {
        if records.is_empty() {
            return Ok(());
        }
        self.repository
            .upsert_all(session_id, records, now)
            .await
            .map_err(|e| EngineError::Database(format!("{:#}", e)))?;
        tracing::info!("Saved {} preferences for '{}'", records.len(), session_id);
        Ok(())
    }

    /// Delete everything remembered for a session
    pub async fn forget(&self, session_id: &str) -> Result<u64, EngineError> {
        self.repository
            .delete_session(session_id)
            .await
            .map_err(|e| EngineError::Database(format!("{:#}", e)))
    }
}

/// Slots whose answers carry over to other purchases
const STABLE_SLOTS: [Slot; 2] = [Slot::Budget, Slot::PreferenceWeights];

/// Resolved stable slots as records; used when summarization fails
pub fn resolved_preferences(requirements: &RequirementSet, now: i64) -> Vec<PreferenceRecord> {
    STABLE_SLOTS
        .iter()
        .filter_map(|slot| {
            requirements
                .resolved(*slot)
                .map(|value| PreferenceRecord::new(slot.as_str(), value.trim(), now))
        })
        .filter(|record| !record.value.is_empty())
        .collect()
}

fn summary_request(requirements: &RequirementSet) -> GenerationRequest {
    let transcript = requirements
        .transcript()
        .iter()
        .map(|turn| format!("Q: {}\nA: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n");
    let attributes = Slot::PRIORITY
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    GenerationRequest::structured(
        vec![
            Message::system(format!(
                "Summarize the shopper's stable preferences from this interview so they can be reused next time. \
                Only use these attributes: {}. Leave out anything specific to this one purchase or not stated by the shopper.",
                attributes
            )),
            Message::user(format!(
                "Request: {}\nInterview:\n{}",
                requirements.topic,
                if transcript.is_empty() { "(no answers)" } else { &transcript }
            )),
        ],
        OutputSchema::new(
            SUMMARY_SCHEMA,
            json!({ "preferences": [{ "attribute": "string", "value": "string" }] }),
        ),
    )
}

/// Condense the interview into records. Best effort: falls back to the
/// resolved slot values and never fails.
pub async fn summarize(
    llm: &dyn LLMProvider,
    requirements: &RequirementSet,
    now: i64,
) -> Vec<PreferenceRecord> {
    let request = summary_request(requirements);
    let summary = match generate_structured::<PreferenceSummary>(llm, &request).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("Preference summarization failed ({}), keeping resolved answers", e);
            return resolved_preferences(requirements, now);
        }
    };

    // Last mention of an attribute wins
    let mut by_slot: BTreeMap<Slot, String> = BTreeMap::new();
    for preference in summary.preferences {
        match Slot::from_attribute(&preference.attribute) {
            Some(slot) if !preference.value.trim().is_empty() => {
                by_slot.insert(slot, preference.value.trim().to_string());
            }
            _ => tracing::debug!("Ignoring summarized attribute '{}'", preference.attribute),
        }
    }

    if by_slot.is_empty() {
        return resolved_preferences(requirements, now);
    }

    by_slot
        .into_iter()
        .map(|(slot, value)| PreferenceRecord::new(slot.as_str(), value, now))
        .collect()
}
