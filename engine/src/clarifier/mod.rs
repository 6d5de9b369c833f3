//! Clarification interview
//!
//! The [`Clarifier`] owns a [`RequirementSet`] while the interview runs and
//! moves through three states:
//!
//! - `Gathering`: one question per turn for the next unsettled slot
//!   (budget, primary use, constraints, preference weights). Every ingested
//!   answer, skip or done token advances the turn counter.
//! - `Confirming`: a summary is shown; the shopper confirms or names one slot
//!   to edit. Editing re-enters `Gathering` for that slot only.
//! - `Done`: terminal; the requirement set is frozen and handed out.
//!
//! A failed question or interpretation never stalls the interview: templated
//! questions and local parsing take over.

pub mod input;
pub mod prompts;

use crate::config::AssistantConfig;
use crate::llm::structured::{generate_structured, generate_text};
use crate::llm::LLMProvider;
use input::{classify, classify_confirmation, ConfirmReply, Input};
use sdk::requirements::{Budget, Constraint, RequirementSet, Slot};
use sdk::types::PreferenceRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Interview settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClarifierSettings {
    pub max_turns: u32,
    pub target_market: String,
    pub currency: String,
}

impl From<&AssistantConfig> for ClarifierSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            target_market: config.target_market.clone(),
            currency: config.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClarifierState {
    Gathering,
    Confirming,
    Done,
}

/// What the boundary should show next
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Question { slot: Slot, text: String },
    Confirm { summary: String },
    Finished,
}

/// Why gathering ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReason {
    AllResolved,
    UserDone,
    TurnLimit,
    Edited,
}

/// Effect of one ingested input
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Answered { slot: Slot },
    Skipped { slot: Slot },
    ToConfirming { reason: ConfirmReason },
    Editing { slot: Slot },
    EditRefused { slot: Slot },
    Unrecognized,
    Done,
}

/// Structured reading of an answer
#[derive(Debug, Default, Deserialize)]
struct SlotInterpretation {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    budget: Option<BudgetInterpretation>,
    #[serde(default)]
    hard_constraints: Option<Vec<HardConstraint>>,
    #[serde(default)]
    soft_constraints: Option<Vec<String>>,
    /// Factor weights; a null weight leaves the factor out
    #[serde(default)]
    weights: Option<BTreeMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct BudgetInterpretation {
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    /// Ceilings are firm unless stated otherwise
    #[serde(default)]
    strict: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HardConstraint {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    required_terms: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    question: String,
}

#[derive(Debug, Clone)]
struct PendingQuestion {
    slot: Slot,
    text: String,
}

pub struct Clarifier {
    llm: Arc<dyn LLMProvider>,
    settings: ClarifierSettings,
    requirements: RequirementSet,
    state: ClarifierState,
    pending: Option<PendingQuestion>,
    edit_target: Option<Slot>,
}

impl Clarifier {
    pub fn new(llm: Arc<dyn LLMProvider>, settings: ClarifierSettings) -> Self {
        let requirements =
            RequirementSet::new(String::new(), settings.target_market.clone(), settings.max_turns);
        Self {
            llm,
            settings,
            requirements,
            state: ClarifierState::Gathering,
            pending: None,
            edit_target: None,
        }
    }

    /// Begin an interview, pre-resolving slots from remembered preferences.
    pub fn start(&mut self, topic: &str, seed: &[PreferenceRecord]) {
        self.requirements = RequirementSet::new(
            topic.trim(),
            self.settings.target_market.clone(),
            self.settings.max_turns,
        );
        self.state = ClarifierState::Gathering;
        self.pending = None;
        self.edit_target = None;

        for record in seed {
            match Slot::from_attribute(&record.attribute) {
                Some(slot) if !record.value.trim().is_empty() => {
                    tracing::debug!("Seeding {} from memory", slot);
                    self.apply_locally(slot, record.value.trim());
                }
                _ => tracing::debug!("Ignoring remembered attribute '{}'", record.attribute),
            }
        }

        if self.requirements.all_settled() {
            self.enter_confirming(ConfirmReason::AllResolved);
        }

        tracing::info!(
            "Interview started for '{}' ({} slots seeded)",
            self.requirements.topic,
            Slot::PRIORITY
                .iter()
                .filter(|s| self.requirements.is_settled(**s))
                .count()
        );
    }

    pub fn state(&self) -> ClarifierState {
        self.state
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    /// Frozen requirements; only available once the interview is done
    pub fn finish(self) -> Option<RequirementSet> {
        match self.state {
            ClarifierState::Done => Some(self.requirements),
            _ => None,
        }
    }

    fn target_slot(&self) -> Option<Slot> {
        self.edit_target.or_else(|| self.requirements.next_unsettled())
    }

    /// Produce the next prompt for the shopper
    pub async fn next_prompt(&mut self) -> Prompt {
        match self.state {
            ClarifierState::Gathering => {
                let Some(slot) = self.target_slot() else {
                    self.enter_confirming(ConfirmReason::AllResolved);
                    return self.confirm_prompt().await;
                };
                let text = self.question_for(slot).await;
                self.pending = Some(PendingQuestion {
                    slot,
                    text: text.clone(),
                });
                Prompt::Question { slot, text }
            }
            ClarifierState::Confirming => self.confirm_prompt().await,
            ClarifierState::Done => Prompt::Finished,
        }
    }

    async fn question_for(&self, slot: Slot) -> String {
        let request = prompts::question_request(&self.requirements, slot, &self.settings);
        match generate_structured::<GeneratedQuestion>(self.llm.as_ref(), &request).await {
            Ok(generated) if !generated.question.trim().is_empty() => {
                generated.question.trim().to_string()
            }
            Ok(_) => {
                tracing::warn!("Empty question generated for {}, using template", slot);
                prompts::template_question(slot, &self.settings)
            }
            Err(e) => {
                tracing::warn!("Question generation failed for {} ({}), using template", slot, e);
                prompts::template_question(slot, &self.settings)
            }
        }
    }

    async fn confirm_prompt(&self) -> Prompt {
        let request = prompts::summary_request(&self.requirements, &self.settings);
        let summary = match generate_text(self.llm.as_ref(), &request).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Summary generation failed ({}), using fallback", e);
                prompts::fallback_summary(&self.requirements)
            }
        };
        Prompt::Confirm { summary }
    }

    /// Ingest one raw input from the shopper
    pub async fn ingest(&mut self, raw: &str) -> Transition {
        match self.state {
            ClarifierState::Gathering => self.ingest_answer(raw).await,
            ClarifierState::Confirming => self.ingest_confirmation(raw),
            ClarifierState::Done => Transition::Done,
        }
    }

    async fn ingest_answer(&mut self, raw: &str) -> Transition {
        let (slot, question) = match self.pending.take() {
            Some(pending) => (pending.slot, pending.text),
            None => match self.target_slot() {
                Some(slot) => (slot, prompts::template_question(slot, &self.settings)),
                None => {
                    self.enter_confirming(ConfirmReason::AllResolved);
                    return Transition::ToConfirming {
                        reason: ConfirmReason::AllResolved,
                    };
                }
            },
        };

        if !self.requirements.record_turn(Some(slot), question.clone(), raw.trim()) {
            self.enter_confirming(ConfirmReason::TurnLimit);
            return Transition::ToConfirming {
                reason: ConfirmReason::TurnLimit,
            };
        }

        let step = match classify(raw) {
            Input::Done => {
                tracing::info!("Shopper ended the interview at turn {}", self.requirements.turn());
                self.edit_target = None;
                self.enter_confirming(ConfirmReason::UserDone);
                return Transition::ToConfirming {
                    reason: ConfirmReason::UserDone,
                };
            }
            Input::Skip => {
                self.requirements.mark_unknown(slot);
                Transition::Skipped { slot }
            }
            Input::Answer(answer) => {
                self.interpret(slot, &question, &answer).await;
                Transition::Answered { slot }
            }
        };

        if self.edit_target.take().is_some() {
            self.enter_confirming(ConfirmReason::Edited);
            Transition::ToConfirming {
                reason: ConfirmReason::Edited,
            }
        } else if self.requirements.all_settled() {
            self.enter_confirming(ConfirmReason::AllResolved);
            Transition::ToConfirming {
                reason: ConfirmReason::AllResolved,
            }
        } else if self.requirements.at_turn_limit() {
            self.enter_confirming(ConfirmReason::TurnLimit);
            Transition::ToConfirming {
                reason: ConfirmReason::TurnLimit,
            }
        } else {
            step
        }
    }

    fn ingest_confirmation(&mut self, raw: &str) -> Transition {
        match classify_confirmation(raw) {
            ConfirmReply::Confirm => {
                self.requirements.settle_remaining();
                self.requirements.mark_complete();
                self.state = ClarifierState::Done;
                tracing::info!(
                    "Requirements confirmed after {} turns",
                    self.requirements.turn()
                );
                Transition::Done
            }
            ConfirmReply::Edit(slot) if self.requirements.at_turn_limit() => {
                tracing::info!("Edit of {} refused: turn limit reached", slot);
                Transition::EditRefused { slot }
            }
            ConfirmReply::Edit(slot) => {
                self.edit_target = Some(slot);
                self.state = ClarifierState::Gathering;
                Transition::Editing { slot }
            }
            ConfirmReply::Unrecognized => Transition::Unrecognized,
        }
    }

    fn enter_confirming(&mut self, reason: ConfirmReason) {
        tracing::debug!("Entering confirmation ({:?})", reason);
        self.pending = None;
        self.requirements.settle_remaining();
        self.requirements.mark_complete();
        self.state = ClarifierState::Confirming;
    }

    async fn interpret(&mut self, slot: Slot, question: &str, answer: &str) {
        let request = prompts::interpretation_request(
            &self.requirements.topic,
            slot,
            question,
            answer,
            &self.settings,
        );
        match generate_structured::<SlotInterpretation>(self.llm.as_ref(), &request).await {
            Ok(interpretation) => self.apply_interpretation(slot, answer, interpretation),
            Err(e) => {
                tracing::warn!("Interpretation of {} failed ({}), parsing locally", slot, e);
                self.apply_locally(slot, answer);
            }
        }
    }

    fn apply_interpretation(&mut self, slot: Slot, answer: &str, interpretation: SlotInterpretation) {
        let value = interpretation
            .value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| answer.to_string());

        match slot {
            Slot::Budget => {
                let budget = interpretation
                    .budget
                    .and_then(|b| {
                        b.max.filter(|m| m.is_finite() && *m > 0.0).map(|max| Budget {
                            max,
                            currency: b
                                .currency
                                .filter(|c| !c.trim().is_empty())
                                .or_else(|| Some(self.settings.currency.clone())),
                            strict: b.strict.unwrap_or(true),
                        })
                    })
                    .or_else(|| input::parse_budget(answer, &self.settings.currency));
                self.requirements.set_budget(budget);
            }
            Slot::Constraints => {
                let mut constraints: Vec<Constraint> = interpretation
                    .hard_constraints
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|c| {
                        let label = c
                            .label
                            .map(|l| l.trim().to_string())
                            .filter(|l| !l.is_empty())?;
                        Some((label, c.required_terms.unwrap_or_default()))
                    })
                    .map(|(label, required_terms)| {
                        let terms: Vec<String> = required_terms
                            .into_iter()
                            .map(|t| t.trim().to_string())
                            .filter(|t| !t.is_empty())
                            .collect();
                        if terms.is_empty() {
                            Constraint::soft(label)
                        } else {
                            Constraint::hard(label, terms)
                        }
                    })
                    .collect();
                constraints.extend(
                    interpretation
                        .soft_constraints
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|c| !c.trim().is_empty())
                        .map(Constraint::soft),
                );
                if constraints.is_empty() {
                    constraints = input::parse_constraints(answer);
                }
                self.requirements.set_constraints(constraints);
            }
            Slot::PreferenceWeights => {
                let weights = interpretation
                    .weights
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(factor, weight)| weight.map(|w| (factor, w)))
                    .collect();
                self.requirements.set_preference_weights(weights);
                if self.requirements.preference_weights().is_empty() {
                    self.requirements
                        .set_preference_weights(input::parse_weights(answer));
                }
            }
            Slot::PrimaryUse => {}
        }

        self.requirements.resolve(slot, value);
    }

    fn apply_locally(&mut self, slot: Slot, answer: &str) {
        match slot {
            Slot::Budget => {
                let budget = input::parse_budget(answer, &self.settings.currency);
                self.requirements.set_budget(budget);
            }
            Slot::Constraints => {
                self.requirements
                    .set_constraints(input::parse_constraints(answer));
            }
            Slot::PreferenceWeights => {
                self.requirements
                    .set_preference_weights(input::parse_weights(answer));
            }
            Slot::PrimaryUse => {}
        }
        self.requirements.resolve(slot, answer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationRequest, LLMError};
    use async_trait::async_trait;

    /// Fails every call, forcing templates and local parsing
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
            Err(LLMError::ProviderUnavailable("offline".into()))
        }
    }

    fn clarifier(max_turns: u32) -> Clarifier {
        Clarifier::new(
            Arc::new(Offline),
            ClarifierSettings {
                max_turns,
                target_market: "Switzerland".into(),
                currency: "CHF".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_templated_questions_follow_priority() {
        let mut c = clarifier(6);
        c.start("laptop", &[]);

        match c.next_prompt().await {
            Prompt::Question { slot, text } => {
                assert_eq!(slot, Slot::Budget);
                assert!(text.contains("CHF"));
            }
            other => panic!("Expected question, got {:?}", other),
        }
        assert_eq!(
            c.ingest("CHF 1'200").await,
            Transition::Answered { slot: Slot::Budget }
        );
        assert_eq!(c.requirements().budget().map(|b| b.max), Some(1200.0));

        match c.next_prompt().await {
            Prompt::Question { slot, .. } => assert_eq!(slot, Slot::PrimaryUse),
            other => panic!("Expected question, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_done_moves_to_confirming() {
        let mut c = clarifier(6);
        c.start("tv", &[]);
        c.next_prompt().await;
        c.ingest("900").await;
        c.next_prompt().await;
        let t = c.ingest("done").await;

        assert_eq!(
            t,
            Transition::ToConfirming {
                reason: ConfirmReason::UserDone
            }
        );
        assert_eq!(c.state(), ClarifierState::Confirming);
        assert_eq!(c.requirements().turn(), 2);
        assert!(c.requirements().is_complete());
    }

    #[tokio::test]
    async fn test_turn_limit_forces_confirming() {
        let mut c = clarifier(2);
        c.start("phone", &[]);
        c.next_prompt().await;
        c.ingest("500").await;
        c.next_prompt().await;
        let t = c.ingest("photos").await;
        assert_eq!(
            t,
            Transition::ToConfirming {
                reason: ConfirmReason::TurnLimit
            }
        );
        assert_eq!(c.requirements().turn(), 2);
        assert!(c.requirements().is_settled(Slot::Constraints));
    }

    #[tokio::test]
    async fn test_edit_reenters_single_slot_and_refuses_at_limit() {
        let mut c = clarifier(5);
        c.start("kettle", &[]);
        for answer in ["80", "tea", "skip", "speed"] {
            c.next_prompt().await;
            c.ingest(answer).await;
        }
        assert_eq!(c.state(), ClarifierState::Confirming);

        assert_eq!(
            c.ingest("edit budget").await,
            Transition::Editing { slot: Slot::Budget }
        );
        match c.next_prompt().await {
            Prompt::Question { slot, .. } => assert_eq!(slot, Slot::Budget),
            other => panic!("Expected budget question, got {:?}", other),
        }
        assert_eq!(
            c.ingest("120").await,
            Transition::ToConfirming {
                reason: ConfirmReason::Edited
            }
        );
        assert_eq!(c.requirements().budget().map(|b| b.max), Some(120.0));

        // counter is at 5 of 5 now
        assert_eq!(
            c.ingest("change use").await,
            Transition::EditRefused {
                slot: Slot::PrimaryUse
            }
        );
        assert_eq!(c.state(), ClarifierState::Confirming);

        assert_eq!(c.ingest("maybe later").await, Transition::Unrecognized);
        assert_eq!(c.ingest("yes").await, Transition::Done);
        let frozen = c.finish().unwrap();
        assert_eq!(frozen.turn(), 5);
    }

    #[tokio::test]
    async fn test_seed_preresolves_slots() {
        let mut c = clarifier(6);
        let seed = vec![
            PreferenceRecord::new("budget_chf", "1500", 0),
            PreferenceRecord::new("preference_focus", "battery, weight", 0),
            PreferenceRecord::new("shoe_size", "44", 0),
        ];
        c.start("laptop", &seed);

        assert_eq!(c.requirements().budget().map(|b| b.max), Some(1500.0));
        assert_eq!(c.requirements().preference_weights().len(), 2);
        assert_eq!(c.requirements().turn(), 0);
        match c.next_prompt().await {
            Prompt::Question { slot, .. } => assert_eq!(slot, Slot::PrimaryUse),
            other => panic!("Expected question, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_summary_when_offline() {
        let mut c = clarifier(6);
        c.start("kettle", &[]);
        c.next_prompt().await;
        c.ingest("done").await;
        match c.next_prompt().await {
            Prompt::Confirm { summary } => assert!(summary.contains("Looking for: kettle")),
            other => panic!("Expected confirm, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finish_before_done_is_none() {
        let mut c = clarifier(6);
        c.start("kettle", &[]);
        assert!(c.finish().is_none());
    }

    #[test]
    fn test_null_fields_keep_the_interpretation() {
        let interpretation: SlotInterpretation = serde_json::from_str(
            r#"{"value": "up to 500 euros, flexible",
                "budget": {"max": 500, "currency": "EUR", "strict": false},
                "hard_constraints": null, "soft_constraints": null, "weights": null}"#,
        )
        .unwrap();

        let mut c = clarifier(6);
        c.start("robot vacuum", &[]);
        c.apply_interpretation(Slot::Budget, "up to 500 euros, flexible", interpretation);

        let budget = c.requirements().budget().cloned().unwrap();
        assert_eq!(budget.max, 500.0);
        assert_eq!(budget.currency.as_deref(), Some("EUR"));
        assert!(!budget.strict);
        assert_eq!(
            c.requirements().resolved(Slot::Budget),
            Some("up to 500 euros, flexible")
        );
    }

    #[test]
    fn test_null_entries_inside_interpretation_are_ignored() {
        let interpretation: SlotInterpretation = serde_json::from_str(
            r#"{"value": null,
                "budget": {"max": 300, "currency": null, "strict": null},
                "hard_constraints": [{"label": null, "required_terms": ["x"]}, {"label": "quiet", "required_terms": null}],
                "weights": {"battery": 2, "noise": null}}"#,
        )
        .unwrap();

        let mut c = clarifier(6);
        c.start("headphones", &[]);
        c.apply_interpretation(Slot::Budget, "300", interpretation);
        let budget = c.requirements().budget().cloned().unwrap();
        assert_eq!(budget.currency.as_deref(), Some("CHF"));
        assert!(budget.strict);
    }
}
