//! Requirement set produced by the clarification interview
//!
//! A `RequirementSet` tracks one value per requirement slot, the ordered
//! question/answer transcript and a bounded turn counter. It is mutated only
//! while the interview runs and handed to research as an immutable snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named requirement dimension tracked by the interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Budget,
    PrimaryUse,
    Constraints,
    PreferenceWeights,
}

impl Slot {
    /// Fixed order in which unresolved slots are asked about
    pub const PRIORITY: [Slot; 4] = [
        Slot::Budget,
        Slot::PrimaryUse,
        Slot::Constraints,
        Slot::PreferenceWeights,
    ];

    /// Attribute name used in prompts and persisted preferences
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Budget => "budget",
            Slot::PrimaryUse => "primary_use",
            Slot::Constraints => "constraints",
            Slot::PreferenceWeights => "preference_weights",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Budget => "Budget",
            Slot::PrimaryUse => "Primary use",
            Slot::Constraints => "Constraints",
            Slot::PreferenceWeights => "Priorities",
        }
    }

    /// Parse an attribute name, accepting the legacy names used by older
    /// preference files (`budget_chf`, `preference_focus`).
    pub fn from_attribute(name: &str) -> Option<Slot> {
        match name.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "budget" | "budget_chf" => Some(Slot::Budget),
            "primary_use" | "use" | "use_case" => Some(Slot::PrimaryUse),
            "constraints" | "constraint" => Some(Slot::Constraints),
            "preference_weights" | "preference_focus" | "preferences" | "priorities"
            | "weights" => Some(Slot::PreferenceWeights),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settled value of a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    /// The shopper skipped the slot or the interview ended before it was asked
    Unknown,
    /// Normalized answer text
    Resolved(String),
}

/// Spending ceiling extracted from the budget answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub max: f64,
    #[serde(default)]
    pub currency: Option<String>,
    /// A strict budget eliminates candidates priced above `max`
    #[serde(default = "default_true")]
    pub strict: bool,
}

fn default_true() -> bool {
    true
}

/// A constraint stated by the shopper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub label: String,
    /// Hard constraints remove non-conforming candidates outright
    #[serde(default)]
    pub hard: bool,
    /// Terms that must all appear in a candidate for a hard constraint to hold
    #[serde(default)]
    pub required_terms: Vec<String>,
}

impl Constraint {
    pub fn soft(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hard: false,
            required_terms: Vec::new(),
        }
    }

    pub fn hard(label: impl Into<String>, required_terms: Vec<String>) -> Self {
        Self {
            label: label.into(),
            hard: true,
            required_terms,
        }
    }
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTurn {
    pub slot: Option<Slot>,
    pub question: String,
    pub answer: String,
}

/// Structured requirements of one shopper for one product request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub topic: String,
    pub target_market: String,
    slots: BTreeMap<Slot, SlotValue>,
    budget: Option<Budget>,
    constraints: Vec<Constraint>,
    preference_weights: BTreeMap<String, f64>,
    transcript: Vec<QaTurn>,
    turn: u32,
    max_turns: u32,
    complete: bool,
}

impl RequirementSet {
    pub fn new(topic: impl Into<String>, target_market: impl Into<String>, max_turns: u32) -> Self {
        Self {
            topic: topic.into(),
            target_market: target_market.into(),
            slots: BTreeMap::new(),
            budget: None,
            constraints: Vec::new(),
            preference_weights: BTreeMap::new(),
            transcript: Vec::new(),
            turn: 0,
            max_turns,
            complete: false,
        }
    }

    /// Value of a slot; `None` while it has not been asked yet
    pub fn slot(&self, slot: Slot) -> Option<&SlotValue> {
        self.slots.get(&slot)
    }

    /// Resolved text of a slot, if any
    pub fn resolved(&self, slot: Slot) -> Option<&str> {
        match self.slots.get(&slot) {
            Some(SlotValue::Resolved(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_settled(&self, slot: Slot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// First slot in priority order that is neither resolved nor unknown
    pub fn next_unsettled(&self) -> Option<Slot> {
        Slot::PRIORITY
            .iter()
            .copied()
            .find(|slot| !self.is_settled(*slot))
    }

    pub fn all_settled(&self) -> bool {
        self.next_unsettled().is_none()
    }

    pub fn resolve(&mut self, slot: Slot, value: impl Into<String>) {
        self.slots.insert(slot, SlotValue::Resolved(value.into()));
    }

    pub fn mark_unknown(&mut self, slot: Slot) {
        self.slots.insert(slot, SlotValue::Unknown);
        match slot {
            Slot::Budget => self.budget = None,
            Slot::Constraints => self.constraints.clear(),
            Slot::PreferenceWeights => self.preference_weights.clear(),
            Slot::PrimaryUse => {}
        }
    }

    /// Mark every slot not yet settled as unknown
    pub fn settle_remaining(&mut self) {
        for slot in Slot::PRIORITY {
            self.slots.entry(slot).or_insert(SlotValue::Unknown);
        }
    }

    pub fn budget(&self) -> Option<&Budget> {
        self.budget.as_ref()
    }

    pub fn set_budget(&mut self, budget: Option<Budget>) {
        self.budget = budget;
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn set_constraints(&mut self, constraints: Vec<Constraint>) {
        self.constraints = constraints;
    }

    pub fn hard_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.hard)
    }

    pub fn preference_weights(&self) -> &BTreeMap<String, f64> {
        &self.preference_weights
    }

    pub fn set_preference_weights(&mut self, weights: BTreeMap<String, f64>) {
        self.preference_weights = weights
            .into_iter()
            .filter(|(name, weight)| !name.trim().is_empty() && weight.is_finite() && *weight > 0.0)
            .map(|(name, weight)| (name.trim().to_lowercase(), weight))
            .collect();
    }

    pub fn transcript(&self) -> &[QaTurn] {
        &self.transcript
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn at_turn_limit(&self) -> bool {
        self.turn >= self.max_turns
    }

    /// Log one ingestion and advance the turn counter.
    ///
    /// Returns `false` without recording anything when the counter is
    /// already at the maximum.
    pub fn record_turn(
        &mut self,
        slot: Option<Slot>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> bool {
        if self.at_turn_limit() {
            return false;
        }
        self.transcript.push(QaTurn {
            slot,
            question: question.into(),
            answer: answer.into(),
        });
        self.turn += 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }
}
