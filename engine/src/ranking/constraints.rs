//! Hard-constraint filter
//!
//! Hard constraints are applied before scoring and never traded off against
//! soft preferences.

use crate::research::candidates::Candidate;
use crate::research::grounding::GroundedCandidate;
use sdk::requirements::{Budget, Constraint, RequirementSet};

/// Whether the candidate breaks a strict budget.
///
/// An unknown price, or a price quoted in a different currency, is not a
/// violation.
pub fn exceeds_budget(candidate: &Candidate, budget: &Budget) -> bool {
    if !budget.strict {
        return false;
    }
    let Some(price) = &candidate.price else {
        return false;
    };
    if let (Some(price_currency), Some(budget_currency)) = (&price.currency, &budget.currency) {
        if !price_currency.eq_ignore_ascii_case(budget_currency) {
            return false;
        }
    }
    price.amount > budget.max
}

fn haystack(candidate: &Candidate) -> String {
    let mut text = candidate.name.to_lowercase();
    for (key, value) in &candidate.specs {
        text.push(' ');
        text.push_str(&key.to_lowercase());
        text.push(' ');
        text.push_str(&value.to_string().to_lowercase());
    }
    text.push(' ');
    text.push_str(&candidate.rationale.to_lowercase());
    text
}

/// Whether every required term of a hard constraint is present
pub fn satisfies(candidate: &Candidate, constraint: &Constraint) -> bool {
    if !constraint.hard {
        return true;
    }
    let text = haystack(candidate);
    constraint
        .required_terms
        .iter()
        .all(|term| text.contains(&term.trim().to_lowercase()))
}

/// Remove candidates violating any hard constraint. Returns the survivors and
/// the number removed.
pub fn apply_hard_constraints(
    candidates: Vec<GroundedCandidate>,
    requirements: &RequirementSet,
) -> (Vec<GroundedCandidate>, usize) {
    let before = candidates.len();
    let survivors: Vec<GroundedCandidate> = candidates
        .into_iter()
        .filter(|grounded| {
            let candidate = &grounded.candidate;
            if let Some(budget) = requirements.budget() {
                if exceeds_budget(candidate, budget) {
                    tracing::debug!("'{}' exceeds the budget", candidate.name);
                    return false;
                }
            }
            match requirements
                .hard_constraints()
                .find(|c| !satisfies(candidate, c))
            {
                Some(constraint) => {
                    tracing::debug!("'{}' violates '{}'", candidate.name, constraint.label);
                    false
                }
                None => true,
            }
        })
        .collect();

    let removed = before - survivors.len();
    (survivors, removed)
}
