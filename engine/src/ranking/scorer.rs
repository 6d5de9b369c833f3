//! Weighted scoring
//!
//! Each weighted dimension is mapped onto [0, 1] across the surviving
//! candidates:
//!
//! - numbers: min-max normalization; all-equal values score 1.0, a missing
//!   value scores 0.0. Dimensions named after price, cost, weight, noise, size
//!   or thickness are lower-is-better.
//! - booleans: `true` 1.0, `false` 0.0
//! - text: 0.5 when present
//!
//! The weighted sum is divided by the total weight. Availability in the
//! target market adds a fixed bonus or penalty.

use crate::research::candidates::Candidate;
use sdk::types::SpecValue;
use std::collections::BTreeMap;

pub const AVAILABILITY_BONUS: f64 = 0.1;

const LOWER_IS_BETTER: &[&str] = &["price", "cost", "weight", "noise", "size", "thickness"];

fn lower_is_better(dimension: &str) -> bool {
    LOWER_IS_BETTER.iter().any(|marker| dimension.contains(marker))
}

fn dimension_key(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Value of a dimension for one candidate.
///
/// Exact spec keys win; otherwise a key that starts with the dimension
/// (`battery` matches `battery_hours`) is used. `price` falls back to the
/// quoted price.
pub fn lookup(candidate: &Candidate, dimension: &str) -> Option<SpecValue> {
    let key = dimension_key(dimension);
    if let Some(value) = candidate.specs.get(&key) {
        return Some(value.clone());
    }
    let prefix = format!("{}_", key);
    if let Some((_, value)) = candidate.specs.iter().find(|(k, _)| k.starts_with(&prefix)) {
        return Some(value.clone());
    }
    if key == "price" {
        return candidate.price.as_ref().map(|p| SpecValue::Number(p.amount));
    }
    None
}

fn dimension_scores(candidates: &[&Candidate], dimension: &str) -> Vec<f64> {
    let values: Vec<Option<SpecValue>> = candidates.iter().map(|c| lookup(c, dimension)).collect();

    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|v| v.as_ref().and_then(SpecValue::as_number))
        .collect();
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let inverted = lower_is_better(&dimension_key(dimension));

    values
        .iter()
        .map(|value| match value {
            Some(SpecValue::Number(n)) if n.is_finite() => {
                if max - min <= f64::EPSILON {
                    1.0
                } else {
                    let scaled = (n - min) / (max - min);
                    if inverted {
                        1.0 - scaled
                    } else {
                        scaled
                    }
                }
            }
            Some(SpecValue::Flag(true)) => 1.0,
            Some(SpecValue::Flag(false)) => 0.0,
            Some(SpecValue::Text(t)) if !t.trim().is_empty() => 0.5,
            _ => 0.0,
        })
        .collect()
}

fn availability_term(candidate: &Candidate) -> f64 {
    match candidate.available_in_market {
        Some(true) => AVAILABILITY_BONUS,
        Some(false) => -AVAILABILITY_BONUS,
        None => 0.0,
    }
}

/// Score every candidate; the result is index-aligned with the input.
pub fn score_all(candidates: &[&Candidate], weights: &BTreeMap<String, f64>) -> Vec<f64> {
    let total: f64 = weights.values().filter(|w| w.is_finite() && **w > 0.0).sum();
    let mut scores = vec![0.0; candidates.len()];

    if total > 0.0 {
        for (dimension, weight) in weights {
            if !weight.is_finite() || *weight <= 0.0 {
                continue;
            }
            for (score, value) in scores.iter_mut().zip(dimension_scores(candidates, dimension)) {
                *score += weight * value;
            }
        }
        for score in &mut scores {
            *score /= total;
        }
    }

    for (score, candidate) in scores.iter_mut().zip(candidates) {
        *score += availability_term(candidate);
    }

    scores
}
