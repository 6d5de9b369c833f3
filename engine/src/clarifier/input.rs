//! Classification and local interpretation of shopper input
//!
//! Everything here is pure. The local parsers double as the fallback used when
//! the language model cannot interpret an answer, and as the reader for
//! remembered preferences.

use regex::Regex;
use sdk::requirements::{Budget, Constraint, Slot};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Kind of a raw answer during GATHERING
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Answer(String),
    Skip,
    Done,
}

/// Kind of a raw reply during CONFIRMING
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReply {
    Confirm,
    Edit(Slot),
    Unrecognized,
}

const SKIP_TOKENS: &[&str] = &["skip", "/skip", "pass", "idk", "no preference"];
const DONE_TOKENS: &[&str] = &["done", "/done", "finish", "that's all"];
const CONFIRM_TOKENS: &[&str] = &["y", "yes", "ok", "confirm", "correct", "done", "looks good"];

fn canonical(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['.', '!'])
        .replace('’', "'")
        .to_lowercase()
}

/// Classify an answer given while gathering requirements
pub fn classify(raw: &str) -> Input {
    let token = canonical(raw);
    if token.is_empty() || SKIP_TOKENS.contains(&token.as_str()) {
        Input::Skip
    } else if DONE_TOKENS.contains(&token.as_str()) {
        Input::Done
    } else {
        Input::Answer(raw.trim().to_string())
    }
}

/// Classify a reply to the confirmation summary
pub fn classify_confirmation(raw: &str) -> ConfirmReply {
    let token = canonical(raw);
    if CONFIRM_TOKENS.contains(&token.as_str()) {
        return ConfirmReply::Confirm;
    }

    let target = token
        .strip_prefix("edit ")
        .or_else(|| token.strip_prefix("change "))
        .unwrap_or(&token);

    match Slot::from_attribute(target) {
        Some(slot) => ConfirmReply::Edit(slot),
        None => ConfirmReply::Unrecognized,
    }
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(k\b)?").expect("Invalid amount pattern")
    })
}

const CURRENCIES: &[(&str, &str)] = &[
    ("chf", "CHF"),
    ("fr.", "CHF"),
    ("eur", "EUR"),
    ("€", "EUR"),
    ("usd", "USD"),
    ("$", "USD"),
    ("gbp", "GBP"),
    ("£", "GBP"),
];

const FLEXIBLE_MARKERS: &[&str] = &[
    "around", "about", "roughly", "approx", "flexible", "ish", "~", "ca.",
];

/// Parse a budget answer such as `CHF 1'200.–`, `under 900`, `1.5k EUR`.
///
/// Returns `None` when no positive amount is present. A budget without an
/// explicit currency is assumed to be in `default_currency`.
pub fn parse_budget(raw: &str, default_currency: &str) -> Option<Budget> {
    let lowered = raw.to_lowercase();
    let cleaned = lowered
        .replace(".–", "")
        .replace(".-", "")
        .replace('–', "")
        .replace(['\'', '’'], "");

    let captures = amount_pattern().captures(&cleaned)?;
    let number = captures.get(1)?.as_str();

    // "1,200" is a thousands separator, "12,50" a decimal comma
    let normalized = match number.split_once(',') {
        Some((_, tail)) if tail.len() == 3 => number.replace(',', ""),
        _ => number.replace(',', "."),
    };
    let mut max: f64 = normalized.parse().ok()?;
    if captures.get(2).is_some() {
        max *= 1000.0;
    }
    if !max.is_finite() || max <= 0.0 {
        return None;
    }

    let currency = CURRENCIES
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| default_currency.to_string());

    let strict = !FLEXIBLE_MARKERS.iter().any(|m| lowered.contains(m));

    Some(Budget {
        max,
        currency: Some(currency),
        strict,
    })
}

/// Split a free-form list on `,` and `;`
pub fn split_terms(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(|term| term.trim().trim_end_matches('.').trim())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Constraints stated in free text, all soft
pub fn parse_constraints(raw: &str) -> Vec<Constraint> {
    split_terms(raw).into_iter().map(Constraint::soft).collect()
}

/// Preference factors with equal weights of 1.0
pub fn parse_weights(raw: &str) -> BTreeMap<String, f64> {
    raw.split(',')
        .map(|factor| factor.trim().to_lowercase())
        .filter(|factor| !factor.is_empty())
        .map(|factor| (factor, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_control_tokens() {
        assert_eq!(classify("skip"), Input::Skip);
        assert_eq!(classify("  /SKIP "), Input::Skip);
        assert_eq!(classify("No preference."), Input::Skip);
        assert_eq!(classify(""), Input::Skip);
        assert_eq!(classify("Done"), Input::Done);
        assert_eq!(classify("that’s all"), Input::Done);
        assert_eq!(
            classify(" around 500 CHF "),
            Input::Answer("around 500 CHF".into())
        );
    }

    #[test]
    fn test_classify_confirmation() {
        assert_eq!(classify_confirmation("Yes!"), ConfirmReply::Confirm);
        assert_eq!(classify_confirmation("looks good"), ConfirmReply::Confirm);
        assert_eq!(
            classify_confirmation("edit budget"),
            ConfirmReply::Edit(Slot::Budget)
        );
        assert_eq!(
            classify_confirmation("change primary use"),
            ConfirmReply::Edit(Slot::PrimaryUse)
        );
        assert_eq!(
            classify_confirmation("priorities"),
            ConfirmReply::Edit(Slot::PreferenceWeights)
        );
        assert_eq!(classify_confirmation("maybe"), ConfirmReply::Unrecognized);
    }

    #[test]
    fn test_parse_swiss_price_format() {
        let budget = parse_budget("CHF 1'200.–", "CHF").unwrap();
        assert_eq!(budget.max, 1200.0);
        assert_eq!(budget.currency.as_deref(), Some("CHF"));
        assert!(budget.strict);
    }

    #[test]
    fn test_parse_budget_variants() {
        assert_eq!(parse_budget("under 900", "CHF").unwrap().max, 900.0);
        assert_eq!(parse_budget("1,200 dollars max $", "CHF").unwrap().max, 1200.0);
        assert_eq!(parse_budget("12,50", "CHF").unwrap().max, 12.5);

        let k = parse_budget("about 1.5k EUR", "CHF").unwrap();
        assert_eq!(k.max, 1500.0);
        assert_eq!(k.currency.as_deref(), Some("EUR"));
        assert!(!k.strict);

        assert!(parse_budget("whatever is cheap", "CHF").is_none());
        assert!(parse_budget("0", "CHF").is_none());
    }

    #[test]
    fn test_default_currency_applies() {
        let budget = parse_budget("800", "CHF").unwrap();
        assert_eq!(budget.currency.as_deref(), Some("CHF"));
    }

    #[test]
    fn test_split_terms_and_weights() {
        assert_eq!(
            split_terms("USB-C; under 1.5 kg, quiet."),
            vec!["USB-C", "under 1.5 kg", "quiet"]
        );
        let weights = parse_weights("Battery, Portability ,");
        assert_eq!(weights.len(), 2);
        assert_eq!(weights.get("battery"), Some(&1.0));
        assert!(parse_constraints("none").iter().all(|c| !c.hard));
    }
}
