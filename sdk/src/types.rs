//! Records exposed past the core boundary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Price quoted for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.currency {
            Some(currency) => write!(f, "{} {:.2}", currency, self.amount),
            None => write!(f, "{:.2}", self.amount),
        }
    }
}

/// A single product specification value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl SpecValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SpecValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecValue::Number(n) => write!(f, "{}", n),
            SpecValue::Flag(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            SpecValue::Text(s) => f.write_str(s),
        }
    }
}

/// User-facing explanation of a recommendation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub watch_outs: Vec<String>,
    #[serde(default)]
    pub best_for: String,
}

impl Rationale {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.watch_outs.is_empty() && self.best_for.trim().is_empty()
    }
}

/// A grounded, scored and explained product suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    /// URL as proposed for the product
    pub url: String,
    /// Normalized URL of the search result that supports this product
    pub evidence_url: String,
    pub price: Option<Price>,
    #[serde(default)]
    pub specs: BTreeMap<String, SpecValue>,
    pub score: f64,
    /// Short fit note produced together with the candidate
    #[serde(default)]
    pub fit_note: String,
    #[serde(default)]
    pub available_in_market: Option<bool>,
    #[serde(default)]
    pub rationale: Rationale,
}

/// A remembered shopper attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub attribute: String,
    pub value: String,
    /// Unix timestamp (seconds) of the last write
    pub last_updated: i64,
}

impl PreferenceRecord {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>, last_updated: i64) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_value_untagged_parsing() {
        let specs: BTreeMap<String, SpecValue> =
            serde_json::from_str(r#"{"battery_hours": 14, "usb_c": true, "panel": "OLED"}"#)
                .unwrap();
        assert_eq!(specs["battery_hours"], SpecValue::Number(14.0));
        assert_eq!(specs["usb_c"], SpecValue::Flag(true));
        assert_eq!(specs["panel"], SpecValue::Text("OLED".into()));
        assert_eq!(specs["battery_hours"].as_number(), Some(14.0));
        assert_eq!(specs["panel"].as_number(), None);
    }

    #[test]
    fn test_price_display() {
        let price = Price {
            amount: 1299.0,
            currency: Some("CHF".into()),
        };
        assert_eq!(price.to_string(), "CHF 1299.00");
    }

    #[test]
    fn test_rationale_is_empty() {
        assert!(Rationale::default().is_empty());
        let rationale = Rationale {
            best_for: "Commuters".into(),
            ..Default::default()
        };
        assert!(!rationale.is_empty());
    }
}
