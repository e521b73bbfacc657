//! Rupee amount parsing.
//!
//! Amounts arrive either as JSON numbers or as currency-formatted strings such as
//! `"₹1,250.50"`. Internally every amount is an `i64` count of paise (1/100 rupee),
//! the same way balances are stored in the database.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// What to do when a settlement amount cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountParsePolicy {
    /// Treat the value as zero, log a warning and record the field name.
    #[default]
    Lenient,
    /// Reject the request with a validation error.
    Strict,
}

/// Reasons a currency string could not be turned into paise.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a valid amount")]
    Malformed(String),
    #[error("amount is out of range")]
    OutOfRange,
}

/// An amount as sent by a client: a JSON number or a formatted string.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    /// Parse without any leniency.
    pub fn to_paise(&self) -> Result<i64, MoneyParseError> {
        match self {
            AmountInput::Number(value) => {
                if !value.is_finite() {
                    return Err(MoneyParseError::Malformed(value.to_string()));
                }
                let rupees = Decimal::try_from(*value)
                    .map_err(|_| MoneyParseError::Malformed(value.to_string()))?;
                rupees_to_paise(rupees)
            }
            AmountInput::Text(text) => parse_amount(text),
        }
    }
}

impl From<i64> for AmountInput {
    fn from(rupees: i64) -> Self {
        AmountInput::Number(rupees as f64)
    }
}

impl From<&str> for AmountInput {
    fn from(text: &str) -> Self {
        AmountInput::Text(text.to_string())
    }
}

/// Parse a currency-formatted rupee string into paise.
///
/// Strips `₹`, an optional `Rs`/`INR` prefix, thousands separators and whitespace.
/// Fractions beyond two places are rounded half away from zero.
pub fn parse_amount(text: &str) -> Result<i64, MoneyParseError> {
    let mut cleaned: String = text
        .chars()
        .filter(|c| *c != '₹' && *c != ',' && !c.is_whitespace())
        .collect();

    for prefix in ["INR", "Rs.", "Rs"] {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest.to_string();
            break;
        }
    }

    if cleaned.is_empty() {
        return Err(MoneyParseError::Empty);
    }

    let rupees =
        Decimal::from_str(&cleaned).map_err(|_| MoneyParseError::Malformed(text.to_string()))?;
    rupees_to_paise(rupees)
}

fn rupees_to_paise(rupees: Decimal) -> Result<i64, MoneyParseError> {
    (rupees * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyParseError::OutOfRange)
}

/// Format paise as a rupee string, e.g. `₹1,250.50`.
pub fn format_paise(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    let rupees = (abs / 100).to_string();
    let mut grouped = String::with_capacity(rupees.len() + rupees.len() / 3);
    for (i, ch) in rupees.chars().enumerate() {
        if i > 0 && (rupees.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}₹{grouped}.{:02}", abs % 100)
}

/// Resolves settlement fields under an [`AmountParsePolicy`], remembering which fields
/// were defaulted so the transaction can carry them for audit.
#[derive(Debug)]
pub struct AmountResolver {
    policy: AmountParsePolicy,
    defaulted: Vec<String>,
}

impl AmountResolver {
    pub fn new(policy: AmountParsePolicy) -> Self {
        Self {
            policy,
            defaulted: Vec::new(),
        }
    }

    /// Resolve an optional field. A missing field is zero and is not recorded.
    pub fn resolve(&mut self, field: &str, input: Option<&AmountInput>) -> Result<i64, AppError> {
        let Some(input) = input else {
            return Ok(0);
        };

        match (input.to_paise(), self.policy) {
            (Ok(paise), _) => Ok(paise),
            (Err(err), AmountParsePolicy::Strict) => {
                Err(AppError::Validation(format!("{field}: {err}")))
            }
            (Err(err), AmountParsePolicy::Lenient) => {
                tracing::warn!(field, error = %err, "Unparsable amount defaulted to zero");
                self.defaulted.push(field.to_string());
                Ok(0)
            }
        }
    }

    pub fn into_defaulted(self) -> Vec<String> {
        self.defaulted
    }
}

/// Parse a required, strictly validated, positive amount.
pub fn require_positive(field: &str, input: &AmountInput) -> Result<i64, AppError> {
    let paise = input
        .to_paise()
        .map_err(|err| AppError::Validation(format!("{field}: {err}")))?;
    if paise <= 0 {
        return Err(AppError::Validation(format!("{field} must be positive")));
    }
    Ok(paise)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formatted_rupee_strings() {
        assert_eq!(parse_amount("₹1,250.50"), Ok(125_050));
        assert_eq!(parse_amount(" 800 "), Ok(80_000));
        assert_eq!(parse_amount("Rs. 99.999"), Ok(10_000));
        assert_eq!(parse_amount("INR 1,00,000"), Ok(10_000_000));
        assert_eq!(parse_amount("-45.5"), Ok(-4_550));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_amount(""), Err(MoneyParseError::Empty));
        assert_eq!(parse_amount("₹ ,"), Err(MoneyParseError::Empty));
        assert_eq!(
            parse_amount("abc"),
            Err(MoneyParseError::Malformed("abc".to_string()))
        );
    }

    #[test]
    fn numbers_convert_to_paise() {
        assert_eq!(AmountInput::Number(12.34).to_paise(), Ok(1_234));
        assert_eq!(AmountInput::from(1000).to_paise(), Ok(100_000));
        assert!(AmountInput::Number(f64::NAN).to_paise().is_err());
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let number: AmountInput = serde_json::from_str("1200").unwrap();
        let text: AmountInput = serde_json::from_str("\"₹1,200\"").unwrap();
        assert_eq!(number.to_paise(), Ok(120_000));
        assert_eq!(text.to_paise(), Ok(120_000));
    }

    #[test]
    fn lenient_resolver_defaults_only_the_bad_field() {
        let mut resolver = AmountResolver::new(AmountParsePolicy::Lenient);
        let billing = resolver.resolve("billing_amount", Some(&"1000".into())).unwrap();
        let spare = resolver.resolve("spare_amount", Some(&"abc".into())).unwrap();
        let travel = resolver.resolve("travelling_amount", Some(&"₹50".into())).unwrap();
        let booking = resolver.resolve("booking_amount", None).unwrap();

        assert_eq!((billing, spare, travel, booking), (100_000, 0, 5_000, 0));
        assert_eq!(resolver.into_defaulted(), vec!["spare_amount".to_string()]);
    }

    #[test]
    fn strict_resolver_names_the_field() {
        let mut resolver = AmountResolver::new(AmountParsePolicy::Strict);
        let err = resolver
            .resolve("spare_amount", Some(&"abc".into()))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("spare_amount")));
    }

    #[test]
    fn require_positive_rejects_zero_and_negative() {
        assert!(require_positive("amount", &AmountInput::from(0)).is_err());
        assert!(require_positive("amount", &"-10".into()).is_err());
        assert_eq!(require_positive("amount", &"₹4,000".into()).unwrap(), 400_000);
    }

    #[test]
    fn formats_with_grouping() {
        assert_eq!(format_paise(125_050), "₹1,250.50");
        assert_eq!(format_paise(-10_000), "-₹100.00");
        assert_eq!(format_paise(5), "₹0.05");
        assert_eq!(format_paise(123_456_789), "₹1,234,567.89");
    }
}
