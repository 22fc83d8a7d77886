//! Money parsing.
//!
//! Amounts arrive as JSON numbers, numeric strings, or user input typed on
//! the command line. Everything goes through [`parse_amount`] so that the
//! dashboard, the statements and the record forms agree on what a value is.

use crate::error::AmountError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Largest magnitude accepted for any single amount or weight. Products of
/// two such values still fit in a `Decimal`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Parse a raw amount such as `"1,250.50"`, `" 12 "` or `"3.5e2"`.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();

    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }

    let amount = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| AmountError::Invalid(raw.trim().to_string()))?;

    if amount.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(AmountError::TooLarge(raw.trim().to_string()));
    }
    Ok(amount)
}

/// `total + value`, leaving `total` unchanged if the result would overflow.
pub fn add(total: Decimal, value: Decimal) -> Decimal {
    total.checked_add(value).unwrap_or_else(|| {
        warn!("Ignoring {} that would overflow the running total", value);
        total
    })
}

/// Overflow-safe sum, see [`add`].
pub fn sum<I: IntoIterator<Item = Decimal>>(values: I) -> Decimal {
    values.into_iter().fold(Decimal::ZERO, add)
}

/// Parse an amount from a JSON value (number or string).
pub fn parse_amount_value(raw: &Value) -> Result<Decimal, AmountError> {
    match raw {
        Value::Null => Err(AmountError::Empty),
        Value::Number(n) => parse_amount(&n.to_string()),
        Value::String(s) => parse_amount(s),
        other => Err(AmountError::Invalid(other.to_string())),
    }
}

/// Lenient variant used for rows coming back from the backend: anything that
/// is not a number counts as zero.
pub fn coerce_amount(raw: &Value) -> Decimal {
    match parse_amount_value(raw) {
        Ok(amount) => amount,
        Err(AmountError::Empty) => Decimal::ZERO,
        Err(e) => {
            warn!("Treating unusable amount as zero: {}", e);
            Decimal::ZERO
        }
    }
}

/// `#[serde(deserialize_with = "amount::lenient")]` for money columns.
pub fn lenient<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().map(coerce_amount).unwrap_or(Decimal::ZERO))
}

/// Like [`lenient`] but keeps "absent" distinct from zero.
pub fn lenient_opt<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_amount(&v)),
    })
}
