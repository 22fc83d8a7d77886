//! Display formatting for money, weights and dates.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// `1234.5` -> `GH₵1,234.50`, negatives as `-GH₵12.00`.
pub fn money(amount: Decimal, symbol: &str) -> String {
    let sign = if amount < Decimal::ZERO { "-" } else { "" };
    format!("{}{}{}", sign, symbol, grouped(amount.abs(), 2))
}

/// `1234.5` -> `1,234.5 kg`, negatives as `-12 kg`.
pub fn weight(kg: Decimal) -> String {
    let sign = if kg < Decimal::ZERO { "-" } else { "" };
    let kg = kg.abs().normalize();
    format!("{}{} kg", sign, grouped(kg, kg.scale().min(3)))
}

/// `2026-10-18` -> `18 Oct 2026`
pub fn date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

pub fn date_opt(date_value: Option<NaiveDate>) -> String {
    date_value.map(date).unwrap_or_else(|| "-".to_string())
}

/// Round to `dp` places and add thousands separators. Expects a
/// non-negative value.
fn grouped(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", dp as usize, rounded);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut out = String::new();
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*ch);
    }

    match frac_part {
        Some(frac) if !frac.is_empty() => format!("{}.{}", out, frac),
        _ => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money() {
        assert_eq!(money(Decimal::new(12345, 1), "GH₵"), "GH₵1,234.50");
        assert_eq!(money(Decimal::from(324), "$"), "$324.00");
        assert_eq!(money(Decimal::new(-1200, 2), "$"), "-$12.00");
        assert_eq!(money(Decimal::ZERO, "$"), "$0.00");
        assert_eq!(money(Decimal::from(1_000_000), ""), "1,000,000.00");
        assert_eq!(money(Decimal::new(5, 3), "$"), "$0.01");
    }

    #[test]
    fn test_weight() {
        assert_eq!(weight(Decimal::from(5)), "5 kg");
        assert_eq!(weight(Decimal::new(12345, 1)), "1,234.5 kg");
        assert_eq!(weight(Decimal::new(25000, 4)), "2.5 kg");
        assert_eq!(weight(Decimal::from(-123)), "-123 kg");
        assert_eq!(weight(Decimal::new(-12345, 1)), "-1,234.5 kg");
    }

    #[test]
    fn test_date() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(date(d), "18 Oct 2026");
        assert_eq!(date_opt(None), "-");
    }
}
