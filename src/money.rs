//! Fixed-point money helpers
//!
//! Every primitive operation rounds to two decimal places before returning,
//! so chained arithmetic never carries more precision than the ledger stores.
//! Amounts are persisted as integer cents.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};

/// Number of decimal places kept for every amount
pub const SCALE: u32 = 2;

/// Two balances closer than this are considered equal
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, SCALE);

/// Round to two places, half away from zero
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn add(a: Decimal, b: Decimal) -> Decimal {
    round(round(a) + round(b))
}

pub fn sub(a: Decimal, b: Decimal) -> Decimal {
    round(round(a) - round(b))
}

pub fn mul(a: Decimal, b: Decimal) -> Decimal {
    round(round(a) * round(b))
}

/// Returns `None` when dividing by zero
pub fn div(a: Decimal, b: Decimal) -> Option<Decimal> {
    let b = round(b);
    if b.is_zero() {
        return None;
    }
    Some(round(round(a) / b))
}

/// `part` as a percentage of `total`; `None` when `total` is zero
pub fn percentage(part: Decimal, total: Decimal) -> Option<Decimal> {
    div(part, total).map(|ratio| mul(ratio, Decimal::ONE_HUNDRED))
}

/// Equality within the ledger tolerance
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < TOLERANCE
}

/// Convert an amount to integer cents
pub fn to_cents(value: Decimal) -> AppResult<i64> {
    let mut rounded = round(value);
    rounded.rescale(SCALE);
    i64::try_from(rounded.mantissa())
        .map_err(|_| AppError::validation(format!("amount {} is out of range", value)))
}

/// Convert integer cents back to an amount
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, SCALE)
}

/// Serde adapter: integer cents in storage, decimal number on the wire
pub mod cents {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&super::from_cents(*value), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        super::to_cents(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round(dec!(1.005)), dec!(1.01));
        assert_eq!(round(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn test_rounds_after_each_step() {
        // 0.333 rounds to 0.33 before the multiplication
        assert_eq!(mul(dec!(0.333), dec!(3)), dec!(0.99));
        assert_eq!(add(dec!(0.104), dec!(0.104)), dec!(0.20));
        assert_eq!(sub(dec!(1500), dec!(200)), dec!(1300));
    }

    #[test]
    fn test_div_and_percentage() {
        assert_eq!(div(dec!(10), dec!(3)), Some(dec!(3.33)));
        assert_eq!(div(dec!(10), dec!(0)), None);
        assert_eq!(percentage(dec!(200), dec!(1500)), Some(dec!(13.00)));
        assert_eq!(percentage(dec!(1), dec!(0)), None);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(dec!(1500.00), dec!(1500.009)));
        assert!(!approx_eq(dec!(1500.00), dec!(1500.01)));
    }

    #[test]
    fn test_cents() {
        assert_eq!(to_cents(dec!(1500)).unwrap(), 150_000);
        assert_eq!(to_cents(dec!(0.015)).unwrap(), 2);
        assert_eq!(to_cents(dec!(-200.5)).unwrap(), -20_050);
        assert_eq!(from_cents(130_000), dec!(1300));
        assert_eq!(from_cents(-5), dec!(-0.05));
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Row {
        #[serde(with = "cents")]
        amount: i64,
    }

    #[test]
    fn test_cents_serde() {
        let row: Row = serde_json::from_str(r#"{"amount": 200.5}"#).unwrap();
        assert_eq!(row.amount, 20_050);
        let row: Row = serde_json::from_str(r#"{"amount": -12}"#).unwrap();
        assert_eq!(row.amount, -1_200);
        assert_eq!(serde_json::to_string(&Row { amount: 1_234 }).unwrap(), r#"{"amount":12.34}"#);
    }
}
