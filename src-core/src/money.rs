//! Fixed-point money helpers.
//!
//! Every derived amount in the engine goes through [`quantize`]: two decimal
//! places, truncated toward zero. Raw inputs are never quantized.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::errors::{Result, ValidationError};

pub const MONEY_SCALE: u32 = 2;

/// Truncate to two decimal places.
pub fn quantize(amount: Decimal) -> Decimal {
    let mut value = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero);
    // Keep "0.00" rather than "-0.00" after truncating tiny negatives.
    if value.is_zero() {
        value = Decimal::ZERO;
    }
    value.rescale(MONEY_SCALE);
    value
}

/// `part / whole * 100`, or zero for a non-positive whole.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    quantize(part / whole * dec!(100))
}

/// Parses an amount stored as text (the SQLite column representation).
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| ValidationError::DecimalConversion(e).into())
}

/// Storage representation of an amount.
pub fn format_amount(amount: Decimal) -> String {
    quantize(amount).to_string()
}
