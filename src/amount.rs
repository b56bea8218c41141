//! # Amounts
//! Money values are kept as `rust_decimal::Decimal` with two fractional digits.
//! Rounding is half-up (away from zero on a tie), applied once when a value
//! enters the system and once when an average is derived.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Result, StatsError};

/// Fractional digits kept for every amount and derived statistic.
pub const SCALE: u32 = 2;

/// Round to cents, half-up.
#[inline]
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a wire amount (JSON number) into a rounded decimal.
///
/// The exact binary value of the double is kept before rounding, so `1.005`
/// (stored as `1.00499…`) rounds to `1.00` while `0.125` rounds to `0.13`.
pub fn from_f64(value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(StatsError::InvalidAmount);
    }
    Decimal::from_f64_retain(value)
        .map(round_currency)
        .ok_or(StatsError::InvalidAmount)
}

/// `sum / count` rounded to cents; zero when `count == 0`.
pub fn average(sum: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    sum.checked_div(Decimal::from(count))
        .map(round_currency)
        .unwrap_or(Decimal::ZERO)
}
