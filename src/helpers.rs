//! Shared helpers for Decimal percentages.
//!
//! Percentages are computed in `Decimal` so that one-decimal rounding is exact
//! (no 33.300000000000004 in API responses) and converted to f64 only at the
//! response boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// `part / whole × 100`, rounded half-up to 1 decimal place. Zero when `whole` is 0.
pub(crate) fn percentage_1dp(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
