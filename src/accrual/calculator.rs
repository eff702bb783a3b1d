//! Pure accrual math. No side effects, no error conditions: bad inputs
//! (negative, NaN, infinite) clamp to zero before use.

use std::time::Duration;

const SECS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Interest added per tick for a given principal.
///
/// `increment = principal * annual_rate / ticks_per_year`
pub fn per_tick_increment(principal: f64, annual_rate: f64, ticks_per_year: f64) -> f64 {
    if ticks_per_year <= 0.0 {
        return 0.0;
    }
    sanitize(principal) * sanitize(annual_rate) / ticks_per_year
}

/// The most interest that could have accrued on `balance` at `annual_rate`
/// over `elapsed`. Remote values above this bound are stale.
pub fn max_plausible_interest(balance: f64, annual_rate: f64, elapsed: Duration) -> f64 {
    sanitize(balance) * sanitize(annual_rate) * (elapsed.as_secs_f64() / SECS_PER_YEAR)
}

/// Rounds a published interest value to 8 decimals, clamped non-negative.
pub fn round8(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.max(0.0) * 1e8).round() / 1e8
}

/// Clamps an amount to a finite non-negative value.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
