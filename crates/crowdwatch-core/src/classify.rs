//! Pure occupancy-to-band classification.
//!
//! The classifier is stateless: given a count and a capacity it returns
//! the [`CrowdLevel`] band. Everything else in the engine derives from
//! this one function -- the store recomputes it on every write path and
//! the alert deduplicator keys off the `Critical` band it produces.

use crowdwatch_types::CrowdLevel;

/// Band threshold: at or above this occupancy percentage a zone is critical.
const CRITICAL_PCT: f64 = 95.0;

/// Band threshold: at or above this occupancy percentage a zone is high.
const HIGH_PCT: f64 = 80.0;

/// Band threshold: at or above this occupancy percentage a zone is medium.
const MEDIUM_PCT: f64 = 50.0;

/// Classify an occupancy count against a capacity.
///
/// Bands are inclusive of their lower bound: a zone at exactly 80% is
/// `High`, not `Medium`. Banding uses the unrounded ratio; rounding is a
/// display concern (see [`display_percent`]).
///
/// A capacity of zero returns `Low`. The creation invariant makes zero
/// capacity unreachable through normal mutation, but the guard keeps the
/// function total -- no division by zero, no panic.
pub fn classify(count: u32, capacity: u32) -> CrowdLevel {
    if capacity == 0 {
        return CrowdLevel::Low;
    }

    let pct = occupancy_percent(count, capacity);
    if pct >= CRITICAL_PCT {
        CrowdLevel::Critical
    } else if pct >= HIGH_PCT {
        CrowdLevel::High
    } else if pct >= MEDIUM_PCT {
        CrowdLevel::Medium
    } else {
        CrowdLevel::Low
    }
}

/// Unrounded occupancy percentage. Returns `0.0` for zero capacity.
///
/// `f64::from(u32)` is lossless, so the ratio is exact up to the division.
pub fn occupancy_percent(count: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    (f64::from(count) / f64::from(capacity)) * 100.0
}

/// Occupancy percentage rounded to the nearest whole number, for display.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn display_percent(count: u32, capacity: u32) -> u32 {
    // Bounded by count/capacity being u32, so the rounded value fits.
    occupancy_percent(count, capacity).round() as u32
}
