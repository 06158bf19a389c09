//! Reset boundary computation.
//!
//! All reset boundaries are phase-locked to a fixed anchor instant: a
//! boundary is always `anchor + k * interval` for some integer `k`. Nothing
//! here depends on when the process started, so a restarted scheduler lands
//! on exactly the same boundaries.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Reset cycle parameters, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCycle {
    /// Anchor instant boundaries are phase-locked to.
    pub anchor: DateTime<Utc>,
    /// Interval between boundaries.
    pub interval: Duration,
}

impl ResetCycle {
    /// Build from the configured anchor and interval seconds.
    #[must_use]
    pub fn new(anchor: DateTime<Utc>, interval_secs: u64) -> Self {
        Self {
            anchor,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// The first boundary strictly after `now`.
    #[must_use]
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_boundary(self.anchor, self.interval, now)
    }

    /// Time remaining from `now` until the next boundary. Always positive.
    #[must_use]
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Duration {
        let boundary = self.next_boundary(now);
        (boundary - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The first instant of the form `anchor + k * interval` (integer `k`)
/// strictly after `now`.
///
/// `now` may precede the anchor (`k` can be zero or negative-derived). When
/// `now` falls exactly on a boundary the *following* boundary is returned,
/// so the result is never `now` itself.
#[must_use]
pub fn next_boundary(
    anchor: DateTime<Utc>,
    interval: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX).max(1);
    let elapsed_ms = (now - anchor).num_milliseconds();

    // Strict ceiling: div_euclid floors toward negative infinity, so +1 both
    // advances partial cycles and skips an exact-multiple `now`.
    let next_cycle = elapsed_ms.div_euclid(interval_ms) + 1;

    anchor + TimeDelta::milliseconds(next_cycle * interval_ms)
}
