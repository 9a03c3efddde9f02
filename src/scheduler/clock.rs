//! Wall-clock source and boundary alignment for the collection loop.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time from `now` to the next instant that is an exact multiple of
/// `period` since the Unix epoch.
///
/// A `now` sitting exactly on a boundary waits a full period. A zero
/// period yields zero.
#[must_use]
pub fn until_next_boundary(now: DateTime<Utc>, period: Duration) -> Duration {
    let Ok(period_ms) = i64::try_from(period.as_millis()) else {
        return period;
    };
    if period_ms == 0 {
        return Duration::ZERO;
    }
    let now_ms = now.timestamp_millis();
    let into_period = now_ms.rem_euclid(period_ms);
    let remaining = period_ms.saturating_sub(into_period);
    Duration::from_millis(u64::try_from(remaining).unwrap_or_default())
}

/// The next aligned boundary after `now`.
#[must_use]
pub fn next_boundary(now: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    let delay = until_next_boundary(now, period);
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}
