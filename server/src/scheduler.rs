//! Fixed-period tick deadlines
//!
//! The deadline moves forward by exactly one period each time it passes, so
//! small overruns do not accumulate drift. A loop that falls several periods
//! behind is not compressed into one long tick: the following ticks simply
//! fire back to back with no idle wait until it catches up.

use std::time::Duration;
use tokio::time::Instant;

pub struct TickScheduler {
    period: Duration,
    next_deadline: Instant,
}

impl TickScheduler {
    /// First deadline is one period after `start`
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_deadline: start + period,
        }
    }

    pub fn from_rate(tick_rate: u32, start: Instant) -> Self {
        Self::new(
            Duration::from_nanos(1_000_000_000 / u64::from(tick_rate.max(1))),
            start,
        )
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Time left in the drain phase at `now`.
    ///
    /// Returns `None` once the deadline has passed, after advancing it by one
    /// period; the caller then leaves the drain phase and runs the tick.
    pub fn remaining(&mut self, now: Instant) -> Option<Duration> {
        if now >= self.next_deadline {
            self.next_deadline += self.period;
            return None;
        }
        Some(self.next_deadline - now)
    }
}
