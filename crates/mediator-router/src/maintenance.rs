//! Interval-gated maintenance trigger
//!
//! Maintenance work (cleanup, statistics) piggybacks on regular traffic.
//! Every message handler asks the gate whether the interval has elapsed;
//! exactly one caller per interval window gets to run the work, all others
//! pay a single atomic load.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Single-winner gate over a "last run" timestamp
#[derive(Debug)]
pub struct MaintenanceGate {
    origin: Instant,
    /// Last run, in nanoseconds since `origin`
    last_run: AtomicU64,
}

impl MaintenanceGate {
    /// Create a gate whose first window ends one interval after `now`
    pub fn new(now: Instant) -> Self {
        Self {
            origin: now,
            last_run: AtomicU64::new(0),
        }
    }

    /// Claim the current window. True for exactly one caller once more
    /// than `interval` has passed since the last claimed window.
    pub fn try_enter(&self, now: Instant, interval: Duration) -> bool {
        self.try_enter_since(now, interval).is_some()
    }

    /// Like [`try_enter`](Self::try_enter), returning the time of the
    /// previous run to the winner
    pub fn try_enter_since(&self, now: Instant, interval: Duration) -> Option<Instant> {
        let now_nanos = nanos(now.saturating_duration_since(self.origin));
        let interval_nanos = nanos(interval);

        let mut last = self.last_run.load(Ordering::Acquire);
        loop {
            if last.saturating_add(interval_nanos) >= now_nanos {
                return None;
            }
            match self.last_run.compare_exchange_weak(
                last,
                now_nanos,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(self.origin + Duration::from_nanos(last)),
                Err(actual) => last = actual,
            }
        }
    }

    /// Time of the last claimed window
    pub fn last_run(&self) -> Instant {
        self.origin + Duration::from_nanos(self.last_run.load(Ordering::Acquire))
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
