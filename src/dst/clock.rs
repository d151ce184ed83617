//! `SimClock` - Simulated Time
//!
//! `TigerStyle`: Deterministic, controllable time. Time only moves forward.
//!
//! The engine takes a `SimClock` at construction and reads all timestamps
//! from it, so TTL and expiry behavior is fully controllable in tests. In
//! production the clock is initialized from wall time once and advanced by
//! a ticker task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::constants::{DST_TIME_ADVANCE_MS_MAX, TIME_MS_PER_SEC};

/// A shared, monotonically advancing clock.
///
/// Clones share the underlying time (Arc). Advancing wakes async sleepers.
#[derive(Debug, Clone)]
pub struct SimClock {
    current_ms: Arc<AtomicU64>,
    notify: Arc<Notify>,
}

impl SimClock {
    /// Create a clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::at_ms(0)
    }

    /// Create a clock starting at the given millisecond timestamp.
    #[must_use]
    pub fn at_ms(start_ms: u64) -> Self {
        Self {
            current_ms: Arc::new(AtomicU64::new(start_ms)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a clock starting at the given `DateTime`.
    #[must_use]
    pub fn at_datetime(dt: DateTime<Utc>) -> Self {
        Self::at_ms(dt.timestamp_millis().max(0) as u64)
    }

    /// Create a clock starting at the current wall time.
    #[must_use]
    pub fn from_system_time() -> Self {
        Self::at_datetime(Utc::now())
    }

    /// Current time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Current time in seconds (truncated).
    #[must_use]
    pub fn now_secs(&self) -> u64 {
        self.now_ms() / TIME_MS_PER_SEC
    }

    /// Current time as `DateTime<Utc>`.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms() as i64).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Advance time by the given milliseconds, waking sleepers.
    ///
    /// # Panics
    /// Panics if `ms` exceeds `DST_TIME_ADVANCE_MS_MAX`.
    pub fn advance_ms(&self, ms: u64) -> u64 {
        // Precondition
        assert!(
            ms <= DST_TIME_ADVANCE_MS_MAX,
            "advance_ms({}) exceeds max ({})",
            ms,
            DST_TIME_ADVANCE_MS_MAX
        );

        let old = self.current_ms.fetch_add(ms, Ordering::SeqCst);
        let new = old.saturating_add(ms);
        self.notify.notify_waiters();

        // Postcondition: time never goes backwards
        assert!(new >= old, "time must not go backwards");
        new
    }

    /// Advance time by a chrono `Duration`.
    pub fn advance(&self, duration: chrono::Duration) -> u64 {
        debug_assert!(duration >= chrono::Duration::zero(), "cannot go back in time");
        self.advance_ms(duration.num_milliseconds().max(0) as u64)
    }

    /// Elapsed milliseconds since a given timestamp (saturating).
    #[must_use]
    pub fn elapsed_since(&self, since_ms: u64) -> u64 {
        self.now_ms().saturating_sub(since_ms)
    }

    /// Whether a `DateTime` deadline has passed.
    #[must_use]
    pub fn is_past(&self, deadline: DateTime<Utc>) -> bool {
        self.now() > deadline
    }

    /// Sleep until `duration_ms` has passed on this clock.
    ///
    /// Yields until another task advances the clock far enough.
    pub async fn sleep_ms(&self, duration_ms: u64) {
        let target_ms = self.now_ms().saturating_add(duration_ms);
        while self.now_ms() < target_ms {
            self.notify.notified().await;
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
