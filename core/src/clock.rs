//! Time sources for breaker and metrics bookkeeping
//!
//! Everything time-dependent in this crate reads the current instant through
//! a [`Clock`] so tests can drive state transitions without sleeping.
//! Retry delays are the exception: they use `tokio::time`, which tests control
//! with a paused runtime.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Monotonic instant, used for all elapsed-time arithmetic
    fn now(&self) -> Instant;

    /// Wall-clock time, used only for human-facing timestamps
    fn wall(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn wall(&self) -> DateTime<Utc> {
        (**self).wall()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same offset, so a clone handed to a circuit breaker can be
/// advanced from the test body.
///
/// ```rust
/// use resilience_machines::{Clock, MockClock};
/// use std::time::Duration;
///
/// let clock = MockClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now() - before, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    wall_start: DateTime<Utc>,
    offset: Arc<Mutex<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            wall_start: DateTime::<Utc>::default(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Total time advanced since creation
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset =
            chrono::Duration::from_std(self.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_start + offset
    }
}
