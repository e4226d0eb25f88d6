//! Call counters backing circuit breaker decisions
//!
//! The counters are shared between the breaker and the state machine guards
//! through the circuit context, so they use atomics rather than `&mut`
//! access. Multi-counter updates happen while the breaker holds its state
//! lock.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Rolling success/failure tally for one circuit
#[derive(Debug, Default)]
pub struct CallCounters {
    failures: AtomicU64,
    successes: AtomicU64,
    requests: AtomicU64,
    last_failure: Mutex<Option<Instant>>,
}

impl CallCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::AcqRel);
        self.requests.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_failure(&self, at: Instant) {
        self.failures.fetch_add(1, Ordering::AcqRel);
        self.requests.fetch_add(1, Ordering::AcqRel);
        *self.last_failure.lock() = Some(at);
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Acquire)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Acquire)
    }

    pub fn last_failure(&self) -> Option<Instant> {
        *self.last_failure.lock()
    }

    /// Failures as a percentage of requests, 0 when nothing was counted
    pub fn failure_percentage(&self) -> f64 {
        let requests = self.request_count();
        if requests == 0 {
            return 0.0;
        }
        self.failure_count() as f64 / requests as f64 * 100.0
    }

    /// Zero the counts but remember when the last failure happened
    pub fn reset_counts(&self) {
        self.failures.store(0, Ordering::Release);
        self.successes.store(0, Ordering::Release);
        self.requests.store(0, Ordering::Release);
    }

    /// Zero the counts and forget the last failure
    pub fn clear(&self) {
        self.reset_counts();
        *self.last_failure.lock() = None;
    }
}
