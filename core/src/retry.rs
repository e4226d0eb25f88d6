//! Retry with exponential backoff and jitter
//!
//! [`RetryManager`] re-invokes an async operation while its
//! [`RetryPredicate`] considers the failure transient, sleeping between
//! attempts on the tokio timer.

use crate::classifier::{DefaultRetryPredicate, RetryPredicate};
use crate::errors::{ConfigError, RetryError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// When false, the operation runs exactly once
    pub enabled: bool,
    /// Total invocations allowed, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Extra random delay as a fraction of the backoff (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::OutOfRange {
                field: "jitterFactor",
                min: 0.0,
                max: 1.0,
                value: self.jitter_factor,
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "backoffMultiplier",
                min: 1.0,
                max: f64::MAX,
                value: self.backoff_multiplier,
            });
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Inverted {
                field: "baseDelayMs",
                other: "maxDelayMs",
            });
        }
        Ok(())
    }
}

/// Cumulative retry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub total_attempts: u64,
    pub total_retries: u64,
    pub success_after_retry: u64,
    pub permanent_failures: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    total_attempts: AtomicU64,
    total_retries: AtomicU64,
    success_after_retry: AtomicU64,
    permanent_failures: AtomicU64,
}

/// Executes operations with bounded, jittered retries
pub struct RetryManager<P = DefaultRetryPredicate> {
    config: RetryConfig,
    predicate: P,
    stats: StatCounters,
}

impl RetryManager<DefaultRetryPredicate> {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_predicate(config, DefaultRetryPredicate)
    }
}

impl Default for RetryManager<DefaultRetryPredicate> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<P> RetryManager<P> {
    pub fn with_predicate(config: RetryConfig, predicate: P) -> Self {
        Self {
            config,
            predicate,
            stats: StatCounters::default(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// Backoff for `attempt` (1-based) without jitter, capped at `max_delay_ms`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.config.base_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.config.max_delay_ms as f64) as u64)
    }

    /// Backoff for `attempt` with up to `jitter_factor` extra random delay
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let jitter = if self.config.jitter_factor > 0.0 {
            rand::thread_rng().gen_range(0.0..1.0) * self.config.jitter_factor
        } else {
            0.0
        };
        let delay = (base * (1.0 + jitter)).min(self.config.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            total_attempts: self.stats.total_attempts.load(Ordering::Relaxed),
            total_retries: self.stats.total_retries.load(Ordering::Relaxed),
            success_after_retry: self.stats.success_after_retry.load(Ordering::Relaxed),
            permanent_failures: self.stats.permanent_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.stats.total_attempts.store(0, Ordering::Relaxed);
        self.stats.total_retries.store(0, Ordering::Relaxed);
        self.stats.success_after_retry.store(0, Ordering::Relaxed);
        self.stats.permanent_failures.store(0, Ordering::Relaxed);
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of attempts
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        P: RetryPredicate<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_in("operation", operation).await
    }

    /// Like [`execute`](Self::execute), labelling log output with `context`
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_in<F, Fut, T, E>(
        &self,
        context: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        P: RetryPredicate<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            self.stats.total_attempts.fetch_add(1, Ordering::Relaxed);
            return operation().await.map_err(|source| {
                self.stats.permanent_failures.fetch_add(1, Ordering::Relaxed);
                RetryError::NonRetryable { attempt: 1, source }
            });
        }

        let max_attempts = self.config.max_attempts;
        if max_attempts == 0 {
            warn!(context, "retry policy allows no attempts");
            return Err(RetryError::NoAttempts);
        }

        let mut attempt = 1;
        loop {
            self.stats.total_attempts.fetch_add(1, Ordering::Relaxed);
            debug!(context, attempt, max_attempts, "executing attempt");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.stats.success_after_retry.fetch_add(1, Ordering::Relaxed);
                        debug!(context, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= max_attempts {
                self.stats.permanent_failures.fetch_add(1, Ordering::Relaxed);
                warn!(context, attempts = attempt, %error, "all retry attempts exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            if !self.predicate.should_retry(&error, attempt) {
                self.stats.permanent_failures.fetch_add(1, Ordering::Relaxed);
                debug!(context, attempt, %error, "failure is not retryable");
                return Err(RetryError::NonRetryable {
                    attempt,
                    source: error,
                });
            }

            self.stats.total_retries.fetch_add(1, Ordering::Relaxed);
            let delay = self.calculate_delay(attempt);
            debug!(context, attempt, ?delay, %error, "retrying after delay");
            tokio::time::sleep(delay).await;

            attempt += 1;
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for RetryManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryManager")
            .field("config", &self.config)
            .field("predicate", &self.predicate)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PredicateFn;
    use crate::transport::TransportError;
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_on_retryable_failure() {
        let manager = RetryManager::new(config(4));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::http(503, "unavailable"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 4);
        assert!(matches!(err, RetryError::Exhausted { .. }));

        let stats = manager.stats();
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.total_retries, 3);
        assert_eq!(stats.permanent_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_client_error() {
        let manager = RetryManager::new(config(5));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::http(400, "bad request"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(RetryError::NonRetryable { attempt, source }) => {
                assert_eq!(attempt, 1);
                assert_eq!(source, TransportError::http(400, "bad request"));
            }
            other => panic!("expected non-retryable, got {:?}", other),
        }
        assert_eq!(manager.stats().total_retries, 0);
        assert_eq!(manager.stats().permanent_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_twice_then_succeed() {
        let manager = RetryManager::new(config(3));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = manager
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TransportError::connection("ECONNRESET", "reset"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        // 100ms + 200ms of backoff on the paused clock
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(300), "waited {waited:?}");
        assert!(waited < Duration::from_millis(320), "waited {waited:?}");

        let stats = manager.stats();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.total_retries, 2);
        assert_eq!(stats.success_after_retry, 1);
        assert_eq!(stats.permanent_failures, 0);
    }

    #[tokio::test]
    async fn test_zero_attempts_never_invokes() {
        let manager = RetryManager::new(config(0));
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<TransportError>> = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::NoAttempts)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.stats(), RetryStats::default());
    }

    #[tokio::test]
    async fn test_disabled_runs_once() {
        let manager = RetryManager::new(RetryConfig {
            enabled: false,
            ..config(5)
        });
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::timeout("slow"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.unwrap_err().into_inner(),
            Some(TransportError::timeout("slow"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let manager = RetryManager::with_predicate(
            config(3),
            PredicateFn::new(|err: &String, _attempt: u32| err == "busy"),
        );
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = manager
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("busy".to_string())
            })
            .await
            .map_err(|e| e.to_string());

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result.unwrap_err(),
            "all 3 attempts failed, last error: busy"
        );
    }

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let manager = RetryManager::new(config(10));

        assert_eq!(manager.base_delay(1), Duration::from_millis(100));
        assert_eq!(manager.base_delay(2), Duration::from_millis(200));
        assert_eq!(manager.base_delay(3), Duration::from_millis(400));
        assert_eq!(manager.base_delay(4), Duration::from_millis(800));
        assert_eq!(manager.base_delay(5), Duration::from_millis(1_000));
        assert_eq!(manager.base_delay(9), Duration::from_millis(1_000));

        let mut previous = Duration::ZERO;
        for attempt in 1..10 {
            let delay = manager.base_delay(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_jittered_delay_bounds() {
        let manager = RetryManager::new(RetryConfig {
            jitter_factor: 0.5,
            ..config(10)
        });

        for _ in 0..100 {
            let first = manager.calculate_delay(1);
            assert!(first >= Duration::from_millis(100));
            assert!(first <= Duration::from_millis(150));

            assert_eq!(manager.calculate_delay(6), Duration::from_millis(1_000));
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(RetryConfig::default().validate().is_ok());
        assert_eq!(
            RetryConfig {
                base_delay_ms: 5_000,
                max_delay_ms: 1_000,
                ..Default::default()
            }
            .validate(),
            Err(ConfigError::Inverted {
                field: "baseDelayMs",
                other: "maxDelayMs",
            })
        );
    }

    #[test]
    fn test_reset_stats() {
        let manager = RetryManager::default();
        manager.stats.total_attempts.fetch_add(3, Ordering::Relaxed);
        manager.reset_stats();
        assert_eq!(manager.stats(), RetryStats::default());
    }
}
