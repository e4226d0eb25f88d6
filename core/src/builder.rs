//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::{Callbacks, Transition},
    circuit::{CircuitBreaker, CircuitContext, Config},
    clock::{Clock, SystemClock},
    counters::CallCounters,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with fluent API
pub struct CircuitBuilder {
    name: String,
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            clock: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Turn protection on or off
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the absolute failure threshold (number of failures to open circuit)
    pub fn failure_threshold(mut self, threshold: u64) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set how long the circuit stays open before probing
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the quiet period after which counts decay on success
    pub fn monitoring_period(mut self, period: Duration) -> Self {
        self.config.monitoring_period_ms = period.as_millis() as u64;
        self
    }

    /// Set minimum number of calls before either threshold is evaluated
    pub fn volume_threshold(mut self, calls: u64) -> Self {
        self.config.volume_threshold = calls;
        self
    }

    /// Set the failure percentage (0-100) that opens the circuit
    pub fn error_percentage_threshold(mut self, percentage: f64) -> Self {
        self.config.error_percentage_threshold = percentage.clamp(0.0, 100.0);
        self
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter)
    pub fn reset_jitter_factor(mut self, factor: f64) -> Self {
        self.config.reset_jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Use a custom time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace all transition callbacks at once
    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Set callback for when circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transition<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transition<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&Transition<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let context = CircuitContext {
            name: self.name,
            config: self.config,
            counters: Arc::new(CallCounters::new()),
            clock,
        };

        CircuitBreaker::with_context_and_callbacks(context, self.callbacks)
    }
}
