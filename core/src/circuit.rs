//! Circuit breaker implementation using state machines
//!
//! The breaker counts outcomes while `Closed`, trips to `Open` once the
//! failure volume or rate crosses its thresholds, and lets traffic through
//! again as a `HalfOpen` probe after the reset timeout.

use crate::{
    callbacks::{Callbacks, Transition},
    clock::{Clock, SystemClock},
    counters::CallCounters,
    errors::{CircuitError, ConfigError},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use state_machines::state_machine;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// When false, calls pass straight through with no tracking
    pub enabled: bool,

    /// Failures needed to trip once the volume threshold is met
    pub failure_threshold: u64,

    /// Time spent Open before a half-open probe is allowed
    pub reset_timeout_ms: u64,

    /// Quiet period after the last failure before counts decay to zero
    pub monitoring_period_ms: u64,

    /// Minimum requests counted before either threshold is evaluated
    pub volume_threshold: u64,

    /// Failure percentage (0-100) that trips the circuit
    pub error_percentage_threshold: f64,

    /// Jitter applied to the reset timeout (0.0 = none, 1.0 = full)
    /// Uses chrono-machines formula: timeout * (1 - jitter + rand * jitter)
    pub reset_jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            monitoring_period_ms: 10_000,
            volume_threshold: 10,
            error_percentage_threshold: 50.0,
            reset_jitter_factor: 0.0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.error_percentage_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "errorPercentageThreshold",
                min: 0.0,
                max: 100.0,
                value: self.error_percentage_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.reset_jitter_factor) {
            return Err(ConfigError::OutOfRange {
                field: "resetJitterFactor",
                min: 0.0,
                max: 1.0,
                value: self.reset_jitter_factor,
            });
        }
        Ok(())
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms)
    }
}

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_machine(state: &str) -> Self {
        match state {
            "Open" => CircuitState::Open,
            "HalfOpen" => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Circuit breaker context - shared data across all states
#[derive(Debug, Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub counters: Arc<CallCounters>,
    pub clock: Arc<dyn Clock>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            counters: Arc::new(CallCounters::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: Option<Instant>,
    pub next_attempt_at: Option<Instant>,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    pub probes: u64,
}

// Define the circuit breaker state machine with dynamic mode
state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [timeout_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [probe_succeeded],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Circuit<Closed> {
    /// Volume gate first, then absolute count or failure percentage
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        let requests = ctx.counters.request_count();
        if requests < ctx.config.volume_threshold {
            return false;
        }

        ctx.counters.failure_count() >= ctx.config.failure_threshold
            || ctx.counters.failure_percentage() >= ctx.config.error_percentage_threshold
    }
}

impl Circuit<HalfOpen> {
    /// A failed probe always reopens
    fn should_open(&self, _ctx: &CircuitContext) -> bool {
        true
    }

    fn probe_succeeded(&self, ctx: &CircuitContext) -> bool {
        ctx.counters.success_count() > 0
    }
}

impl Circuit<Open> {
    fn timeout_elapsed(&self, ctx: &CircuitContext) -> bool {
        let now = ctx.clock.now();
        self.state_data_open()
            .and_then(|data| data.next_attempt_at)
            .is_none_or(|next| now >= next)
    }
}

/// Serializable view of a breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub name: String,
    pub enabled: bool,
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub request_count: u64,
    pub failure_percentage: f64,
    pub last_failure_ms_ago: Option<u64>,
    /// Present only while Open
    pub next_attempt_in_ms: Option<u64>,
}

/// Circuit breaker public API
///
/// State transitions happen under a mutex that is never held across an
/// `.await`, so the breaker can be shared between tasks on any runtime.
pub struct CircuitBreaker {
    machine: Mutex<DynamicCircuit>,
    context: CircuitContext,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a new circuit breaker (use builder() for more options)
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        let context = CircuitContext {
            name: name.into(),
            config,
            ..Default::default()
        };
        Self::with_context_and_callbacks(context, Callbacks::new())
    }

    /// Create a circuit breaker with custom context and callbacks (used by builder)
    pub(crate) fn with_context_and_callbacks(
        context: CircuitContext,
        callbacks: Callbacks,
    ) -> Self {
        let machine = DynamicCircuit::new(context.clone());

        Self {
            machine: Mutex::new(machine),
            context,
            callbacks,
        }
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn is_enabled(&self) -> bool {
        self.context.config.enabled
    }

    /// Run `operation` under circuit protection
    ///
    /// Rejections return [`CircuitError::Open`] without invoking the
    /// operation and without awaiting anything. Operation failures are
    /// returned unchanged inside [`CircuitError::Execution`].
    #[instrument(skip(self, operation), fields(circuit = %self.context.name))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.context.config.enabled {
            return operation().await.map_err(CircuitError::Execution);
        }

        self.try_acquire::<E>()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::Execution(e))
            }
        }
    }

    /// Whether a call would be let through right now
    ///
    /// Moves an expired Open circuit to HalfOpen as a side effect.
    pub fn can_execute(&self) -> bool {
        !self.context.config.enabled || self.try_acquire::<()>().is_ok()
    }

    fn try_acquire<E>(&self) -> Result<(), CircuitError<E>> {
        let mut transition = None;

        let result = {
            let mut machine = self.machine.lock();

            if machine.current_state() == "Open"
                && machine.handle(CircuitEvent::AttemptReset).is_ok()
            {
                self.context.counters.reset_counts();
                transition = Some((CircuitState::Open, CircuitState::HalfOpen));
            }

            match machine.current_state() {
                "Open" => {
                    let retry_in = self.retry_in(&machine);
                    debug!(circuit = %self.context.name, ?retry_in, "circuit open, rejecting call");
                    Err(CircuitError::Open {
                        circuit: self.context.name.clone(),
                        state: CircuitState::Open,
                        retry_in,
                    })
                }
                "HalfOpen" => {
                    if let Some(data) = machine.half_open_data_mut() {
                        data.probes += 1;
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        };

        if let Some((from, to)) = transition {
            info!(circuit = %self.context.name, "circuit half-open, probing");
            self.notify(from, to);
        }
        result
    }

    fn record_success(&self) {
        let counters = &self.context.counters;
        let mut closed = false;

        {
            let mut machine = self.machine.lock();
            counters.record_success();

            match machine.current_state() {
                "HalfOpen" => {
                    if machine.handle(CircuitEvent::Close).is_ok() {
                        counters.clear();
                        closed = true;
                    }
                }
                "Closed" => {
                    let now = self.context.clock.now();
                    let quiet = counters.last_failure().is_none_or(|at| {
                        now.saturating_duration_since(at) >= self.context.config.monitoring_period()
                    });
                    if quiet {
                        counters.reset_counts();
                    }
                }
                _ => {}
            }
        }

        if closed {
            info!(circuit = %self.context.name, "circuit closed after successful probe");
            self.notify(CircuitState::HalfOpen, CircuitState::Closed);
        }
    }

    fn record_failure(&self) {
        let counters = &self.context.counters;
        let now = self.context.clock.now();
        let mut opened_from = None;

        {
            let mut machine = self.machine.lock();
            counters.record_failure(now);

            let from = CircuitState::from_machine(machine.current_state());
            if from != CircuitState::Open && machine.handle(CircuitEvent::Trip).is_ok() {
                self.mark_open(&mut machine, now);
                opened_from = Some(from);
            }
        }

        if let Some(from) = opened_from {
            warn!(
                circuit = %self.context.name,
                failures = counters.failure_count(),
                requests = counters.request_count(),
                "circuit opened"
            );
            self.notify(from, CircuitState::Open);
        }
    }

    /// Apply Open-state bookkeeping
    fn mark_open(&self, machine: &mut DynamicCircuit, now: Instant) {
        let timeout = self.jittered_reset_timeout();
        if let Some(data) = machine.open_data_mut() {
            data.opened_at = Some(now);
            data.next_attempt_at = Some(now + timeout);
        }
    }

    fn jittered_reset_timeout(&self) -> Duration {
        let config = &self.context.config;
        if config.reset_jitter_factor <= 0.0 {
            return config.reset_timeout();
        }

        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms: config.reset_timeout_ms,
            multiplier: 1.0,
            max_delay_ms: config.reset_timeout_ms,
        };
        Duration::from_millis(policy.calculate_delay(1, config.reset_jitter_factor))
    }

    fn retry_in(&self, machine: &DynamicCircuit) -> Duration {
        let now = self.context.clock.now();
        machine
            .open_data()
            .and_then(|data| data.next_attempt_at)
            .map(|next| next.saturating_duration_since(now))
            .unwrap_or_default()
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        self.callbacks.trigger(&Transition {
            circuit: &self.context.name,
            from,
            to,
        });
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        CircuitState::from_machine(self.machine.lock().current_state())
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Snapshot of state and counters
    pub fn stats(&self) -> CircuitStats {
        let machine = self.machine.lock();
        let counters = &self.context.counters;
        let now = self.context.clock.now();
        let state = CircuitState::from_machine(machine.current_state());

        let next_attempt_in_ms = match state {
            CircuitState::Open => Some(self.retry_in(&machine).as_millis() as u64),
            _ => None,
        };

        CircuitStats {
            name: self.context.name.clone(),
            enabled: self.context.config.enabled,
            state,
            failure_count: counters.failure_count(),
            success_count: counters.success_count(),
            request_count: counters.request_count(),
            failure_percentage: counters.failure_percentage(),
            last_failure_ms_ago: counters
                .last_failure()
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            next_attempt_in_ms,
        }
    }

    /// Clear all counters and force the circuit Closed
    pub fn reset(&self) {
        let mut machine = self.machine.lock();
        self.context.counters.clear();
        *machine = DynamicCircuit::new(self.context.clone());
        info!(circuit = %self.context.name, "circuit reset");
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("context", &self.context)
            .field("state", &self.state())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(clock: &MockClock, config: Config) -> CircuitBreaker {
        CircuitBreaker::builder("test")
            .config(config)
            .clock(Arc::new(clock.clone()))
            .build()
    }

    fn tripping_config() -> Config {
        Config {
            failure_threshold: 3,
            volume_threshold: 3,
            reset_timeout_ms: 1_000,
            monitoring_period_ms: 10_000,
            ..Default::default()
        }
    }

    async fn fail(circuit: &CircuitBreaker) -> Result<(), CircuitError<&'static str>> {
        circuit.execute(|| async { Err("boom") }).await
    }

    async fn succeed(circuit: &CircuitBreaker) -> Result<u32, CircuitError<&'static str>> {
        circuit.execute(|| async { Ok(7) }).await
    }

    #[test]
    fn test_circuit_breaker_creation() {
        let circuit = CircuitBreaker::new("test", Config::default());

        assert!(circuit.is_closed());
        assert!(!circuit.is_open());
        assert_eq!(circuit.name(), "test");
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_short_circuits() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        let _ = fail(&circuit).await;
        let _ = fail(&circuit).await;
        assert!(circuit.is_closed());

        let third = fail(&circuit).await;
        assert!(matches!(third, Err(CircuitError::Execution("boom"))));
        assert!(circuit.is_open());

        let invoked = AtomicUsize::new(0);
        let fourth = circuit
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;

        match fourth {
            Err(CircuitError::Open {
                circuit: name,
                state,
                retry_in,
            }) => {
                assert_eq!(name, "test");
                assert_eq!(state, CircuitState::Open);
                assert_eq!(retry_in, Duration::from_secs(1));
            }
            other => panic!("expected open rejection, got {:?}", other),
        }
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_volume_threshold_gates_tripping() {
        let clock = MockClock::new();
        let circuit = breaker(
            &clock,
            Config {
                failure_threshold: 1,
                volume_threshold: 5,
                ..Default::default()
            },
        );

        for _ in 0..4 {
            let _ = fail(&circuit).await;
        }
        assert!(circuit.is_closed(), "opened before volume threshold");

        let _ = fail(&circuit).await;
        assert!(circuit.is_open());
    }

    #[tokio::test]
    async fn test_error_percentage_trips() {
        let clock = MockClock::new();
        let circuit = breaker(
            &clock,
            Config {
                failure_threshold: 100,
                volume_threshold: 4,
                error_percentage_threshold: 50.0,
                ..Default::default()
            },
        );

        // Failure first so successes do not decay the window
        let _ = fail(&circuit).await;
        let _ = succeed(&circuit).await;
        let _ = succeed(&circuit).await;
        assert!(circuit.is_closed());

        let _ = fail(&circuit).await;
        assert!(circuit.is_open(), "2 of 4 failed, should trip at 50%");
    }

    #[tokio::test]
    async fn test_half_open_recovery_resets_counters() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }
        assert!(circuit.is_open());

        clock.advance_millis(999);
        assert!(succeed(&circuit).await.unwrap_err().is_open());

        clock.advance_millis(1);
        assert_eq!(succeed(&circuit).await.unwrap(), 7);

        let stats = circuit.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 0);
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.last_failure_ms_ago, None);
        assert_eq!(stats.next_attempt_in_ms, None);
    }

    #[tokio::test]
    async fn test_half_open_probe_failure_reopens() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }
        clock.advance_millis(1_000);

        assert!(circuit.can_execute());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert_eq!(circuit.stats().request_count, 0);

        let probe = fail(&circuit).await;
        assert!(matches!(probe, Err(CircuitError::Execution("boom"))));
        assert!(circuit.is_open());
        assert_eq!(circuit.stats().next_attempt_in_ms, Some(1_000));
    }

    #[tokio::test]
    async fn test_concurrent_probes_pass_while_half_open() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }
        clock.advance_millis(1_000);

        assert!(circuit.can_execute());
        assert!(circuit.can_execute());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_quiet_period_decays_counts() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        let _ = fail(&circuit).await;
        let _ = fail(&circuit).await;
        assert_eq!(circuit.stats().failure_count, 2);

        // Success inside the monitoring period keeps counting
        let _ = succeed(&circuit).await;
        let stats = circuit.stats();
        assert_eq!(stats.request_count, 3);
        assert_eq!(stats.request_count, stats.failure_count + stats.success_count);

        clock.advance_millis(10_000);
        let _ = succeed(&circuit).await;
        let stats = circuit.stats();
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.failure_count, 0);
        assert!(stats.last_failure_ms_ago.is_some());

        // Two fresh failures are not enough to trip after the decay
        let _ = fail(&circuit).await;
        let _ = fail(&circuit).await;
        assert!(circuit.is_closed());
    }

    #[tokio::test]
    async fn test_success_without_failures_keeps_counts_at_zero() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        for _ in 0..5 {
            let _ = succeed(&circuit).await;
        }
        assert_eq!(circuit.stats().request_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_circuit_passes_through() {
        let clock = MockClock::new();
        let circuit = breaker(
            &clock,
            Config {
                enabled: false,
                ..tripping_config()
            },
        );

        for _ in 0..10 {
            let result = fail(&circuit).await;
            assert!(matches!(result, Err(CircuitError::Execution("boom"))));
        }
        assert!(circuit.is_closed());
        assert_eq!(circuit.stats().request_count, 0);
        assert!(circuit.can_execute());
    }

    #[tokio::test]
    async fn test_next_attempt_only_while_open() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        assert_eq!(circuit.stats().next_attempt_in_ms, None);
        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }
        assert_eq!(circuit.stats().next_attempt_in_ms, Some(1_000));

        clock.advance_millis(400);
        assert_eq!(circuit.stats().next_attempt_in_ms, Some(600));

        clock.advance_millis(600);
        circuit.can_execute();
        assert_eq!(circuit.stats().next_attempt_in_ms, None);
    }

    #[tokio::test]
    async fn test_callbacks_follow_state_machine() {
        let clock = MockClock::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let circuit = {
            let (open_log, half_log, close_log) = (log.clone(), log.clone(), log.clone());
            CircuitBreaker::builder("payments")
                .config(tripping_config())
                .clock(Arc::new(clock.clone()))
                .on_open(move |t| open_log.lock().push((t.from, t.to)))
                .on_half_open(move |t| half_log.lock().push((t.from, t.to)))
                .on_close(move |t| close_log.lock().push((t.from, t.to)))
                .build()
        };

        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }
        clock.advance_millis(1_000);
        let _ = succeed(&circuit).await;

        assert_eq!(
            *log.lock(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let clock = MockClock::new();
        let circuit = breaker(&clock, tripping_config());

        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }
        assert!(circuit.is_open());

        circuit.reset();
        assert!(circuit.is_closed());
        assert_eq!(circuit.stats().failure_count, 0);
        assert_eq!(succeed(&circuit).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_reset_jitter_shortens_timeout_within_bounds() {
        let clock = MockClock::new();
        let circuit = breaker(
            &clock,
            Config {
                reset_jitter_factor: 0.5,
                ..tripping_config()
            },
        );

        for _ in 0..3 {
            let _ = fail(&circuit).await;
        }

        let wait = circuit.stats().next_attempt_in_ms.unwrap();
        assert!((500..=1_000).contains(&wait), "jittered wait {wait} out of range");

        clock.advance_millis(1_000);
        assert!(circuit.can_execute());
    }

    #[test]
    fn test_state_machine_closed_to_open_guard() {
        let counters = Arc::new(CallCounters::new());
        let ctx = CircuitContext {
            name: "test_circuit".to_string(),
            config: tripping_config(),
            counters: counters.clone(),
            ..Default::default()
        };

        let mut circuit = DynamicCircuit::new(ctx);
        assert!(
            circuit.handle(CircuitEvent::Trip).is_err(),
            "Should fail guard when below threshold"
        );

        for _ in 0..3 {
            counters.record_failure(Instant::now());
        }
        circuit
            .handle(CircuitEvent::Trip)
            .expect("Should open after reaching threshold");
        assert_eq!(circuit.current_state(), "Open");
    }

    #[test]
    fn test_state_machine_rejects_illegal_transitions() {
        let mut circuit = DynamicCircuit::new(CircuitContext::default());

        assert!(circuit.handle(CircuitEvent::Close).is_err());
        assert!(circuit.handle(CircuitEvent::AttemptReset).is_err());
        assert_eq!(circuit.current_state(), "Closed");
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let bad = Config {
            error_percentage_threshold: 120.0,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::OutOfRange {
                field: "errorPercentageThreshold",
                ..
            })
        ));
    }

    #[test]
    fn test_state_serializes_like_wire_names() {
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"HALF_OPEN\""
        );
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }
}
