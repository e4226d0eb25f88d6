//! Resilient HTTP client
//!
//! Composes the pieces around a [`Transport`]: metrics are recorded around the
//! whole request, the circuit breaker wraps the retry loop, and the retry loop
//! wraps the single transport call.

use crate::{
    callbacks::Callbacks,
    circuit::{CircuitBreaker, CircuitStats},
    classifier::{DefaultRetryPredicate, RetryPredicate},
    clock::{Clock, SystemClock},
    config::ClientConfig,
    errors::{CIRCUIT_OPEN_CODE, CircuitError, ConfigError, ErrorKind, FailureInfo, RetryError, VALIDATION_CODE},
    metrics::{
        ErrorMetrics, ErrorPhase, MetricsCollector, RequestMetrics, ThroughputMetrics,
        TimingMetrics,
    },
    retry::{RetryManager, RetryStats},
    transport::{Method, RequestSpec, Response, Transport, TransportError},
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Circuit name used when none is configured
pub const DEFAULT_CIRCUIT_NAME: &str = "api";

/// Why a request failed, before it is wrapped in a [`ClientError`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestFailure {
    /// The breaker rejected the request without sending it
    #[error("circuit '{circuit}' is open, retry in {}ms", .retry_in.as_millis())]
    CircuitOpen {
        circuit: String,
        retry_in: Duration,
        url: String,
    },
    /// The retry policy allows zero attempts
    #[error("retry policy allows no attempts (max_attempts = 0)")]
    NoAttempts { url: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FailureInfo for RequestFailure {
    fn code(&self) -> Option<&str> {
        match self {
            RequestFailure::CircuitOpen { .. } => Some(CIRCUIT_OPEN_CODE),
            RequestFailure::NoAttempts { .. } => Some(VALIDATION_CODE),
            RequestFailure::Transport(e) => e.code(),
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            RequestFailure::Transport(e) => e.status(),
            _ => None,
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            RequestFailure::CircuitOpen { url, .. } | RequestFailure::NoAttempts { url } => {
                Some(url)
            }
            RequestFailure::Transport(e) => e.url(),
        }
    }
}

/// Error returned by [`ResilientClient`]
///
/// `code` is the classified failure kind and `cause` keeps the original
/// failure, also reachable through [`std::error::Error::source`].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{operation} failed ({code}): {message}")]
pub struct ClientError {
    pub code: ErrorKind,
    pub message: String,
    pub operation: String,
    #[source]
    pub cause: RequestFailure,
}

impl ClientError {
    fn new(operation: String, cause: RequestFailure) -> Self {
        Self {
            code: cause.kind(),
            message: cause.to_string(),
            operation,
            cause,
        }
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }

    pub fn is_circuit_open(&self) -> bool {
        self.code == ErrorKind::CircuitOpen
    }
}

/// Everything the client knows about its own health
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    pub requests: RequestMetrics,
    pub timing: TimingMetrics,
    pub errors: ErrorMetrics,
    pub throughput: ThroughputMetrics,
    pub circuit_breaker: CircuitStats,
    pub retry_stats: RetryStats,
}

type SharedPredicate = Arc<dyn RetryPredicate<TransportError>>;

/// HTTP client with circuit breaking, retries and metrics
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    retry: RetryManager<SharedPredicate>,
    metrics: MetricsCollector,
    clock: Arc<dyn Clock>,
}

impl ResilientClient {
    /// Client with the default predicate, system clock and no callbacks
    pub fn new(transport: impl Transport + 'static, config: ClientConfig) -> Result<Self, ConfigError> {
        Self::builder(transport).config(config).build()
    }

    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder::new(Arc::new(transport))
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry_manager(&self) -> &RetryManager<SharedPredicate> {
        &self.retry
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Send one logical request through breaker, retry and transport
    #[instrument(skip(self, spec), fields(method = %spec.method, url = %spec.url))]
    pub async fn request(&self, spec: RequestSpec) -> Result<Response, ClientError> {
        let operation = format!("{} {}", spec.method, spec.url);
        self.metrics.record_request_start(spec.method, &spec.url);

        if let Err(invalid) = spec.validate() {
            return Err(self.fail(operation, ErrorPhase::Request, invalid.into()));
        }

        let started = self.clock.now();
        let transport = &self.transport;
        let spec_ref = &spec;
        let send = || async move {
            transport
                .send(spec_ref)
                .await
                .map_err(|e| e.with_url(spec_ref.url.as_str()))
        };

        let result = self
            .breaker
            .execute(|| self.retry.execute_in(&operation, send))
            .await;

        match result {
            Ok(response) => {
                let elapsed = self.clock.now().saturating_duration_since(started);
                self.metrics
                    .record_response(response.status, &spec.url, elapsed);
                debug!(status = response.status, ?elapsed, "request completed");
                Ok(response)
            }
            Err(err) => {
                let failure = match err {
                    CircuitError::Open {
                        circuit, retry_in, ..
                    } => RequestFailure::CircuitOpen {
                        circuit,
                        retry_in,
                        url: spec.url.clone(),
                    },
                    CircuitError::Execution(RetryError::NoAttempts) => RequestFailure::NoAttempts {
                        url: spec.url.clone(),
                    },
                    CircuitError::Execution(
                        RetryError::NonRetryable { source, .. } | RetryError::Exhausted { source, .. },
                    ) => RequestFailure::Transport(source),
                };
                let phase = if failure.status().is_some() {
                    ErrorPhase::Response
                } else {
                    ErrorPhase::Request
                };
                Err(self.fail(operation, phase, failure))
            }
        }
    }

    fn fail(&self, operation: String, phase: ErrorPhase, failure: RequestFailure) -> ClientError {
        self.metrics.record_error(phase, &failure);
        let error = ClientError::new(operation, failure);
        warn!(code = %error.code, status = ?error.status(), "{}", error.message);
        error
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<Response, ClientError> {
        self.request(RequestSpec::new(Method::Get, url)).await
    }

    pub async fn delete(&self, url: impl Into<String>) -> Result<Response, ClientError> {
        self.request(RequestSpec::new(Method::Delete, url)).await
    }

    pub async fn post(&self, url: impl Into<String>, body: Value) -> Result<Response, ClientError> {
        self.request(RequestSpec::new(Method::Post, url).json(body))
            .await
    }

    pub async fn put(&self, url: impl Into<String>, body: Value) -> Result<Response, ClientError> {
        self.request(RequestSpec::new(Method::Put, url).json(body))
            .await
    }

    pub async fn patch(&self, url: impl Into<String>, body: Value) -> Result<Response, ClientError> {
        self.request(RequestSpec::new(Method::Patch, url).json(body))
            .await
    }

    pub fn metrics_snapshot(&self) -> ClientSnapshot {
        let metrics = self.metrics.snapshot();
        ClientSnapshot {
            requests: metrics.requests,
            timing: metrics.timing,
            errors: metrics.errors,
            throughput: metrics.throughput,
            circuit_breaker: self.breaker.stats(),
            retry_stats: self.retry.stats(),
        }
    }

    /// Force the breaker closed and clear metrics
    pub fn close(&self) {
        self.breaker.reset();
        self.metrics.reset();
    }
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResilientClient`]
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    name: String,
    predicate: SharedPredicate,
    clock: Arc<dyn Clock>,
    callbacks: Callbacks,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
            name: DEFAULT_CIRCUIT_NAME.to_string(),
            predicate: Arc::new(DefaultRetryPredicate),
            clock: Arc::new(SystemClock),
            callbacks: Callbacks::new(),
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Name of the client's circuit, used in errors and logs
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the default retry predicate
    pub fn retry_predicate(mut self, predicate: impl RetryPredicate<TransportError> + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> Result<ResilientClient, ConfigError> {
        self.config.validate()?;

        let breaker = CircuitBreaker::builder(self.name)
            .config(self.config.circuit_breaker)
            .clock(self.clock.clone())
            .callbacks(self.callbacks)
            .build();

        Ok(ResilientClient {
            transport: self.transport,
            breaker,
            retry: RetryManager::with_predicate(self.config.retry, self.predicate),
            metrics: MetricsCollector::with_clock(self.config.metrics, self.clock.clone()),
            clock: self.clock,
        })
    }
}
