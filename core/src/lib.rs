//! ResilienceMachines - Resilient request execution for HTTP APIs
//!
//! This crate wraps a pluggable HTTP transport with:
//! - A circuit breaker built on a state machine (Closed → Open → HalfOpen)
//! - Retries with exponential backoff and jitter
//! - Request metrics with rolling response-time percentiles
//! - An injectable clock so every time-dependent rule is testable
//!
//! # Example
//!
//! ```rust
//! use resilience_machines::{
//!     ClientConfig, RequestSpec, ResilientClient, Response, TransportError, TransportFn,
//! };
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = TransportFn::new(|spec: RequestSpec| async move {
//!     Ok::<_, TransportError>(Response::for_request(&spec, 200, json!({ "sum": 3 })))
//! });
//!
//! let client = ResilientClient::new(transport, ClientConfig::default()).unwrap();
//! let response = client.get("/math/add?a=1&b=2").await.unwrap();
//! assert_eq!(response.body["sum"], 3);
//!
//! // Check circuit state and metrics
//! let snapshot = client.metrics_snapshot();
//! assert_eq!(snapshot.requests.successful, 1);
//! # }
//! ```
//!
//! The circuit breaker can also be used on its own:
//!
//! ```rust
//! use resilience_machines::CircuitBreaker;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let circuit = CircuitBreaker::builder("my_service")
//!     .failure_threshold(5)
//!     .volume_threshold(10)
//!     .reset_timeout(Duration::from_secs(30))
//!     .on_open(|t| println!("Circuit {} opened!", t.circuit))
//!     .build();
//!
//! let result = circuit.execute(|| async { Ok::<_, String>("success") }).await;
//! assert!(result.is_ok());
//!
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! # }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod classifier;
pub mod client;
pub mod clock;
pub mod config;
pub mod counters;
pub mod endpoint;
pub mod errors;
pub mod metrics;
pub mod retry;
pub mod transport;

pub use builder::CircuitBuilder;
pub use callbacks::{Callbacks, Transition};
pub use circuit::{CircuitBreaker, CircuitState, CircuitStats, Config};
pub use classifier::{DefaultRetryPredicate, PredicateFn, RetryPredicate};
pub use client::{ClientBuilder, ClientError, ClientSnapshot, RequestFailure, ResilientClient};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::ClientConfig;
pub use endpoint::normalize_endpoint;
pub use errors::{CircuitError, ConfigError, ErrorKind, FailureInfo, RetryError};
pub use metrics::{ErrorPhase, MetricsCollector, MetricsConfig, MetricsSnapshot};
pub use retry::{RetryConfig, RetryManager, RetryStats};
pub use transport::{ErrorResponse, Method, RequestSpec, Response, Transport, TransportError, TransportFn};
