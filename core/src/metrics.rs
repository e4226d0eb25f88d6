//! Request metrics
//!
//! [`MetricsCollector`] is a passive recorder. It never fails and never
//! blocks beyond a short critical section, so it can sit on the request path.
//! Throughput is computed when a snapshot is taken rather than by a
//! background task.

use crate::clock::{Clock, SystemClock};
use crate::endpoint::normalize_endpoint;
use crate::errors::{ConfigError, ErrorKind, FailureInfo};
use crate::transport::Method;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Capacity of the recent-errors ring buffer
pub const RECENT_ERRORS_CAPACITY: usize = 100;

/// Percentiles reported in every snapshot
pub const PERCENTILES: [u8; 5] = [50, 75, 90, 95, 99];

const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    /// Maximum age of a response-time sample
    pub metrics_window_ms: u64,
    /// Maximum number of response-time samples kept
    pub max_data_points: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            metrics_window_ms: 300_000,
            max_data_points: 1_000,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_data_points == 0 {
            return Err(ConfigError::OutOfRange {
                field: "maxDataPoints",
                min: 1.0,
                max: f64::MAX,
                value: 0.0,
            });
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.metrics_window_ms)
    }
}

/// Where in the request lifecycle an error was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPhase {
    Request,
    Response,
}

/// One entry of the recent-errors ring buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentError {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub endpoint: String,
    pub message: String,
    pub phase: ErrorPhase,
}

/// Request counters and rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percentage 0-100, 0 when nothing was recorded
    pub success_rate: f64,
    pub error_rate: f64,
    pub by_method: BTreeMap<String, u64>,
    pub by_endpoint: BTreeMap<String, u64>,
    pub by_status: BTreeMap<u16, u64>,
}

/// Response-time aggregates over the in-window samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMetrics {
    pub samples: usize,
    /// Rounded to whole milliseconds
    pub average_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<f64>,
    /// Keyed `p50`, `p75`, ... and absent when there are no samples
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<BTreeMap<String, f64>>,
}

/// Error breakdowns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetrics {
    pub total: u64,
    pub by_type: BTreeMap<ErrorKind, u64>,
    pub by_status: BTreeMap<u16, u64>,
    pub by_endpoint: BTreeMap<String, u64>,
    pub recent: Vec<RecentError>,
}

/// Throughput computed at snapshot time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputMetrics {
    pub uptime_ms: u64,
    /// Requests started per second since the collector started
    pub requests_per_second: f64,
    pub requests_last_minute: u64,
    /// True after [`MetricsCollector::stop`]
    pub stopped: bool,
}

/// Immutable view of the collector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests: RequestMetrics,
    pub timing: TimingMetrics,
    pub errors: ErrorMetrics,
    pub throughput: ThroughputMetrics,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    millis: f64,
}

#[derive(Debug)]
struct State {
    started_at: Instant,
    stopped_at: Option<Instant>,
    requests: RequestMetrics,
    timing: TimingMetrics,
    errors: ErrorMetrics,
    recent_errors: VecDeque<RecentError>,
    samples: VecDeque<Sample>,
    request_starts: VecDeque<Instant>,
}

impl State {
    fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            stopped_at: None,
            requests: RequestMetrics::default(),
            timing: TimingMetrics::default(),
            errors: ErrorMetrics::default(),
            recent_errors: VecDeque::with_capacity(RECENT_ERRORS_CAPACITY),
            samples: VecDeque::new(),
            request_starts: VecDeque::new(),
        }
    }

    fn evict(&mut self, now: Instant, config: &MetricsConfig) {
        let window = config.window();
        while self
            .samples
            .front()
            .is_some_and(|s| now.saturating_duration_since(s.at) > window)
        {
            self.samples.pop_front();
        }
        while self.samples.len() > config.max_data_points {
            self.samples.pop_front();
        }
    }

    fn recompute_timing(&mut self) {
        let mut sorted: Vec<f64> = self.samples.iter().map(|s| s.millis).collect();
        sorted.sort_by(f64::total_cmp);

        if sorted.is_empty() {
            self.timing = TimingMetrics::default();
            return;
        }

        let sum: f64 = sorted.iter().sum();
        let percentiles = PERCENTILES
            .iter()
            .filter_map(|&p| percentile(&sorted, p as f64).map(|v| (format!("p{p}"), v)))
            .collect();

        self.timing = TimingMetrics {
            samples: sorted.len(),
            average_ms: (sum / sorted.len() as f64).round() as u64,
            min_ms: sorted.first().copied(),
            max_ms: sorted.last().copied(),
            percentiles: Some(percentiles),
        };
    }

    fn prune_request_starts(&mut self, now: Instant) {
        while self
            .request_starts
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) > THROUGHPUT_WINDOW)
        {
            self.request_starts.pop_front();
        }
    }
}

/// Value at percentile `p` of an ascending slice
///
/// Uses the nearest-rank index `ceil(p / 100 * n) - 1`, clamped to the slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    sorted.get(index).copied()
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Rolling request/response/error recorder
pub struct MetricsCollector {
    config: MetricsConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        let state = State::new(clock.now());
        Self {
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn record_request_start(&self, method: Method, url: &str) {
        let endpoint = normalize_endpoint(url);
        let now = self.clock.now();
        let mut state = self.state.lock();

        state.requests.total += 1;
        *state
            .requests
            .by_method
            .entry(method.as_str().to_string())
            .or_default() += 1;
        *state.requests.by_endpoint.entry(endpoint).or_default() += 1;

        state.request_starts.push_back(now);
        state.prune_request_starts(now);
    }

    /// Record a completed response; 200-399 counts as success
    pub fn record_response(&self, status: u16, url: &str, response_time: Duration) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if (200..400).contains(&status) {
            state.requests.successful += 1;
        } else {
            state.requests.failed += 1;
        }
        *state.requests.by_status.entry(status).or_default() += 1;

        state.samples.push_back(Sample {
            at: now,
            millis: response_time.as_secs_f64() * 1_000.0,
        });
        state.evict(now, &self.config);
        state.recompute_timing();
        Self::refresh_rates(&mut state.requests);

        debug!(status, url, ?response_time, "response recorded");
    }

    /// Record a failed request
    ///
    /// Counts toward the failed-request total as well as the error breakdowns.
    pub fn record_error(&self, phase: ErrorPhase, error: &dyn FailureInfo) {
        let kind = error.kind();
        let status = error.status();
        let endpoint = normalize_endpoint(error.url().unwrap_or_default());
        let message = error.to_string();
        let timestamp = self.clock.wall();

        let mut state = self.state.lock();

        state.requests.failed += 1;
        Self::refresh_rates(&mut state.requests);

        state.errors.total += 1;
        *state.errors.by_type.entry(kind).or_default() += 1;
        if let Some(status) = status {
            *state.errors.by_status.entry(status).or_default() += 1;
        }
        *state.errors.by_endpoint.entry(endpoint.clone()).or_default() += 1;

        if state.recent_errors.len() == RECENT_ERRORS_CAPACITY {
            state.recent_errors.pop_front();
        }
        state.recent_errors.push_back(RecentError {
            timestamp,
            kind,
            status,
            endpoint,
            message,
            phase,
        });
    }

    fn refresh_rates(requests: &mut RequestMetrics) {
        requests.success_rate = rate(requests.successful, requests.total);
        requests.error_rate = rate(requests.failed, requests.total);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut state = self.state.lock();
        let now = state.stopped_at.unwrap_or_else(|| self.clock.now());

        state.prune_request_starts(now);
        let uptime = now.saturating_duration_since(state.started_at);
        let requests_per_second = if uptime.is_zero() {
            0.0
        } else {
            state.requests.total as f64 / uptime.as_secs_f64()
        };

        let mut requests = state.requests.clone();
        Self::refresh_rates(&mut requests);

        let mut errors = state.errors.clone();
        errors.recent = state.recent_errors.iter().cloned().collect();

        MetricsSnapshot {
            requests,
            timing: state.timing.clone(),
            errors,
            throughput: ThroughputMetrics {
                uptime_ms: uptime.as_millis() as u64,
                requests_per_second,
                requests_last_minute: state.request_starts.len() as u64,
                stopped: state.stopped_at.is_some(),
            },
        }
    }

    /// Clear everything and restart uptime
    pub fn reset(&self) {
        let now = self.clock.now();
        *self.state.lock() = State::new(now);
        debug!("metrics reset");
    }

    /// Freeze throughput at the current instant, keeping all counters
    pub fn stop(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.stopped_at.is_none() {
            state.stopped_at = Some(now);
            debug!("metrics stopped");
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
