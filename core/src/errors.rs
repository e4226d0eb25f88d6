//! Error types and failure classification

use crate::circuit::CircuitState;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute)
#[derive(Debug, Error)]
pub enum CircuitError<E = Box<dyn Error + Send + Sync>> {
    /// Circuit is open, the operation was not invoked
    #[error("Circuit '{circuit}' is {state} (next attempt in {retry_in:?})")]
    Open {
        circuit: String,
        state: CircuitState,
        retry_in: Duration,
    },
    /// The wrapped operation failed
    #[error(transparent)]
    Execution(E),
}

impl<E> CircuitError<E> {
    /// True when the call was short-circuited
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    /// The operation's own error, if it ran
    pub fn into_execution(self) -> Option<E> {
        match self {
            CircuitError::Execution(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }
}

/// Errors produced by [`RetryManager::execute`](crate::RetryManager::execute)
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// `max_attempts` is zero, the operation was never invoked
    #[error("retry policy allows no attempts (max_attempts = 0)")]
    NoAttempts,
    /// The predicate refused to retry this failure
    #[error("attempt {attempt} failed with a non-retryable error: {source}")]
    NonRetryable { attempt: u32, source: E },
    /// Every allowed attempt failed; `source` is the last failure
    #[error("all {attempts} attempts failed, last error: {source}")]
    Exhausted { attempts: u32, source: E },
}

impl<E> RetryError<E> {
    /// The last failure observed from the operation
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::NoAttempts => None,
            RetryError::NonRetryable { source, .. } | RetryError::Exhausted { source, .. } => {
                Some(source)
            }
        }
    }

    /// Number of times the operation was invoked
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NoAttempts => 0,
            RetryError::NonRetryable { attempt, .. } => *attempt,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Invalid configuration values
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must not be less than {other}")]
    Inverted {
        field: &'static str,
        other: &'static str,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Failure taxonomy shared by retry decisions, metrics and client error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "circuit_open")]
    CircuitOpen,
    #[serde(rename = "timeout_error")]
    Timeout,
    #[serde(rename = "network_error")]
    Connection,
    #[serde(rename = "client_error")]
    ClientError,
    #[serde(rename = "server_error")]
    ServerError,
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "unknown_error")]
    Unknown,
}

/// Transport codes that mean the request ran out of time
const TIMEOUT_CODES: &[&str] = &["ETIMEDOUT", "ECONNABORTED", "ESOCKETTIMEDOUT"];

/// Transport codes that mean the connection could not be used
const CONNECTION_CODES: &[&str] = &[
    "ECONNRESET",
    "ENOTFOUND",
    "ECONNREFUSED",
    "EHOSTUNREACH",
    "ENETUNREACH",
    "EPIPE",
    "EAI_AGAIN",
];

pub(crate) const CIRCUIT_OPEN_CODE: &str = "CIRCUIT_OPEN";
pub(crate) const VALIDATION_CODE: &str = "VALIDATION_ERROR";

impl ErrorKind {
    /// Classify by transport code first, then status range, then message text
    pub fn classify(code: Option<&str>, status: Option<u16>, message: &str) -> Self {
        if let Some(code) = code {
            if TIMEOUT_CODES.contains(&code) {
                return ErrorKind::Timeout;
            }
            if CONNECTION_CODES.contains(&code) {
                return ErrorKind::Connection;
            }
            if code == CIRCUIT_OPEN_CODE {
                return ErrorKind::CircuitOpen;
            }
            if code == VALIDATION_CODE {
                return ErrorKind::Validation;
            }
        }

        match status {
            Some(400..=499) => return ErrorKind::ClientError,
            Some(500..=599) => return ErrorKind::ServerError,
            _ => {}
        }

        let message = message.to_ascii_lowercase();
        if message.contains("timeout") {
            ErrorKind::Timeout
        } else if message.contains("network error") {
            ErrorKind::Connection
        } else {
            ErrorKind::Unknown
        }
    }

    /// Label used as the metrics bucket key
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Connection => "network_error",
            ErrorKind::ClientError => "client_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about a failure that classification can inspect
///
/// Implemented by [`TransportError`](crate::TransportError) and by the
/// client's own failure type. Custom transports with their own error type
/// implement it to get the default retry predicate and metrics taxonomy.
pub trait FailureInfo: fmt::Display {
    /// Transport-level code such as `ECONNRESET`
    fn code(&self) -> Option<&str> {
        None
    }

    /// HTTP status attached to the failure
    fn status(&self) -> Option<u16> {
        None
    }

    /// URL of the request that failed
    fn url(&self) -> Option<&str> {
        None
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::classify(self.code(), self.status(), &self.to_string())
    }
}

impl<E: FailureInfo> FailureInfo for RetryError<E> {
    fn code(&self) -> Option<&str> {
        match self {
            RetryError::NoAttempts => None,
            RetryError::NonRetryable { source, .. } | RetryError::Exhausted { source, .. } => {
                source.code()
            }
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            RetryError::NoAttempts => None,
            RetryError::NonRetryable { source, .. } | RetryError::Exhausted { source, .. } => {
                source.status()
            }
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            RetryError::NoAttempts => None,
            RetryError::NonRetryable { source, .. } | RetryError::Exhausted { source, .. } => {
                source.url()
            }
        }
    }
}
