//! Retry classification
//!
//! This module decides which failures are worth another attempt. The
//! [`RetryManager`](crate::RetryManager) consults a [`RetryPredicate`] after
//! every failed attempt.

use crate::errors::{ErrorKind, FailureInfo};

/// 4xx statuses that signal a transient condition
pub const RETRYABLE_CLIENT_STATUSES: [u16; 2] = [408, 429];

/// Decides whether a failed attempt should be retried
///
/// `attempt` is 1-based: the first invocation is attempt 1.
///
/// # Examples
///
/// ```rust
/// use resilience_machines::{PredicateFn, RetryPredicate};
///
/// // Retry anything that mentions "busy", at most twice
/// let predicate = PredicateFn::new(|err: &String, attempt: u32| attempt < 3 && err.contains("busy"));
/// assert!(predicate.should_retry(&"server busy".to_string(), 1));
/// assert!(!predicate.should_retry(&"bad input".to_string(), 1));
/// ```
pub trait RetryPredicate<E>: Send + Sync + std::fmt::Debug {
    fn should_retry(&self, error: &E, attempt: u32) -> bool;
}

/// Retries transport timeouts, connection failures, 408, 429 and all 5xx
///
/// Validation failures, circuit rejections and every other 4xx are permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPredicate;

impl DefaultRetryPredicate {
    /// Retry decision for a classified failure
    pub fn is_retryable(kind: ErrorKind, status: Option<u16>) -> bool {
        match kind {
            ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::ServerError => true,
            ErrorKind::ClientError => {
                status.is_some_and(|s| RETRYABLE_CLIENT_STATUSES.contains(&s))
            }
            ErrorKind::CircuitOpen | ErrorKind::Validation | ErrorKind::Unknown => false,
        }
    }
}

impl<E: FailureInfo> RetryPredicate<E> for DefaultRetryPredicate {
    fn should_retry(&self, error: &E, _attempt: u32) -> bool {
        Self::is_retryable(error.kind(), error.status())
    }
}

impl<E, P> RetryPredicate<E> for std::sync::Arc<P>
where
    P: RetryPredicate<E> + ?Sized,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        (**self).should_retry(error, attempt)
    }
}

/// Closure-based predicate
pub struct PredicateFn<F> {
    predicate: F,
}

impl<F> PredicateFn<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for PredicateFn<F>
where
    F: Fn(&E, u32) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E, attempt: u32) -> bool {
        (self.predicate)(error, attempt)
    }
}

impl<F> std::fmt::Debug for PredicateFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateFn")
            .field("predicate", &"<closure>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn test_default_retries_transport_failures() {
        let p = DefaultRetryPredicate;

        assert!(p.should_retry(&TransportError::timeout("read timed out"), 1));
        assert!(p.should_retry(&TransportError::connection("ECONNRESET", "reset by peer"), 1));
        assert!(p.should_retry(&TransportError::connection("ECONNREFUSED", "refused"), 1));
        assert!(p.should_retry(&TransportError::connection("ENOTFOUND", "no such host"), 1));
    }

    #[test]
    fn test_default_status_policy() {
        let p = DefaultRetryPredicate;

        for status in [408, 429, 500, 502, 503, 504] {
            assert!(
                p.should_retry(&TransportError::http(status, "x"), 1),
                "{status} should be retryable"
            );
        }
        for status in [400, 401, 403, 404, 409, 422] {
            assert!(
                !p.should_retry(&TransportError::http(status, "x"), 1),
                "{status} should be permanent"
            );
        }
    }

    #[test]
    fn test_default_never_retries_validation() {
        let p = DefaultRetryPredicate;
        assert!(!p.should_retry(&TransportError::validation("missing url"), 1));
    }

    #[test]
    fn test_predicate_fn_retrying_conflicts() {
        // Opt-in retry of 409 for idempotent endpoints
        let p = PredicateFn::new(|err: &TransportError, attempt: u32| {
            attempt < 5
                && (err.status() == Some(409)
                    || DefaultRetryPredicate::is_retryable(err.kind(), err.status()))
        });

        assert!(p.should_retry(&TransportError::http(409, "conflict"), 1));
        assert!(p.should_retry(&TransportError::http(503, "unavailable"), 2));
        assert!(!p.should_retry(&TransportError::http(409, "conflict"), 5));
        assert!(!p.should_retry(&TransportError::http(400, "bad"), 1));
    }

    #[test]
    fn test_predicate_fn_debug() {
        let p = PredicateFn::new(|_: &String, _: u32| true);
        assert_eq!(format!("{:?}", p), "PredicateFn { predicate: \"<closure>\" }");
    }
}
