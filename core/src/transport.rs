//! Raw transport capability consumed by the client
//!
//! The client never speaks HTTP itself. It hands a [`RequestSpec`] to a
//! [`Transport`] and gets back a [`Response`] or a [`TransportError`].

use crate::errors::{FailureInfo, VALIDATION_CODE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-request deadline enforced by the transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject specs that can never be sent
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.url.trim().is_empty() {
            return Err(TransportError::validation("request url is empty"));
        }
        if matches!(self.method, Method::Get | Method::Head) && self.body.is_some() {
            return Err(TransportError::validation(format!(
                "{} requests cannot carry a body",
                self.method
            )));
        }
        Ok(())
    }
}

/// Successful transport result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub url: String,
    pub method: Method,
}

impl Response {
    /// Build a response echoing the request it answers
    pub fn for_request(spec: &RequestSpec, status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
            url: spec.url.clone(),
            method: spec.method,
        }
    }
}

/// Response details carried by an HTTP status failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub data: Value,
}

/// Failures reported by a transport
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The request exceeded its deadline
    #[error("timeout: {message}")]
    Timeout { message: String, url: Option<String> },
    /// The connection could not be established or was dropped
    #[error("connection error ({code}): {message}")]
    Connection {
        code: String,
        message: String,
        url: Option<String>,
    },
    /// The server answered with a non-success status
    #[error("HTTP {}: {message}", .response.status)]
    Status {
        message: String,
        response: ErrorResponse,
        url: Option<String>,
    },
    /// The request was rejected before it was sent
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Anything the transport could not classify
    #[error("{message}")]
    Other {
        code: Option<String>,
        message: String,
        url: Option<String>,
    },
}

impl TransportError {
    pub fn timeout(message: impl Into<String>) -> Self {
        TransportError::Timeout {
            message: message.into(),
            url: None,
        }
    }

    pub fn connection(code: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::Connection {
            code: code.into(),
            message: message.into(),
            url: None,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        TransportError::Status {
            message: message.into(),
            response: ErrorResponse {
                status,
                ..Default::default()
            },
            url: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TransportError::Validation {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        TransportError::Other {
            code: None,
            message: message.into(),
            url: None,
        }
    }

    /// Attach the URL of the failing request
    pub fn with_url(mut self, request_url: impl Into<String>) -> Self {
        match &mut self {
            TransportError::Timeout { url, .. }
            | TransportError::Connection { url, .. }
            | TransportError::Status { url, .. }
            | TransportError::Other { url, .. } => *url = Some(request_url.into()),
            TransportError::Validation { .. } => {}
        }
        self
    }
}

impl FailureInfo for TransportError {
    fn code(&self) -> Option<&str> {
        match self {
            TransportError::Timeout { .. } => Some("ETIMEDOUT"),
            TransportError::Connection { code, .. } => Some(code),
            TransportError::Validation { .. } => Some(VALIDATION_CODE),
            TransportError::Other { code, .. } => code.as_deref(),
            TransportError::Status { .. } => None,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { response, .. } => Some(response.status),
            _ => None,
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            TransportError::Timeout { url, .. }
            | TransportError::Connection { url, .. }
            | TransportError::Status { url, .. }
            | TransportError::Other { url, .. } => url.as_deref(),
            TransportError::Validation { .. } => None,
        }
    }
}

/// Sends one request and reports the outcome
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: &RequestSpec) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}

/// Adapts an async closure into a [`Transport`]
///
/// ```rust
/// use resilience_machines::{RequestSpec, Response, TransportError, TransportFn};
/// use serde_json::json;
///
/// let transport = TransportFn::new(|spec: RequestSpec| {
///     let response = Response::for_request(&spec, 200, json!({ "ok": true }));
///     async move { Ok::<_, TransportError>(response) }
/// });
/// # let _ = transport;
/// ```
pub struct TransportFn<F> {
    send: F,
}

impl<F> TransportFn<F> {
    pub fn new(send: F) -> Self {
        Self { send }
    }
}

#[async_trait]
impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(RequestSpec) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, TransportError>> + Send,
{
    async fn send(&self, request: &RequestSpec) -> Result<Response, TransportError> {
        (self.send)(request.clone()).await
    }
}

impl<F> fmt::Debug for TransportFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportFn")
            .field("send", &"<closure>")
            .finish()
    }
}
