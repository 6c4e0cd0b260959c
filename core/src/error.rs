//! Error types for the request pipeline.
//!
//! # Design
//! Each stage of `Session::send` owns one error type: `RequestError` before
//! dispatch, `TransportError` for whatever the adapter reports, and
//! `ResponseError` once bytes and metadata are in hand. `SessionError` is the
//! single failure type a result handler ever sees.

use std::fmt;

/// Boxed error produced by user-supplied strategies (parsers, body parameters,
/// interceptors).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The request could not be turned into a wire request. Nothing was sent.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Base URL, path and query did not combine into a valid URL.
    #[error("unexpected URL: {0}")]
    UnexpectedUrl(String),

    #[error("failed to build request body: {0}")]
    Body(#[source] BoxError),

    #[error("request interceptor failed: {0}")]
    Intercept(#[source] BoxError),

    /// A header name or value that cannot be sent on the wire.
    #[error("invalid header field: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    /// Name resolution or TCP/TLS connect failed.
    Connect,
    Io,
    /// The task was cancelled before it completed.
    Cancelled,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure reported by a backend adapter for a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "task was cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == TransportErrorKind::Cancelled
    }
}

/// The exchange completed but its response could not become a typed value.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The adapter reported metadata that is not an HTTP response, or none.
    #[error("response for {url} is not an HTTP response")]
    NonHttpResponse { url: String },

    #[error("unacceptable status code: {0}")]
    UnacceptableStatusCode(u16),

    #[error("unexpected response object: {0}")]
    UnexpectedObject(String),

    /// The data parser rejected the body.
    #[error("failed to parse response body: {0}")]
    Parse(#[source] BoxError),
}

/// Failure delivered to a `Session::send` handler.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl SessionError {
    /// True when the request was cancelled before a response arrived.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Connection(err) if err.is_cancelled())
    }
}
