//! Wire-level HTTP types exchanged with backend adapters.
//!
//! # Design
//! A typed `Request` is lowered into an `HttpRequest` before it reaches an
//! adapter, and the adapter hands back an optional `UrlResponse` describing
//! what the server answered. These are plain data with owned fields so they
//! can move freely between the caller, the adapter's worker threads and the
//! callback queue.

use std::fmt;
use std::str::FromStr;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Head,
    Delete,
    Patch,
    Trace,
    Options,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
        }
    }

    /// Whether `Request::parameters` should be sent in the URL query rather
    /// than in the body.
    pub fn prefers_query_parameters(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Head | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "HEAD" => HttpMethod::Head,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            "TRACE" => HttpMethod::Trace,
            "OPTIONS" => HttpMethod::Options,
            "CONNECT" => HttpMethod::Connect,
            other => return Err(format!("unknown HTTP method: {other}")),
        };
        Ok(method)
    }
}

/// A fully formed, transport-ready HTTP request.
///
/// Built by `Request::build_request`. Adapters execute it as is; the URL is
/// already resolved and carries any query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Case-insensitive header lookup. Returns the last value set for `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Replace every existing value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }
}

/// Response metadata for an HTTP exchange. The body travels separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Metadata reported by an adapter for a finished task.
///
/// Backends that can load non-HTTP URLs report `NonHttp`; the session treats
/// it as a response error since no status or headers are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlResponse {
    Http(HttpResponse),
    NonHttp { url: String },
}

impl UrlResponse {
    pub fn url(&self) -> &str {
        match self {
            UrlResponse::Http(response) => &response.url,
            UrlResponse::NonHttp { url } => url,
        }
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

/// First header whose name is not a token or whose value carries bytes that
/// cannot appear in a field value.
pub(crate) fn first_invalid_header(headers: &[(String, String)]) -> Option<&(String, String)> {
    headers.iter().find(|(name, value)| {
        ::http::HeaderName::from_bytes(name.as_bytes()).is_err()
            || ::http::HeaderValue::from_str(value).is_err()
    })
}
