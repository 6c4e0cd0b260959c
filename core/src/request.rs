//! Typed request descriptions.
//!
//! # Design
//! A `Request` is an immutable value describing one HTTP call. It is split the
//! same way the pipeline is: `build_request` lowers the value into an
//! `HttpRequest` before anything touches the network, and `parse_response`
//! turns bytes plus `HttpResponse` metadata into `Request::Response`. Both are
//! pure functions of the value's fields, so implementations can be tested
//! without a session or adapter.
//!
//! `parse_response` runs `validate_response`, then the parser, then
//! `intercept_object`, then `response`. Only `base_url`, `method`, `path`,
//! `data_parser` and `response` are required. The remaining hooks have
//! defaults that can be overridden per request type.

use url::Url;

use crate::body::BodyParameters;
use crate::error::{RequestError, ResponseError};
use crate::http::{self, HttpMethod, HttpRequest, HttpResponse};
use crate::parser::DataParser;

pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
    type Parser: DataParser;

    fn base_url(&self) -> &str;

    fn method(&self) -> HttpMethod;

    /// Appended to `base_url` as a path component. Empty means the base URL
    /// itself.
    fn path(&self) -> &str;

    /// Opaque key/value parameters. Sent as the URL query for methods that
    /// prefer query parameters.
    fn parameters(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn query_parameters(&self) -> Vec<(String, String)> {
        if self.method().prefers_query_parameters() {
            self.parameters()
        } else {
            Vec::new()
        }
    }

    fn body_parameters(&self) -> Option<Box<dyn BodyParameters>> {
        None
    }

    /// Extra headers. These override `Accept` and `Content-Type` derived from
    /// the parser and body parameters.
    fn header_fields(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn data_parser(&self) -> Self::Parser;

    /// Last-mile mutation of the wire request, e.g. signing.
    fn intercept_request(&self, request: HttpRequest) -> Result<HttpRequest, RequestError> {
        Ok(request)
    }

    /// Runs on the response metadata before the body is parsed, so a
    /// rejected status is reported even when the body would not parse.
    fn validate_response(&self, response: &HttpResponse) -> Result<(), ResponseError> {
        if response.is_success() {
            Ok(())
        } else {
            Err(ResponseError::UnacceptableStatusCode(response.status))
        }
    }

    /// Runs on the parsed object before `response`.
    fn intercept_object(
        &self,
        object: <Self::Parser as DataParser>::Output,
        _response: &HttpResponse,
    ) -> Result<<Self::Parser as DataParser>::Output, ResponseError> {
        Ok(object)
    }

    fn response(
        &self,
        object: <Self::Parser as DataParser>::Output,
        response: &HttpResponse,
    ) -> Result<Self::Response, ResponseError>;

    fn build_request(&self) -> Result<HttpRequest, RequestError> {
        let url = resolve_url(self.base_url(), self.path(), &self.query_parameters())?;

        let mut headers = Vec::new();
        let parser = self.data_parser();
        if let Some(accept) = parser.content_type() {
            http::set_header(&mut headers, "Accept", accept.to_string());
        }

        let mut body = None;
        if let Some(parameters) = self.body_parameters() {
            http::set_header(
                &mut headers,
                "Content-Type",
                parameters.content_type().to_string(),
            );
            body = Some(parameters.build_entity().map_err(RequestError::Body)?);
        }

        for (name, value) in self.header_fields() {
            http::set_header(&mut headers, &name, value);
        }

        let request = self.intercept_request(HttpRequest {
            method: self.method(),
            url: url.into(),
            headers,
            body,
        })?;
        if let Some((name, value)) = http::first_invalid_header(&request.headers) {
            return Err(RequestError::InvalidHeader(format!("{name:?}: {value:?}")));
        }
        Ok(request)
    }

    fn parse_response(
        &self,
        data: &[u8],
        response: &HttpResponse,
    ) -> Result<Self::Response, ResponseError> {
        self.validate_response(response)?;
        let object = self
            .data_parser()
            .parse(data)
            .map_err(ResponseError::Parse)?;
        let object = self.intercept_object(object, response)?;
        self.response(object, response)
    }
}

fn resolve_url(
    base_url: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<Url, RequestError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| RequestError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(RequestError::InvalidBaseUrl(base_url.to_string()));
    }

    if !path.is_empty() {
        // Query and fragment must come from `query_parameters`, never the path.
        if path
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '?' || c == '#')
        {
            return Err(RequestError::UnexpectedUrl(format!(
                "{base_url} + {path:?}"
            )));
        }
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
    }

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}
