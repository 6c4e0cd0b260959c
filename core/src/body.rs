//! Request body strategies.
//!
//! Body encoding is pluggable: a `Request` returns any `BodyParameters`
//! implementation and the pipeline only asks it for a content type and the
//! encoded bytes.

use crate::error::BoxError;

pub trait BodyParameters: Send + Sync {
    /// Value for the `Content-Type` header.
    fn content_type(&self) -> &str;

    fn build_entity(&self) -> Result<Vec<u8>, BoxError>;
}

/// Pre-encoded bytes sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBodyParameters {
    pub data: Vec<u8>,
    pub content_type: String,
}

impl RawBodyParameters {
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    pub fn octet_stream(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data, "application/octet-stream")
    }
}

impl BodyParameters for RawBodyParameters {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn build_entity(&self) -> Result<Vec<u8>, BoxError> {
        Ok(self.data.clone())
    }
}
