//! Response body parsers.
//!
//! A `Request` picks a `DataParser` to turn raw response bytes into an
//! intermediate object before `Request::response` shapes it into the final
//! typed value. The parser also advertises the `Accept` header sent with the
//! request.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::BoxError;

pub trait DataParser: Send + Sync {
    type Output: Send;

    /// Value for the `Accept` header, if the parser expects a specific type.
    fn content_type(&self) -> Option<&str>;

    fn parse(&self, data: &[u8]) -> Result<Self::Output, BoxError>;
}

/// Deserializes JSON bodies with serde.
///
/// An empty body is deserialized from JSON `null`, so `Option<_>`, `()` and
/// `serde_json::Value` targets accept `204 No Content` style responses.
pub struct JsonDataParser<T> {
    _target: PhantomData<fn() -> T>,
}

impl<T> JsonDataParser<T> {
    pub fn new() -> Self {
        Self {
            _target: PhantomData,
        }
    }
}

impl<T> Default for JsonDataParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDataParser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonDataParser")
    }
}

impl<T> DataParser for JsonDataParser<T>
where
    T: DeserializeOwned + Send,
{
    type Output = T;

    fn content_type(&self) -> Option<&str> {
        Some("application/json")
    }

    fn parse(&self, data: &[u8]) -> Result<T, BoxError> {
        if data.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(data)?)
    }
}

/// Decodes the body as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDataParser;

impl DataParser for StringDataParser {
    type Output = String;

    fn content_type(&self) -> Option<&str> {
        None
    }

    fn parse(&self, data: &[u8]) -> Result<String, BoxError> {
        Ok(String::from_utf8(data.to_vec())?)
    }
}
