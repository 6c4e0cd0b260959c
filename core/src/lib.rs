//! Typed HTTP requests over a pluggable backend.
//!
//! # Overview
//! A caller describes one HTTP call as a value implementing `Request` and
//! hands it to a `Session`. The session lowers it to an `HttpRequest`, runs it
//! through a `SessionAdapter`, classifies what the adapter observed, and
//! delivers a typed `Result` on a `CallbackQueue`.
//!
//! # Design
//! - `Request` is pure: building and parsing never touch the network, so
//!   request types can be tested without a session.
//! - Adapters own all I/O and threading. `UreqAdapter` (feature `ureq`) talks
//!   to real servers; `StubAdapter` answers from memory.
//! - Every `send` invokes its handler exactly once, including on build
//!   failure and cancellation.
//! - There is no global session. Construct one and pass it around.

pub mod adapter;
pub mod body;
pub mod config;
pub mod error;
pub mod http;
pub mod parser;
pub mod queue;
pub mod request;
pub mod session;
pub mod stub;
pub mod task;
#[cfg(feature = "ureq")]
pub mod ureq_adapter;

pub use adapter::{SessionAdapter, SessionTask, TaskCompletion, TaskOutcome};
pub use body::{BodyParameters, RawBodyParameters};
pub use config::{AdapterConfig, ConfigError, SessionConfig};
pub use error::{BoxError, RequestError, ResponseError, SessionError, TransportError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, UrlResponse};
pub use parser::{DataParser, JsonDataParser, StringDataParser};
pub use queue::{CallbackQueue, DispatchQueue, SessionQueue};
pub use request::Request;
pub use session::{ResponseFuture, Session};
pub use stub::StubAdapter;
pub use task::{TaskId, TaskState};
#[cfg(feature = "ureq")]
pub use ureq_adapter::UreqAdapter;
