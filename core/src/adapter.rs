//! Backend adapter interface.
//!
//! # Design
//! The adapter is the only component that performs I/O. It receives a fully
//! built `HttpRequest`, hands back a `SessionTask` handle, and later calls the
//! completion exactly once with whatever it observed: body bytes, response
//! metadata, a transport error, or some combination. Classifying that triple
//! is the session's job, so adapters report faithfully and never interpret.
//!
//! Adapters own their task list and their threading. Completions may run on
//! any thread.

use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, UrlResponse};
use crate::task::{TaskId, TaskState};

/// What an adapter observed for a finished task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub data: Option<Vec<u8>>,
    pub response: Option<UrlResponse>,
    pub error: Option<TransportError>,
}

impl TaskOutcome {
    pub fn success(data: Vec<u8>, response: HttpResponse) -> Self {
        Self {
            data: Some(data),
            response: Some(UrlResponse::Http(response)),
            error: None,
        }
    }

    pub fn failure(error: TransportError) -> Self {
        Self {
            data: None,
            response: None,
            error: Some(error),
        }
    }
}

pub type TaskCompletion = Box<dyn FnOnce(TaskOutcome) + Send + 'static>;

pub type TaskListHandler = Box<dyn FnOnce(Vec<Arc<dyn SessionTask>>) + Send + 'static>;

/// Handle to one in-flight network operation.
pub trait SessionTask: Send + Sync {
    fn id(&self) -> TaskId;

    fn state(&self) -> TaskState;

    /// The wire request this task executes.
    fn request(&self) -> &HttpRequest;

    /// Start the task. Has no effect unless the task is suspended.
    fn resume(&self);

    /// Best effort. A task that already completed ignores it; otherwise the
    /// completion receives a `Cancelled` transport error.
    fn cancel(&self);
}

pub trait SessionAdapter: Send + Sync {
    /// Create a suspended task for `request`. `completion` is invoked exactly
    /// once after the task is resumed or cancelled.
    fn create_task(&self, request: HttpRequest, completion: TaskCompletion) -> Arc<dyn SessionTask>;

    /// Report the tasks that have not completed yet.
    fn get_tasks(&self, handler: TaskListHandler);
}
