//! Task identity and lifecycle shared by adapter implementations.
//!
//! A task moves `Suspended -> Running -> Completed`, or to `Cancelled` from
//! either non-terminal state. Terminal states never change again, and the
//! completion stored in `TaskCore` is taken by whichever transition reaches a
//! terminal state first.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::adapter::{TaskCompletion, TaskOutcome};
use crate::error::TransportError;
use crate::http::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Suspended = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Suspended,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }
}

/// Lock-free task state with compare-and-swap transitions.
#[derive(Debug)]
pub struct TaskStateCell(AtomicU8);

impl TaskStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(TaskState::Suspended as u8))
    }

    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Suspended -> Running`. False if the task was already resumed or ended.
    pub fn resume(&self) -> bool {
        self.transition(TaskState::Suspended, TaskState::Running)
    }

    /// `Running -> Completed`.
    pub fn complete(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Completed)
    }

    /// Any non-terminal state to `Cancelled`.
    pub fn cancel(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if TaskState::from_u8(current).is_terminal() {
                return false;
            }
            match self.0.compare_exchange(
                current,
                TaskState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for TaskStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// State, request and pending completion of one adapter task.
pub struct TaskCore {
    id: TaskId,
    state: TaskStateCell,
    request: HttpRequest,
    completion: Mutex<Option<TaskCompletion>>,
}

impl TaskCore {
    pub fn new(request: HttpRequest, completion: TaskCompletion) -> Self {
        Self {
            id: TaskId::new(),
            state: TaskStateCell::new(),
            request,
            completion: Mutex::new(Some(completion)),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn resume(&self) -> bool {
        self.state.resume()
    }

    /// Deliver `outcome` if the task is still running. Returns false when the
    /// task already reached a terminal state; `outcome` is dropped.
    pub fn finish(&self, outcome: TaskOutcome) -> bool {
        if !self.state.complete() {
            return false;
        }
        self.deliver(outcome);
        true
    }

    /// Cancel the task and report `TransportErrorKind::Cancelled` to the
    /// completion. No-op once the task has ended.
    pub fn cancel(&self) -> bool {
        if !self.state.cancel() {
            return false;
        }
        self.deliver(TaskOutcome::failure(TransportError::cancelled()));
        true
    }

    fn deliver(&self, outcome: TaskOutcome) {
        let completion = self
            .completion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(completion) = completion {
            completion(outcome);
        }
    }
}

impl fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCore")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("method", &self.request.method)
            .field("url", &self.request.url)
            .finish()
    }
}
