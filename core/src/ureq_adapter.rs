//! Network adapter backed by `ureq`.
//!
//! Each resumed task runs its exchange on a dedicated worker thread with a
//! blocking `ureq::Agent`. Non-2xx statuses come back as data; interpreting
//! them is left to the request. Cancelling a running task reports
//! `Cancelled` right away; the worker's eventual result is discarded.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use tracing::{debug, trace, warn};
use ureq::{Agent, ResponseExt};

use crate::adapter::{SessionAdapter, SessionTask, TaskCompletion, TaskListHandler, TaskOutcome};
use crate::config::AdapterConfig;
use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpRequest, HttpResponse};
use crate::task::{TaskCore, TaskId, TaskState};

type TaskList = Mutex<HashMap<TaskId, Arc<UreqTask>>>;

/// Runs every resumed task on its own OS thread, with no cap on how many run
/// at once. A cancelled task's thread stays blocked until `ureq` returns or
/// the configured timeout fires, so callers with many concurrent requests
/// should keep `timeout_ms` set.
pub struct UreqAdapter {
    agent: Agent,
    max_body_bytes: u64,
    tasks: Arc<TaskList>,
}

impl UreqAdapter {
    pub fn new(config: &AdapterConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .timeout_connect(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .new_agent();
        Self::with_agent(agent, config.max_body_bytes)
    }

    /// Use a preconfigured agent. It must be built with
    /// `http_status_as_error(false)` so error statuses reach the request.
    pub fn with_agent(agent: Agent, max_body_bytes: u64) -> Self {
        Self {
            agent,
            max_body_bytes,
            tasks: Arc::default(),
        }
    }
}

impl Default for UreqAdapter {
    fn default() -> Self {
        Self::new(&AdapterConfig::default())
    }
}

impl SessionAdapter for UreqAdapter {
    fn create_task(&self, request: HttpRequest, completion: TaskCompletion) -> Arc<dyn SessionTask> {
        let task = Arc::new_cyclic(|me| UreqTask {
            core: TaskCore::new(request, completion),
            agent: self.agent.clone(),
            max_body_bytes: self.max_body_bytes,
            tasks: Arc::downgrade(&self.tasks),
            me: me.clone(),
        });
        lock(&self.tasks).insert(task.core.id(), task.clone());
        task
    }

    fn get_tasks(&self, handler: TaskListHandler) {
        let tasks: Vec<Arc<dyn SessionTask>> = lock(&self.tasks)
            .values()
            .filter(|task| !task.core.state().is_terminal())
            .map(|task| task.clone() as Arc<dyn SessionTask>)
            .collect();
        handler(tasks);
    }
}

struct UreqTask {
    core: TaskCore,
    agent: Agent,
    max_body_bytes: u64,
    tasks: Weak<TaskList>,
    me: Weak<UreqTask>,
}

impl UreqTask {
    fn run(&self) {
        let request = self.core.request();
        let outcome = match execute(&self.agent, request, self.max_body_bytes) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(task_id = %self.core.id(), url = %request.url, error = %err, "ureq exchange failed");
                TaskOutcome::failure(map_error(err))
            }
        };
        self.detach();
        if !self.core.finish(outcome) {
            trace!(task_id = %self.core.id(), "result dropped for cancelled task");
        }
    }

    fn detach(&self) {
        if let Some(tasks) = self.tasks.upgrade() {
            lock(&tasks).remove(&self.core.id());
        }
    }
}

impl SessionTask for UreqTask {
    fn id(&self) -> TaskId {
        self.core.id()
    }

    fn state(&self) -> TaskState {
        self.core.state()
    }

    fn request(&self) -> &HttpRequest {
        self.core.request()
    }

    fn resume(&self) {
        let Some(task) = self.me.upgrade() else {
            return;
        };
        if !self.core.resume() {
            return;
        }
        let id = self.core.id();
        trace!(task_id = %id, method = %self.core.request().method, url = %self.core.request().url, "ureq task resumed");
        let spawned = thread::Builder::new()
            .name(format!("typed-http-{id}"))
            .spawn(move || task.run());
        if let Err(err) = spawned {
            warn!(task_id = %id, error = %err, "failed to spawn ureq worker");
            self.detach();
            self.core.finish(TaskOutcome::failure(TransportError::new(
                TransportErrorKind::Other,
                format!("failed to spawn worker thread: {err}"),
            )));
        }
    }

    fn cancel(&self) {
        if self.core.cancel() {
            debug!(task_id = %self.core.id(), url = %self.core.request().url, "ureq task cancelled");
        }
        self.detach();
    }
}

fn execute(agent: &Agent, request: &HttpRequest, max_body_bytes: u64) -> Result<TaskOutcome, ureq::Error> {
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let mut response = match &request.body {
        Some(body) => agent.run(builder.body(body.clone())?)?,
        None => agent.run(builder.body(())?)?,
    };

    let status = response.status().as_u16();
    let url = response.get_uri().to_string();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let data = response
        .body_mut()
        .with_config()
        .limit(max_body_bytes)
        .read_to_vec()?;

    Ok(TaskOutcome::success(data, HttpResponse { url, status, headers }))
}

fn map_error(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
        ureq::Error::Io(io_err) => match io_err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => TransportErrorKind::Connect,
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Io,
        },
        ureq::Error::BodyExceedsLimit(_) => TransportErrorKind::Io,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, err.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
