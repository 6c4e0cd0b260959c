//! In-memory adapter for tests and offline use.
//!
//! `StubAdapter` never touches the network. With a responder installed, every
//! resumed task completes synchronously with the responder's outcome. Without
//! one, resumed tasks stay running until `complete` or `complete_next` is
//! called, which lets tests drive ordering and cancellation races by hand.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::trace;

use crate::adapter::{SessionAdapter, SessionTask, TaskCompletion, TaskListHandler, TaskOutcome};
use crate::http::HttpRequest;
use crate::task::{TaskCore, TaskId, TaskState};

type Responder = dyn Fn(&HttpRequest) -> TaskOutcome + Send + Sync;
type TaskList = Mutex<Vec<Arc<StubTask>>>;

#[derive(Default)]
pub struct StubAdapter {
    tasks: Arc<TaskList>,
    history: Mutex<Vec<HttpRequest>>,
    responder: Option<Arc<Responder>>,
}

impl StubAdapter {
    /// Tasks stay running until completed by hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks complete with `responder(request)` as soon as they are resumed.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> TaskOutcome + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::default()
        }
    }

    /// Every request handed to `create_task`, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.history).clone()
    }

    /// Ids of tasks that were resumed and have not completed.
    pub fn running(&self) -> Vec<TaskId> {
        lock(&self.tasks)
            .iter()
            .filter(|task| task.core.state() == TaskState::Running)
            .map(|task| task.core.id())
            .collect()
    }

    /// Complete a running task. Returns false if it is unknown or not running.
    pub fn complete(&self, id: TaskId, outcome: TaskOutcome) -> bool {
        let task = lock(&self.tasks).iter().find(|t| t.core.id() == id).cloned();
        match task {
            Some(task) => task.finish(outcome),
            None => false,
        }
    }

    /// Complete the oldest running task.
    pub fn complete_next(&self, outcome: TaskOutcome) -> bool {
        match self.running().first() {
            Some(id) => self.complete(*id, outcome),
            None => false,
        }
    }
}

impl SessionAdapter for StubAdapter {
    fn create_task(&self, request: HttpRequest, completion: TaskCompletion) -> Arc<dyn SessionTask> {
        lock(&self.history).push(request.clone());
        let task = Arc::new(StubTask {
            core: TaskCore::new(request, completion),
            responder: self.responder.clone(),
            tasks: Arc::downgrade(&self.tasks),
        });
        lock(&self.tasks).push(task.clone());
        task
    }

    fn get_tasks(&self, handler: TaskListHandler) {
        let tasks: Vec<Arc<dyn SessionTask>> = lock(&self.tasks)
            .iter()
            .filter(|task| !task.core.state().is_terminal())
            .map(|task| task.clone() as Arc<dyn SessionTask>)
            .collect();
        handler(tasks);
    }
}

struct StubTask {
    core: TaskCore,
    responder: Option<Arc<Responder>>,
    tasks: Weak<TaskList>,
}

impl StubTask {
    fn finish(&self, outcome: TaskOutcome) -> bool {
        let finished = self.core.finish(outcome);
        if finished {
            self.detach();
        }
        finished
    }

    fn detach(&self) {
        if let Some(tasks) = self.tasks.upgrade() {
            let id = self.core.id();
            lock(&tasks).retain(|task| task.core.id() != id);
        }
    }
}

impl SessionTask for StubTask {
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
        if !self.core.resume() {
            return;
        }
        trace!(task_id = %self.core.id(), url = %self.core.request().url, "stub task resumed");
        if let Some(responder) = &self.responder {
            let outcome = responder(self.core.request());
            self.finish(outcome);
        }
    }

    fn cancel(&self) {
        if self.core.cancel() {
            trace!(task_id = %self.core.id(), "stub task cancelled");
        }
        self.detach();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
