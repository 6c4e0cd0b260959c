//! The session: dispatching typed requests through an adapter.
//!
//! # Design
//! `send` builds the wire request, creates and resumes one adapter task, and
//! classifies the adapter's `(data, response, error)` triple into a typed
//! result that is handed to the callback queue. A handler runs exactly once
//! per `send` call, including when the request fails to build and no task is
//! ever created.
//!
//! Each task's originating request is recorded in a side table keyed by
//! `TaskId`. The table holds only `Weak` references, so it never extends a
//! request's lifetime; entries are removed when the task completes and pruned
//! whenever requests are cancelled. `cancel_requests` uses it to recover the
//! typed request behind each live adapter task.
//!
//! A session is an ordinary value. Build one at startup and share it by
//! reference or `Arc`; clones share the adapter and the side table.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::adapter::{SessionAdapter, SessionTask, TaskOutcome};
use crate::error::{ResponseError, SessionError, TransportError};
use crate::http::UrlResponse;
use crate::queue::{CallbackQueue, SessionQueue};
use crate::request::Request;
use crate::task::TaskId;

#[derive(Clone)]
pub struct Session {
    adapter: Arc<dyn SessionAdapter>,
    callback_queue: Arc<dyn CallbackQueue>,
    requests: Arc<RequestTable>,
}

impl Session {
    /// A session whose handlers run on the adapter's completion thread.
    pub fn new(adapter: Arc<dyn SessionAdapter>) -> Self {
        Self::with_callback_queue(adapter, Arc::new(SessionQueue))
    }

    pub fn with_callback_queue(
        adapter: Arc<dyn SessionAdapter>,
        callback_queue: Arc<dyn CallbackQueue>,
    ) -> Self {
        Self {
            adapter,
            callback_queue,
            requests: Arc::default(),
        }
    }

    /// A `ureq`-backed session. `callback_queue` names a dedicated handler
    /// thread; without it handlers run on the worker threads.
    #[cfg(feature = "ureq")]
    pub fn from_config(config: &crate::config::SessionConfig) -> std::io::Result<Self> {
        let adapter = Arc::new(crate::ureq_adapter::UreqAdapter::new(&config.adapter));
        let callback_queue: Arc<dyn CallbackQueue> = match &config.callback_queue {
            Some(label) => Arc::new(crate::queue::DispatchQueue::new(label.as_str())?),
            None => Arc::new(SessionQueue),
        };
        Ok(Self::with_callback_queue(adapter, callback_queue))
    }

    pub fn adapter(&self) -> &Arc<dyn SessionAdapter> {
        &self.adapter
    }

    pub fn callback_queue(&self) -> &Arc<dyn CallbackQueue> {
        &self.callback_queue
    }

    /// Send `request` and deliver the result to `handler` on the session's
    /// callback queue.
    ///
    /// Returns the resumed task, or `None` when the request could not be
    /// built. The handler still runs in that case, with
    /// `SessionError::Request`.
    pub fn send<R, F>(&self, request: R, handler: F) -> Option<Arc<dyn SessionTask>>
    where
        R: Request,
        F: FnOnce(Result<R::Response, SessionError>) + Send + 'static,
    {
        self.send_on(request, self.callback_queue.clone(), handler)
    }

    /// Like `send`, with the handler run on `queue`.
    pub fn send_on<R, F>(
        &self,
        request: R,
        queue: Arc<dyn CallbackQueue>,
        handler: F,
    ) -> Option<Arc<dyn SessionTask>>
    where
        R: Request,
        F: FnOnce(Result<R::Response, SessionError>) + Send + 'static,
    {
        let request = Arc::new(request);
        let wire = match request.build_request() {
            Ok(wire) => wire,
            Err(err) => {
                warn!(request_type = type_name::<R>(), error = %err, "failed to build request");
                queue.execute(Box::new(move || handler(Err(err.into()))));
                return None;
            }
        };

        let url = wire.url.clone();
        let method = wire.method;
        let task_id = Arc::new(OnceLock::new());
        let completion = {
            let request = request.clone();
            let requests = self.requests.clone();
            let task_id = task_id.clone();
            let url = url.clone();
            move |outcome: TaskOutcome| {
                let id = task_id.get().copied();
                if let Some(id) = id {
                    requests.remove(id);
                }
                let result = classify(&*request, &url, outcome);
                match &result {
                    Ok(_) => debug!(task_id = ?id, %method, %url, "request succeeded"),
                    Err(err) => debug!(task_id = ?id, %method, %url, error = %err, "request failed"),
                }
                queue.execute(Box::new(move || handler(result)));
            }
        };

        let task = self.adapter.create_task(wire, Box::new(completion));
        let id = task.id();
        // Set before resume so the completion can always clear its entry.
        let _ = task_id.set(id);
        let weak: Weak<dyn Any + Send + Sync> = {
            let any: Arc<dyn Any + Send + Sync> = request;
            Arc::downgrade(&any)
        };
        self.requests.insert(id, weak);

        debug!(task_id = %id, %method, %url, "sending request");
        task.resume();
        Some(task)
    }

    /// Send `request` and await the result.
    ///
    /// Dropping the returned future before it resolves cancels the task.
    pub fn response<R: Request>(&self, request: R) -> ResponseFuture<R::Response> {
        let (sender, receiver) = oneshot::channel();
        let task = self.send_on(request, Arc::new(SessionQueue), move |result| {
            let _ = sender.send(result);
        });
        ResponseFuture {
            receiver,
            task,
            finished: false,
        }
    }

    /// Cancel every live task whose originating request is an `R` accepted by
    /// `predicate`. Tasks created for other request types are left alone.
    pub fn cancel_requests<R, P>(&self, predicate: P)
    where
        R: Request,
        P: Fn(&R) -> bool + Send + 'static,
    {
        let requests = self.requests.clone();
        self.adapter.get_tasks(Box::new(move |tasks| {
            let mut cancelled = 0usize;
            for task in tasks {
                let Some(request) = requests.lookup::<R>(task.id()) else {
                    continue;
                };
                if predicate(&*request) {
                    task.cancel();
                    cancelled += 1;
                }
            }
            requests.prune();
            debug!(request_type = type_name::<R>(), cancelled, "cancelled matching requests");
        }));
    }
}

fn classify<R: Request>(
    request: &R,
    url: &str,
    outcome: TaskOutcome,
) -> Result<R::Response, SessionError> {
    let TaskOutcome {
        data,
        response,
        error,
    } = outcome;
    if let Some(error) = error {
        return Err(SessionError::Connection(error));
    }
    match (data, response) {
        (Some(data), Some(UrlResponse::Http(response))) => request
            .parse_response(&data, &response)
            .map_err(SessionError::Response),
        (_, Some(UrlResponse::NonHttp { url })) => {
            Err(ResponseError::NonHttpResponse { url }.into())
        }
        (_, _) => Err(ResponseError::NonHttpResponse {
            url: url.to_string(),
        }
        .into()),
    }
}

/// Task id to originating request, for cancellation lookups only.
#[derive(Default)]
struct RequestTable(Mutex<HashMap<TaskId, Weak<dyn Any + Send + Sync>>>);

impl RequestTable {
    fn entries(&self) -> MutexGuard<'_, HashMap<TaskId, Weak<dyn Any + Send + Sync>>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, id: TaskId, request: Weak<dyn Any + Send + Sync>) {
        self.entries().insert(id, request);
    }

    fn remove(&self, id: TaskId) {
        self.entries().remove(&id);
    }

    fn lookup<R: Request>(&self, id: TaskId) -> Option<Arc<R>> {
        let request = self.entries().get(&id)?.upgrade()?;
        request.downcast::<R>().ok()
    }

    fn prune(&self) {
        self.entries().retain(|_, request| request.strong_count() > 0);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Future returned by `Session::response`.
pub struct ResponseFuture<T> {
    receiver: oneshot::Receiver<Result<T, SessionError>>,
    task: Option<Arc<dyn SessionTask>>,
    finished: bool,
}

impl<T> ResponseFuture<T> {
    /// The underlying task, or `None` if the request failed to build.
    pub fn task(&self) -> Option<&Arc<dyn SessionTask>> {
        self.task.as_ref()
    }
}

impl<T> Future for ResponseFuture<T> {
    type Output = Result<T, SessionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(result) => {
                this.finished = true;
                // The sender only disappears if an adapter dropped the
                // completion without calling it.
                Poll::Ready(result.unwrap_or_else(|_| {
                    Err(SessionError::Connection(TransportError::cancelled()))
                }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for ResponseFuture<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}
