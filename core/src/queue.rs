//! Where result handlers run.
//!
//! A session hands every classified result to a `CallbackQueue` instead of
//! calling the user's handler directly from the adapter's thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{error, trace, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait CallbackQueue: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs handlers inline on whichever thread delivered the result: the
/// adapter's completion thread, or the caller's thread when a request fails
/// to build.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionQueue;

impl CallbackQueue for SessionQueue {
    fn execute(&self, job: Job) {
        job();
    }
}

/// A named serial queue backed by one worker thread.
///
/// Jobs run one at a time in submission order. A panicking job is logged and
/// the worker moves on to the next one. The worker exits once the queue is
/// dropped and pending jobs have drained.
#[derive(Debug)]
pub struct DispatchQueue {
    label: String,
    sender: Sender<Job>,
}

impl DispatchQueue {
    pub fn new(label: impl Into<String>) -> std::io::Result<Self> {
        let label = label.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker_label = label.clone();
        thread::Builder::new().name(label.clone()).spawn(move || {
            while let Ok(job) = receiver.recv() {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(label = %worker_label, "callback panicked");
                }
            }
        })?;
        trace!(label = %label, "dispatch queue started");
        Ok(Self { label, sender })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl CallbackQueue for DispatchQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!(label = %self.label, "dispatch queue worker is gone, job dropped");
        }
    }
}
