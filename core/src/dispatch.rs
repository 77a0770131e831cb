//! Background execution and completion delivery.
//!
//! # Design
//! A `Dispatcher` has two jobs: run the blocking network work somewhere other
//! than the calling thread, and decide on which thread the completion
//! handler runs. `ThreadDispatcher` gives every request its own thread and
//! runs the handler there. `CompletionQueue` also spawns a thread per request
//! but parks the handler in a queue until the owning thread drains it, which
//! is how a UI main loop wants its callbacks.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// A unit of work handed to a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Run `work` off the calling thread.
    fn spawn(&self, work: Job);

    /// Run `completion`. Called on the thread that finished the work.
    fn deliver(&self, completion: Job);
}

/// One dedicated thread per request; handlers run on that thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDispatcher;

impl Dispatcher for ThreadDispatcher {
    fn spawn(&self, work: Job) {
        spawn_worker(work);
    }

    fn deliver(&self, completion: Job) {
        completion();
    }
}

fn spawn_worker(work: Job) {
    let slot = Arc::new(Mutex::new(Some(work)));
    let worker_slot = Arc::clone(&slot);
    let spawned = thread::Builder::new()
        .name("nettask-worker".to_string())
        .spawn(move || {
            if let Some(job) = take(&worker_slot) {
                job();
            }
        });

    // The handler must still run exactly once.
    if let Err(e) = spawned {
        log::error!("failed to spawn worker thread, running inline: {e}");
        if let Some(job) = take(&slot) {
            job();
        }
    }
}

fn take(slot: &Mutex<Option<Job>>) -> Option<Job> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

/// Completion handlers wait here until the owning thread runs them.
pub struct CompletionQueue {
    sender: Sender<Job>,
    receiver: Mutex<Receiver<Job>>,
}

impl CompletionQueue {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::channel();
        Arc::new(Self {
            sender,
            receiver: Mutex::new(receiver),
        })
    }

    /// Run every completion that is ready. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(job) = self.next(None) {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one completion and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.next(Some(timeout)) {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    fn next(&self, timeout: Option<Duration>) -> Option<Job> {
        let receiver = match self.receiver.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match timeout {
            None => receiver.try_recv().ok(),
            Some(timeout) => match receiver.recv_timeout(timeout) {
                Ok(job) => Some(job),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            },
        }
    }
}

impl Dispatcher for CompletionQueue {
    fn spawn(&self, work: Job) {
        spawn_worker(work);
    }

    fn deliver(&self, completion: Job) {
        if let Err(mpsc::SendError(job)) = self.sender.send(completion) {
            log::error!("completion queue closed, running handler on worker");
            job();
        }
    }
}

/// Runs request work on a tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioDispatcher {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Dispatcher for the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

#[cfg(feature = "tokio")]
impl Dispatcher for TokioDispatcher {
    fn spawn(&self, work: Job) {
        let job = RunOnce(Some(work));
        drop(self.handle.spawn_blocking(move || job.run()));
    }

    fn deliver(&self, completion: Job) {
        completion();
    }
}

/// Owns a job until it runs. A runtime that shuts down drops its queued
/// blocking tasks unrun; the job then moves to a worker thread instead.
#[cfg(feature = "tokio")]
struct RunOnce(Option<Job>);

#[cfg(feature = "tokio")]
impl RunOnce {
    fn run(mut self) {
        if let Some(job) = self.0.take() {
            job();
        }
    }
}

#[cfg(feature = "tokio")]
impl Drop for RunOnce {
    fn drop(&mut self) {
        if let Some(job) = self.0.take() {
            log::warn!("tokio runtime dropped a request job, moving it to a worker thread");
            spawn_worker(job);
        }
    }
}
