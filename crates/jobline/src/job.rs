use crate::{Error, Result};
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use futures::channel::oneshot;
use std::{any::Any, sync::Arc};

/// A unit of work: an opaque, zero-argument callable run exactly once on some
/// worker thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Callback invoked on the worker thread whenever a job panics.
pub type PanicSink = Arc<dyn Fn(&JobPanic) + Send + Sync + 'static>;

/// Report of a job that panicked while running on a worker.
///
/// The worker that ran the job keeps serving the queue; this report is the
/// only trace the failure leaves besides the log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPanic {
    worker_id: usize,
    message: String,
}

impl JobPanic {
    pub(crate) fn new(worker_id: usize, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("Box<dyn Any>")
        };
        Self { worker_id, message }
    }

    /// Index of the worker that ran the job.
    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// The panic payload rendered as text.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for JobPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job panicked on worker {}: {}", self.worker_id, self.message)
    }
}

/// Completion handle for a job submitted with
/// [`JobQueue::submit_with_handle`].
///
/// The handle resolves to the job's return value once a worker has run it.
/// It can be awaited as a [`Future`], or waited on synchronously with
/// [`wait`](Self::wait). If the job panics or is discarded by an aborting
/// shutdown, the handle resolves to [`Error::JobAbandoned`].
///
/// Dropping the handle does not cancel the job.
///
/// [`JobQueue::submit_with_handle`]: crate::JobQueue::submit_with_handle
#[must_use = "dropping a JobHandle discards the job's result"]
pub struct JobHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Wraps `f` into a [`Job`] that reports its return value to the returned
    /// handle.
    pub(crate) fn wrap<F>(f: F) -> (Job, Self)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The receiver may be gone; the job still ran.
            let _ = tx.send(f());
        });
        (job, Self { rx })
    }

    /// Blocks the current thread until the job has run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobAbandoned`] if the job panicked or was discarded.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }

    /// Returns the job's value if it has already run, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobAbandoned`] if the job panicked or was discarded.
    pub fn try_wait(&mut self) -> Result<Option<T>> {
        self.rx.try_recv().map_err(|_| Error::JobAbandoned)
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| Error::JobAbandoned))
    }
}

impl<T> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").finish_non_exhaustive()
    }
}
