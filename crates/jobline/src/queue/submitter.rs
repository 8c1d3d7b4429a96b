use crate::{Error, Job, JobHandle, Result, dispatch::PendingCounter};
use core::{fmt, time::Duration};
use crossbeam_channel::{SendTimeoutError, Sender};
use portable_atomic::Ordering;
use std::sync::Arc;

/// A cloneable producer handle for a [`JobQueue`].
///
/// Every submission is a synchronous hand-off to the coordinator thread: the
/// call returns as soon as the coordinator has queued the job, regardless of
/// whether any worker is idle. Submitters are `Send + Sync` and cheap to
/// clone, and stay usable (returning [`Error::ShutDown`]) after the queue has
/// been shut down.
///
/// [`JobQueue`]: crate::JobQueue
#[derive(Clone)]
pub struct Submitter {
    tx: Sender<Job>,
    pending: Arc<PendingCounter>,
}

impl Submitter {
    pub(crate) const fn new(tx: Sender<Job>, pending: Arc<PendingCounter>) -> Self {
        Self { tx, pending }
    }

    /// Hands `job` to the coordinator, blocking until it is accepted.
    ///
    /// The job runs exactly once on some worker, after every job accepted
    /// before it has been dispatched. Without a high-watermark this only
    /// waits for the coordinator's loop, never for a worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the queue no longer accepts jobs.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(job))
    }

    /// Like [`submit`](Self::submit), but gives up after `timeout`.
    ///
    /// A timeout is only expected when a high-watermark is configured and
    /// reached, or when the coordinator is starved of CPU.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the coordinator did not accept the job in time.
    ///   The job is dropped without running.
    /// - [`Error::ShutDown`] if the queue no longer accepts jobs.
    pub fn submit_timeout<F>(&self, job: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        match self.tx.send_timeout(job, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(Error::Timeout),
            Err(SendTimeoutError::Disconnected(_)) => Err(Error::ShutDown),
        }
    }

    /// Submits `f` and returns a [`JobHandle`] resolving to its return value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the queue no longer accepts jobs.
    pub fn submit_with_handle<F, T>(&self, f: F) -> Result<JobHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = JobHandle::wrap(f);
        self.submit_boxed(job)?;
        Ok(handle)
    }

    /// Number of jobs accepted by the coordinator but not yet handed to a
    /// worker.
    ///
    /// The value is published by the coordinator after every change and may
    /// be stale by the time it is read.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn submit_boxed(&self, job: Job) -> Result<()> {
        self.tx.send(job).map_err(|_| Error::ShutDown)
    }
}

impl fmt::Debug for Submitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submitter")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
