//! The [`JobQueue`] facade: construction, submission and shutdown.
//!
//! A queue owns one coordinator thread and a fixed set of worker threads:
//!
//! ```text
//! producers --submit--> [coordinator: ChunkedQueue] --dispatch--> workers
//!                 (rendezvous)                         (rendezvous)
//! ```
//!
//! Submissions only wait for the coordinator, which accepts on every loop
//! iteration regardless of queue depth, so bursts are absorbed by the
//! (unbounded, unless a high-watermark is set) chunked queue rather than by
//! blocking producers.

mod builder;
mod submitter;
#[cfg(test)]
mod tests;

pub use builder::*;
pub use submitter::*;

use crate::{
    ChunkedQueue, Error, Job, JobHandle, JobQueueConfig, PanicSink, Result,
    dispatch::{Control, Coordinator, PendingCounter, ShutdownMode, worker_loop},
};
use core::{fmt, time::Duration};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

/// An unbounded job dispatch queue backed by a fixed pool of worker threads.
///
/// Jobs are dispatched to workers in exactly the order the coordinator
/// accepted them, and each job runs exactly once. A job that panics is
/// reported (see [`JobQueueBuilder::on_panic`]) and does not take its worker
/// down.
///
/// Dropping a queue without calling one of the shutdown methods requests a
/// draining shutdown and detaches the threads: queued jobs still run, but
/// nothing waits for them.
///
/// # Example
/// ```
/// use jobline::JobQueue;
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// let queue = JobQueue::new(4).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..100 {
///     let counter = Arc::clone(&counter);
///     queue.submit(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     }).unwrap();
/// }
///
/// let answer = queue.submit_with_handle(|| 6 * 7).unwrap();
/// assert_eq!(answer.wait().unwrap(), 42);
///
/// queue.shutdown().unwrap();
/// assert_eq!(counter.load(Ordering::Relaxed), 100);
/// ```
pub struct JobQueue {
    submitter: Submitter,
    control: Sender<Control>,
    coordinator: Option<JoinHandle<usize>>,
    workers: Vec<JoinHandle<()>>,
    alive: Receiver<()>,
    worker_count: usize,
}

impl JobQueue {
    /// Starts a queue with `worker_count` workers and default settings.
    ///
    /// Spawns `worker_count + 1` threads and returns without waiting for them.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `worker_count` is zero.
    /// - [`Error::Spawn`] if a thread could not be started.
    pub fn new(worker_count: usize) -> Result<Self> {
        Self::builder().workers(worker_count).build()
    }

    /// Returns a [`JobQueueBuilder`] for customizing the queue.
    pub fn builder() -> JobQueueBuilder {
        JobQueueBuilder::default()
    }

    pub(crate) fn spawn(config: JobQueueConfig, panic_sink: Option<PanicSink>) -> Result<Self> {
        let (submit_tx, submit_rx) = crossbeam_channel::bounded::<Job>(0);
        let (dispatch_tx, dispatch_rx) = crossbeam_channel::bounded::<Job>(0);
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        // Never carries a message: it disconnects once every thread has exited.
        let (alive_tx, alive_rx) = crossbeam_channel::bounded::<()>(0);
        let pending = Arc::new(PendingCounter::default());

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let jobs = dispatch_rx.clone();
            let sink = panic_sink.clone();
            let alive = alive_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{worker_id}", config.thread_name))
                .spawn(move || worker_loop(worker_id, jobs, sink, alive))
                .map_err(|e| Error::Spawn {
                    context: format!("worker {worker_id}: {e}"),
                })?;
            workers.push(handle);
        }
        drop(dispatch_rx);

        let mut queue = ChunkedQueue::with_chunk_capacity(config.chunk_capacity);
        if let Some(limit) = config.pool_limit {
            queue = queue.with_pool_limit(limit);
        }
        let coordinator = Coordinator::new(
            queue,
            submit_rx,
            dispatch_tx,
            control_rx,
            Arc::clone(&pending),
            config.high_watermark,
        );
        let coordinator = thread::Builder::new()
            .name(format!("{}-coordinator", config.thread_name))
            .spawn(move || {
                let _alive = alive_tx;
                coordinator.run()
            })
            .map_err(|e| Error::Spawn {
                context: format!("coordinator: {e}"),
            })?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Started job queue '{}' with {} workers",
            config.thread_name,
            config.workers
        );

        Ok(Self {
            submitter: Submitter::new(submit_tx, pending),
            control: control_tx,
            coordinator: Some(coordinator),
            workers,
            alive: alive_rx,
            worker_count: config.workers,
        })
    }

    /// Hands `job` to the coordinator. See [`Submitter::submit`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the queue no longer accepts jobs.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submitter.submit(job)
    }

    /// Hands `job` to the coordinator, giving up after `timeout`. See
    /// [`Submitter::submit_timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::ShutDown`].
    pub fn submit_timeout<F>(&self, job: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submitter.submit_timeout(job, timeout)
    }

    /// Submits `f` and returns a handle to its result. See
    /// [`Submitter::submit_with_handle`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] if the queue no longer accepts jobs.
    pub fn submit_with_handle<F, T>(&self, f: F) -> Result<JobHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submitter.submit_with_handle(f)
    }

    /// Returns a cloneable producer handle for this queue.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Number of jobs queued but not yet handed to a worker.
    pub fn pending(&self) -> usize {
        self.submitter.pending()
    }

    /// Number of worker threads.
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Stops accepting jobs, runs every queued job, and waits for all threads
    /// to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadPanicked`] if a background thread died.
    pub fn shutdown(self) -> Result<()> {
        self.stop(ShutdownMode::Drain).map(|_| ())
    }

    /// Stops accepting jobs, discards every queued job, and waits for the
    /// workers to finish the jobs they are running.
    ///
    /// Returns the number of discarded jobs. Handles of discarded jobs resolve
    /// to [`Error::JobAbandoned`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadPanicked`] if a background thread died.
    pub fn shutdown_now(self) -> Result<usize> {
        self.stop(ShutdownMode::Abort)
    }

    /// Like [`shutdown`](Self::shutdown), but waits at most `timeout` for the
    /// threads to exit.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if threads are still running when `timeout`
    ///   elapses. They are detached and keep draining in the background.
    /// - [`Error::ThreadPanicked`] if a background thread died.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Result<()> {
        self.request(ShutdownMode::Drain);

        // A timeout too large to represent as a deadline means wait forever.
        let exited = match Instant::now().checked_add(timeout) {
            Some(deadline) => self.alive.recv_deadline(deadline),
            None => self
                .alive
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match exited {
            Err(RecvTimeoutError::Disconnected) => self.join().map(|_| ()),
            Err(RecvTimeoutError::Timeout) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Shutdown timed out after {timeout:?}; detaching threads");
                self.coordinator.take();
                self.workers.clear();
                Err(Error::Timeout)
            }
            Ok(()) => unreachable!("liveness channel never carries messages"),
        }
    }

    fn stop(mut self, mode: ShutdownMode) -> Result<usize> {
        self.request(mode);
        self.join()
    }

    fn request(&self, mode: ShutdownMode) {
        // A send error means the coordinator already stopped on its own.
        let _ = self.control.send(Control::Shutdown(mode));
    }

    /// Joins the coordinator, then every worker. Returns the coordinator's
    /// discarded-job count, or the first thread failure.
    fn join(&mut self) -> Result<usize> {
        let mut result = match self.coordinator.take() {
            Some(handle) => handle.join().map_err(|_| Error::ThreadPanicked {
                context: String::from("coordinator"),
            }),
            None => Ok(0),
        };

        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() && result.is_ok() {
                result = Err(Error::ThreadPanicked {
                    context: format!("worker {worker_id}"),
                });
            }
        }

        #[cfg(feature = "tracing")]
        {
            match &result {
                Ok(discarded) => tracing::info!("Job queue shut down ({discarded} jobs discarded)"),
                Err(e) => tracing::error!("Job queue shut down with error: {e}"),
            }
        }

        result
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        if self.coordinator.is_some() {
            self.request(ShutdownMode::Drain);
        }
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("worker_count", &self.worker_count)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
