//! The coordinator thread and the worker threads behind a [`JobQueue`].
//!
//! Producers hand jobs to the coordinator over a rendezvous channel. The
//! coordinator is the only owner of the [`ChunkedQueue`] holding pending jobs
//! and offers the head job to whichever worker is ready over a second
//! rendezvous channel. Ownership of the queue never leaves the coordinator
//! thread, so neither the queue nor the pending counter needs a lock.
//!
//! [`JobQueue`]: crate::JobQueue
//! [`ChunkedQueue`]: crate::ChunkedQueue

mod coordinator;
mod worker;

pub(crate) use coordinator::Coordinator;
pub(crate) use worker::worker_loop;

/// How a shutdown treats jobs that are queued but not yet dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ShutdownMode {
    /// Stop accepting jobs, dispatch everything already queued, then stop.
    Drain,
    /// Stop accepting jobs and discard everything still queued.
    Abort,
}

/// Messages from the [`JobQueue`](crate::JobQueue) facade to the coordinator.
#[derive(Debug)]
pub(crate) enum Control {
    Shutdown(ShutdownMode),
}

/// Number of jobs queued in the coordinator but not yet handed to a worker.
///
/// Written only by the coordinator; everyone else reads.
#[cfg(feature = "cache-padded")]
pub(crate) type PendingCounter = crossbeam_utils::CachePadded<portable_atomic::AtomicUsize>;
#[cfg(not(feature = "cache-padded"))]
pub(crate) type PendingCounter = portable_atomic::AtomicUsize;
