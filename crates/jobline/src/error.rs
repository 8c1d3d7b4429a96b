//! Error types for the job dispatch queue.
//!
//! Invariant violations inside the chunked queue or the coordinator are not
//! represented here: they are programming errors and abort with a panic.
//! Everything a caller can reasonably react to is an [`Error`] variant.
//!
//! ## Error Cases
//! - `InvalidConfig`: the builder was given a value that would make the queue
//!   unusable (zero workers, zero-sized chunks, ...).
//! - `ShutDown`: the coordinator no longer accepts submissions.
//! - `Timeout`: a bounded wait elapsed (submission or shutdown).
//! - `JobAbandoned`: a job tracked by a [`JobHandle`] never produced a value.
//! - `Spawn`: the OS refused to start a coordinator or worker thread.
//! - `ThreadPanicked`: a coordinator or worker thread terminated by panic.
//!
//! [`JobHandle`]: crate::JobHandle

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `jobline` can report.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The queue configuration was rejected at construction time.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The queue is shutting down or has shut down; the job was not accepted.
    #[error("Job queue is shut down")]
    ShutDown,

    /// A bounded wait elapsed before the operation could complete.
    #[error("Operation timed out")]
    Timeout,

    /// The job was dropped before producing a value, either because it
    /// panicked or because it was discarded by [`JobQueue::shutdown_now`].
    ///
    /// [`JobQueue::shutdown_now`]: crate::JobQueue::shutdown_now
    #[error("Job was abandoned before completing")]
    JobAbandoned,

    /// A background thread could not be spawned.
    #[error("Failed to spawn thread: {context}")]
    Spawn { context: String },

    /// A background thread terminated by panicking.
    #[error("Thread panicked: {context}")]
    ThreadPanicked { context: String },
}
