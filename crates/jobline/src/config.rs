//! Configuration constants and the validated queue configuration.
//!
//! These values control how a [`JobQueue`] sizes its worker pool, how the
//! coordinator's chunked queue allocates storage, and whether submissions are
//! throttled once too many jobs are waiting.
//!
//! ## Key Concepts
//! - **Chunking**: pending jobs live in fixed-capacity chunks. Larger chunks
//!   mean fewer allocations under bursts, at the cost of a bigger minimum
//!   footprint per queue.
//! - **Pooling**: drained chunks are kept for reuse. `pool_limit` caps how
//!   many are retained once a burst is over.
//! - **Backpressure**: the queue is unbounded by default. A `high_watermark`
//!   makes producers wait while that many jobs are already pending.
//!
//! [`JobQueue`]: crate::JobQueue

use crate::{Error, Result};

/// Number of job slots per chunk when none is configured.
pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

/// Prefix used to name the coordinator and worker threads.
pub const DEFAULT_THREAD_NAME: &str = "jobline";

/// Runtime configuration of a [`JobQueue`].
///
/// Build one through [`JobQueue::builder`]; the builder validates it before
/// any thread is spawned.
///
/// [`JobQueue`]: crate::JobQueue
/// [`JobQueue::builder`]: crate::JobQueue::builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueueConfig {
    /// Number of worker threads executing jobs.
    pub workers: usize,
    /// Job slots per chunk of the coordinator's queue.
    pub chunk_capacity: usize,
    /// Maximum number of drained chunks kept for reuse. `None` keeps all.
    pub pool_limit: Option<usize>,
    /// Pending-job count at which new submissions stop being accepted until a
    /// worker takes a job. `None` disables the limit.
    pub high_watermark: Option<usize>,
    /// Prefix for thread names: `{thread_name}-coordinator` and
    /// `{thread_name}-worker-{index}`.
    pub thread_name: String,
}

impl JobQueueConfig {
    /// Creates a configuration with `workers` workers and defaults elsewhere.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Checks that the configuration describes a queue that can make
    /// progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if:
    /// - `workers` is zero (jobs would be queued forever).
    /// - `chunk_capacity` is zero.
    /// - `high_watermark` is `Some(0)` (no job could ever be accepted).
    /// - `thread_name` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("workers must be greater than 0"));
        }
        if self.chunk_capacity == 0 {
            return Err(invalid("chunk_capacity must be greater than 0"));
        }
        if self.high_watermark == Some(0) {
            return Err(invalid("high_watermark must be greater than 0 when set"));
        }
        if self.thread_name.is_empty() {
            return Err(invalid("thread_name must not be empty"));
        }
        Ok(())
    }
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            pool_limit: None,
            high_watermark: None,
            thread_name: String::from(DEFAULT_THREAD_NAME),
        }
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidConfig {
        reason: reason.to_owned(),
    }
}
