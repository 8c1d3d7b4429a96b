use super::JobQueue;
use crate::{JobPanic, JobQueueConfig, PanicSink, Result};
use core::fmt;
use std::sync::Arc;

/// Builder for a [`JobQueue`].
///
/// Every setting defaults to the values of [`JobQueueConfig::default`]. The
/// configuration is validated by [`build`](Self::build) before any thread is
/// started.
///
/// # Example
/// ```
/// use jobline::JobQueue;
///
/// let queue = JobQueue::builder()
///     .workers(4)
///     .chunk_capacity(1024)
///     .high_watermark(100_000)
///     .thread_name("ingest")
///     .on_panic(|report| eprintln!("{report}"))
///     .build()
///     .unwrap();
///
/// queue.submit(|| println!("hello from a worker")).unwrap();
/// queue.shutdown().unwrap();
/// ```
#[derive(Clone, Default)]
#[must_use]
pub struct JobQueueBuilder {
    config: JobQueueConfig,
    panic_sink: Option<PanicSink>,
}

impl JobQueueBuilder {
    /// Starts from an existing configuration.
    pub fn from_config(config: JobQueueConfig) -> Self {
        Self {
            config,
            panic_sink: None,
        }
    }

    /// Number of worker threads. Must be at least 1.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Job slots per chunk of the coordinator's queue. Must be at least 1.
    pub fn chunk_capacity(mut self, chunk_capacity: usize) -> Self {
        self.config.chunk_capacity = chunk_capacity;
        self
    }

    /// Maximum number of drained chunks kept for reuse.
    pub fn pool_limit(mut self, pool_limit: usize) -> Self {
        self.config.pool_limit = Some(pool_limit);
        self
    }

    /// Pending-job count at which submissions wait for a worker to free up.
    /// Must be at least 1.
    pub fn high_watermark(mut self, high_watermark: usize) -> Self {
        self.config.high_watermark = Some(high_watermark);
        self
    }

    /// Prefix for the names of the coordinator and worker threads.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.config.thread_name = thread_name.into();
        self
    }

    /// Callback run on the worker thread whenever a job panics.
    pub fn on_panic<F>(mut self, sink: F) -> Self
    where
        F: Fn(&JobPanic) + Send + Sync + 'static,
    {
        self.panic_sink = Some(Arc::new(sink));
        self
    }

    /// Returns the configuration assembled so far.
    pub const fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Validates the configuration and starts the coordinator and workers.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the configuration is rejected by
    ///   [`JobQueueConfig::validate`].
    /// - [`Error::Spawn`] if a thread could not be started.
    ///
    /// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
    /// [`Error::Spawn`]: crate::Error::Spawn
    pub fn build(self) -> Result<JobQueue> {
        self.config.validate()?;
        JobQueue::spawn(self.config, self.panic_sink)
    }
}

impl fmt::Debug for JobQueueBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueueBuilder")
            .field("config", &self.config)
            .field("panic_sink", &self.panic_sink.is_some())
            .finish()
    }
}
