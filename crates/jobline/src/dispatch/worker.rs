use crate::{Job, JobPanic, PanicSink};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Worker thread body.
///
/// Receives one job at a time from the shared dispatch channel and runs it to
/// completion before asking for the next. A worker busy running a job is not
/// receiving, so the coordinator only ever hands work to idle workers.
///
/// Each job runs inside [`catch_unwind`]: a panicking job is reported as a
/// [`JobPanic`] (logged, then passed to `panic_sink` if one is set) and the
/// worker carries on with the next job.
///
/// The loop ends when the coordinator closes the dispatch channel. `_alive`
/// is dropped on exit, which is how shutdown observes that every thread has
/// finished.
///
/// # Arguments
///
/// - `worker_id`: Index of this worker, used in logs and panic reports.
/// - `jobs`: Receiving half of the dispatch channel shared by all workers.
/// - `panic_sink`: Optional callback for jobs that panic.
/// - `_alive`: Liveness token held for the duration of the loop.
pub(crate) fn worker_loop(
    worker_id: usize,
    jobs: Receiver<Job>,
    panic_sink: Option<PanicSink>,
    _alive: Sender<()>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    for job in jobs.iter() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            let report = JobPanic::new(worker_id, &*payload);

            #[cfg(feature = "tracing")]
            tracing::error!("{report}");

            if let Some(sink) = &panic_sink {
                // A panicking sink must not take the worker down either.
                if catch_unwind(AssertUnwindSafe(|| sink(&report))).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Panic sink panicked on worker {worker_id}");
                }
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}
