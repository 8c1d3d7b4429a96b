use super::{Control, PendingCounter, ShutdownMode};
use crate::{ChunkedQueue, Job};
use crossbeam_channel::{Receiver, Select, Sender};
use portable_atomic::Ordering;
use std::sync::Arc;

/// Single owner of the pending-job queue.
///
/// The coordinator runs on its own thread and loops over one multi-way select:
///
/// - **dispatch**: offer the head job to the worker channel, enabled only
///   while the queue is non-empty.
/// - **submit**: accept a job from a producer, enabled only while below the
///   high-watermark (if one is configured).
/// - **control**: react to a shutdown request, always enabled.
///
/// Because the dispatch and submission channels are rendezvous channels,
/// producers wait only for the coordinator to reach its select, never for a
/// worker to become idle.
pub(crate) struct Coordinator {
    queue: ChunkedQueue<Job>,
    submissions: Receiver<Job>,
    dispatch: Sender<Job>,
    control: Receiver<Control>,
    pending: Arc<PendingCounter>,
    high_watermark: Option<usize>,
}

impl Coordinator {
    pub(crate) const fn new(
        queue: ChunkedQueue<Job>,
        submissions: Receiver<Job>,
        dispatch: Sender<Job>,
        control: Receiver<Control>,
        pending: Arc<PendingCounter>,
        high_watermark: Option<usize>,
    ) -> Self {
        Self {
            queue,
            submissions,
            dispatch,
            control,
            pending,
            high_watermark,
        }
    }

    /// Runs the coordinator until shutdown and returns how many queued jobs
    /// were discarded.
    ///
    /// On return the dispatch channel is closed, which stops the workers once
    /// they finish their current job.
    pub(crate) fn run(mut self) -> usize {
        #[cfg(feature = "tracing")]
        tracing::debug!("Coordinator started");

        let (mode, dropped) = self.serve();

        let Self {
            mut queue,
            submissions,
            dispatch,
            pending,
            ..
        } = self;

        // Producers blocked in `submit` observe the disconnect and fail with
        // `Error::ShutDown` instead of waiting forever.
        drop(submissions);

        let discarded = match mode {
            ShutdownMode::Drain => {
                #[cfg(feature = "tracing")]
                tracing::info!("Draining {} queued jobs", queue.len());

                let mut discarded = 0;
                while let Some(job) = queue.pop() {
                    pending.store(queue.len(), Ordering::Release);
                    if dispatch.send(job).is_err() {
                        // Every worker is gone; nothing can run the rest.
                        discarded = queue.len() + 1;
                        queue.clear();
                        break;
                    }
                }
                discarded
            }
            ShutdownMode::Abort => {
                let discarded = queue.len() + dropped;
                queue.clear();
                discarded
            }
        };
        pending.store(0, Ordering::Release);

        #[cfg(feature = "tracing")]
        {
            if discarded > 0 {
                tracing::warn!("Coordinator discarded {discarded} queued jobs");
            }
            tracing::debug!("Coordinator stopped");
        }

        discarded
    }

    /// Serves submissions and dispatches until a shutdown is requested.
    ///
    /// Returns the requested mode and the number of jobs lost outside the
    /// queue, which is 1 when the last worker vanished mid-dispatch.
    fn serve(&mut self) -> (ShutdownMode, usize) {
        #[cfg(feature = "tracing")]
        let mut throttled = false;

        loop {
            let accepting = self
                .high_watermark
                .is_none_or(|limit| self.queue.len() < limit);

            #[cfg(feature = "tracing")]
            {
                if throttled == accepting {
                    throttled = !accepting;
                    tracing::debug!(
                        "High-watermark {} submissions at {} pending jobs",
                        if throttled { "throttling" } else { "releasing" },
                        self.queue.len()
                    );
                }
            }

            let mut sel = Select::new();
            let control = sel.recv(&self.control);
            let submit = accepting.then(|| sel.recv(&self.submissions));
            let dispatch = self.queue.peek().map(|_| sel.send(&self.dispatch));

            let oper = sel.select();
            let index = oper.index();

            if index == control {
                let mode = match oper.recv(&self.control) {
                    Ok(Control::Shutdown(mode)) => {
                        #[cfg(feature = "tracing")]
                        tracing::info!("Coordinator received shutdown ({mode:?})");
                        mode
                    }
                    // The facade is gone without asking for anything.
                    Err(_) => ShutdownMode::Drain,
                };
                return (mode, 0);
            } else if Some(index) == submit {
                match oper.recv(&self.submissions) {
                    Ok(job) => {
                        self.queue.push(job);
                        self.publish_pending();
                    }
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("All submitters disconnected");
                        return (ShutdownMode::Drain, 0);
                    }
                }
            } else if Some(index) == dispatch {
                let job = self
                    .queue
                    .pop()
                    .expect("dispatch is only offered while a job is queued");
                self.publish_pending();
                if oper.send(&self.dispatch, job).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("All workers exited; abandoning queued jobs");
                    return (ShutdownMode::Abort, 1);
                }
            } else {
                unreachable!("select returned an unregistered operation");
            }
        }
    }

    fn publish_pending(&self) {
        self.pending.store(self.queue.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    #[test]
    fn counts_the_job_in_flight_when_every_worker_is_gone() {
        let (_submit_tx, submit_rx) = bounded::<Job>(0);
        let (dispatch_tx, dispatch_rx) = bounded::<Job>(0);
        let (_control_tx, control_rx) = unbounded();
        drop(dispatch_rx);

        let mut queue = ChunkedQueue::with_chunk_capacity(2);
        for _ in 0..3 {
            queue.push(Box::new(|| {}) as Job);
        }
        let pending = Arc::new(PendingCounter::default());
        let coordinator = Coordinator::new(
            queue,
            submit_rx,
            dispatch_tx,
            control_rx,
            Arc::clone(&pending),
            None,
        );

        assert_eq!(coordinator.run(), 3);
        assert_eq!(pending.load(Ordering::Acquire), 0);
    }
}
