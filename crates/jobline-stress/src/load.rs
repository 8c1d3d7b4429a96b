use crate::config::StressConfig;
use anyhow::{Context, bail};
use core::{fmt, time::Duration};
use jobline::JobQueue;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Instant,
};

/// How often the sampler thread reads the queue's pending count.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one stress run.
#[derive(Debug, Clone)]
pub struct Report {
    pub submitted: usize,
    pub executed: usize,
    pub panicked: usize,
    pub peak_pending: usize,
    pub submit_elapsed: Duration,
    pub total_elapsed: Duration,
}

impl Report {
    fn rate(count: usize, elapsed: Duration) -> f64 {
        count as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted {} jobs in {:?} ({:.0} jobs/s), completed in {:?} ({:.0} jobs/s); \
             executed {}, panicked {}, peak pending {}",
            self.submitted,
            self.submit_elapsed,
            Self::rate(self.submitted, self.submit_elapsed),
            self.total_elapsed,
            Self::rate(self.submitted, self.total_elapsed),
            self.executed,
            self.panicked,
            self.peak_pending,
        )
    }
}

/// Runs one stress pass: floods a fresh queue from `config.producers`
/// threads, drains it, and checks that every job was accounted for.
pub fn run(config: &StressConfig) -> anyhow::Result<Report> {
    let executed = Arc::new(AtomicUsize::new(0));
    let panicked = Arc::new(AtomicUsize::new(0));

    let mut builder = JobQueue::builder()
        .workers(config.workers)
        .chunk_capacity(config.chunk_capacity)
        .thread_name("stress")
        .on_panic({
            let panicked = Arc::clone(&panicked);
            move |_| {
                panicked.fetch_add(1, Ordering::Relaxed);
            }
        });
    if let Some(limit) = config.high_watermark {
        builder = builder.high_watermark(limit);
    }
    let queue = builder.build().context("failed to start job queue")?;

    let peak_pending = AtomicUsize::new(0);
    let submitting = AtomicBool::new(true);
    let start = Instant::now();

    thread::scope(|s| -> anyhow::Result<()> {
        s.spawn(|| {
            while submitting.load(Ordering::Acquire) {
                peak_pending.fetch_max(queue.pending(), Ordering::Relaxed);
                thread::sleep(SAMPLE_INTERVAL);
            }
        });

        let producers: Vec<_> = (0..config.producers)
            .map(|producer| {
                let submitter = queue.submitter();
                let executed = Arc::clone(&executed);
                s.spawn(move || -> jobline::Result<()> {
                    for seq in 0..config.jobs_per_producer {
                        let job_id = producer * config.jobs_per_producer + seq;
                        let executed = Arc::clone(&executed);
                        let job_duration = config.job_duration;
                        let panic_every = config.panic_every;
                        submitter.submit(move || {
                            if !job_duration.is_zero() {
                                thread::sleep(job_duration);
                            }
                            if panic_every.is_some_and(|n| job_id % n == n - 1) {
                                panic!("injected failure in job {job_id}");
                            }
                            executed.fetch_add(1, Ordering::Relaxed);
                        })?;
                    }
                    Ok(())
                })
            })
            .collect();

        let results: Vec<_> = producers.into_iter().map(|p| p.join()).collect();
        submitting.store(false, Ordering::Release);

        for result in results {
            result.map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
        }
        Ok(())
    })?;

    let submit_elapsed = start.elapsed();
    tracing::info!(
        "All {} jobs submitted; draining {} pending",
        config.total_jobs,
        queue.pending()
    );

    queue
        .shutdown_timeout(config.shutdown_timeout)
        .context("queue did not drain in time")?;

    let report = Report {
        submitted: config.total_jobs,
        executed: executed.load(Ordering::Relaxed),
        panicked: panicked.load(Ordering::Relaxed),
        peak_pending: peak_pending.load(Ordering::Relaxed),
        submit_elapsed,
        total_elapsed: start.elapsed(),
    };

    if report.executed + report.panicked != report.submitted {
        bail!(
            "lost jobs: submitted {}, executed {}, panicked {}",
            report.submitted,
            report.executed,
            report.panicked
        );
    }

    Ok(report)
}
