use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use jobline::DEFAULT_CHUNK_CAPACITY;

/// Runtime configuration for the `jobline-stress` binary.
///
/// All values are parsed from CLI arguments or environment variables. The
/// defaults produce a short, CPU-bound run that finishes in a few seconds on a
/// laptop.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "jobline-stress",
    version,
    about = "Floods a jobline JobQueue from many producers and reports throughput"
)]
pub struct CliArgs {
    /// Number of worker threads executing jobs.
    ///
    /// Environment variable: `JOBLINE_WORKERS`
    #[arg(long, env = "JOBLINE_WORKERS", default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Number of producer threads submitting jobs concurrently.
    ///
    /// Environment variable: `JOBLINE_PRODUCERS`
    #[arg(long, env = "JOBLINE_PRODUCERS", default_value_t = 4)]
    pub producers: usize,

    /// Number of jobs submitted by each producer.
    ///
    /// Environment variable: `JOBLINE_JOBS`
    #[arg(long, env = "JOBLINE_JOBS", default_value_t = 100_000)]
    pub jobs: usize,

    /// Time each job sleeps, in microseconds. `0` makes jobs trivially cheap,
    /// which measures dispatch overhead.
    ///
    /// Environment variable: `JOBLINE_JOB_MICROS`
    #[arg(long, env = "JOBLINE_JOB_MICROS", default_value_t = 0)]
    pub job_micros: u64,

    /// Job slots per chunk of the coordinator's queue.
    ///
    /// Environment variable: `JOBLINE_CHUNK_CAPACITY`
    #[arg(long, env = "JOBLINE_CHUNK_CAPACITY", default_value_t = DEFAULT_CHUNK_CAPACITY)]
    pub chunk_capacity: usize,

    /// Pending-job count at which producers are held back. Unbounded if unset.
    ///
    /// Environment variable: `JOBLINE_HIGH_WATERMARK`
    #[arg(long, env = "JOBLINE_HIGH_WATERMARK")]
    pub high_watermark: Option<usize>,

    /// Make every Nth job panic, to exercise panic isolation.
    ///
    /// Environment variable: `JOBLINE_PANIC_EVERY`
    #[arg(long, env = "JOBLINE_PANIC_EVERY")]
    pub panic_every: Option<usize>,

    /// Seconds to wait for the queue to drain after all jobs were submitted.
    ///
    /// Environment variable: `JOBLINE_SHUTDOWN_TIMEOUT`
    #[arg(long, env = "JOBLINE_SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct StressConfig {
    pub workers: usize,
    pub producers: usize,
    pub jobs_per_producer: usize,
    pub total_jobs: usize,
    pub job_duration: Duration,
    pub chunk_capacity: usize,
    pub high_watermark: Option<usize>,
    pub panic_every: Option<usize>,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for StressConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("JOBLINE_WORKERS must be greater than 0");
        }
        if args.producers == 0 {
            bail!("JOBLINE_PRODUCERS must be greater than 0");
        }
        if args.chunk_capacity == 0 {
            bail!("JOBLINE_CHUNK_CAPACITY must be greater than 0");
        }
        if args.high_watermark == Some(0) {
            bail!("JOBLINE_HIGH_WATERMARK must be greater than 0 when set");
        }
        if args.panic_every == Some(0) {
            bail!("JOBLINE_PANIC_EVERY must be greater than 0 when set");
        }

        let total_jobs = args
            .jobs
            .checked_mul(args.producers)
            .ok_or_else(|| anyhow::anyhow!("Overflow in total job count computation"))?;

        Ok(Self {
            workers: args.workers,
            producers: args.producers,
            jobs_per_producer: args.jobs,
            total_jobs,
            job_duration: Duration::from_micros(args.job_micros),
            chunk_capacity: args.chunk_capacity,
            high_watermark: args.high_watermark,
            panic_every: args.panic_every,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
