use crate::{Error, JobPanic, JobQueue, JobQueueBuilder, JobQueueConfig};
use core::time::Duration;
use crossbeam_channel::{Receiver, Sender};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Instant,
};

const PATIENCE: Duration = Duration::from_secs(5);

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PATIENCE;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// A job that occupies its worker until the returned sender is dropped. The
/// receiver fires once the job is running.
fn gate(queue: &JobQueue) -> (Sender<()>, Receiver<()>) {
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    queue
        .submit(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();
    (release_tx, started_rx)
}

#[test]
fn dispatches_in_submission_order() {
    let queue = JobQueue::new(1).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    for i in 0..1000 {
        let log = Arc::clone(&log);
        queue.submit(move || log.lock().unwrap().push(i)).unwrap();
    }
    queue.shutdown().unwrap();

    assert_eq!(*log.lock().unwrap(), (0..1000).collect::<Vec<_>>());
}

#[test]
fn preserves_per_producer_order_with_many_producers() {
    const PRODUCERS: usize = 8;
    const JOBS: usize = 250;

    let queue = JobQueue::new(1).unwrap();
    let log = Arc::new(Mutex::new(Vec::with_capacity(PRODUCERS * JOBS)));

    thread::scope(|s| {
        for producer in 0..PRODUCERS {
            let submitter = queue.submitter();
            let log = Arc::clone(&log);
            s.spawn(move || {
                for seq in 0..JOBS {
                    let log = Arc::clone(&log);
                    submitter
                        .submit(move || log.lock().unwrap().push((producer, seq)))
                        .unwrap();
                }
            });
        }
    });
    queue.shutdown().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), PRODUCERS * JOBS);
    let mut next = [0; PRODUCERS];
    for &(producer, seq) in log.iter() {
        assert_eq!(seq, next[producer], "producer {producer} out of order");
        next[producer] += 1;
    }
}

#[test]
fn runs_every_job_exactly_once_under_concurrent_producers() {
    const PRODUCERS: usize = 8;
    const JOBS: usize = 500;

    let queue = JobQueue::builder()
        .workers(num_cpus::get().clamp(2, 8))
        .chunk_capacity(64)
        .build()
        .unwrap();
    let runs: Arc<Vec<AtomicUsize>> =
        Arc::new((0..PRODUCERS * JOBS).map(|_| AtomicUsize::new(0)).collect());

    thread::scope(|s| {
        for producer in 0..PRODUCERS {
            let submitter = queue.submitter();
            let runs = Arc::clone(&runs);
            s.spawn(move || {
                for seq in 0..JOBS {
                    let runs = Arc::clone(&runs);
                    let id = producer * JOBS + seq;
                    submitter
                        .submit(move || {
                            runs[id].fetch_add(1, Ordering::Relaxed);
                        })
                        .unwrap();
                }
            });
        }
    });
    queue.shutdown().unwrap();

    for (id, count) in runs.iter().enumerate() {
        assert_eq!(count.load(Ordering::Relaxed), 1, "job {id}");
    }
}

#[test]
fn queued_jobs_cross_chunk_boundaries() {
    const CAPACITY: usize = 4;

    let queue = JobQueue::builder()
        .workers(1)
        .chunk_capacity(CAPACITY)
        .build()
        .unwrap();
    let (release, started) = gate(&queue);
    started.recv().unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..=CAPACITY {
        let log = Arc::clone(&log);
        queue.submit(move || log.lock().unwrap().push(i)).unwrap();
    }
    assert!(wait_until(|| queue.pending() == CAPACITY + 1));

    drop(release);
    queue.shutdown().unwrap();

    assert_eq!(*log.lock().unwrap(), (0..=CAPACITY).collect::<Vec<_>>());
}

#[test]
fn builds_from_a_config_with_a_pool_limit() {
    let config = JobQueueConfig {
        chunk_capacity: 2,
        pool_limit: Some(1),
        thread_name: String::from("pooled"),
        ..JobQueueConfig::new(1)
    };
    let builder = JobQueueBuilder::from_config(config.clone());
    assert_eq!(builder.config(), &config);

    let queue = builder.build().unwrap();
    let (release, started) = gate(&queue);
    started.recv().unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..21 {
        let log = Arc::clone(&log);
        queue.submit(move || log.lock().unwrap().push(i)).unwrap();
    }
    assert!(wait_until(|| queue.pending() == 21));

    drop(release);
    queue.shutdown().unwrap();

    assert_eq!(*log.lock().unwrap(), (0..21).collect::<Vec<_>>());
}

#[test]
fn two_workers_bound_concurrency() {
    let queue = JobQueue::new(2).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(Mutex::new(Vec::new()));
    let completed_before_two = Arc::new(Mutex::new(None));
    let (done_tx, done_rx) = crossbeam_channel::unbounded();

    let started = Instant::now();
    for i in 0..5 {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let completed = Arc::clone(&completed);
        let completed_before_two = Arc::clone(&completed_before_two);
        let done_tx = done_tx.clone();
        queue
            .submit(move || {
                let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now_active, Ordering::SeqCst);
                if i == 2 {
                    *completed_before_two.lock().unwrap() = Some(completed.lock().unwrap().clone());
                }

                thread::sleep(Duration::from_millis(10));

                completed.lock().unwrap().push(i);
                active.fetch_sub(1, Ordering::SeqCst);
                done_tx.send(i).unwrap();
            })
            .unwrap();
    }

    let mut finished = Vec::new();
    for _ in 0..5 {
        finished.push(done_rx.recv_timeout(PATIENCE).unwrap());
    }
    let elapsed = started.elapsed();
    queue.shutdown().unwrap();

    finished.sort_unstable();
    assert_eq!(finished, vec![0, 1, 2, 3, 4]);
    assert!(max_active.load(Ordering::SeqCst) <= 2);
    // Five 10ms jobs on two workers need at least three rounds.
    assert!(elapsed >= Duration::from_millis(30), "{elapsed:?}");

    // Job 2 is only handed out once a worker has finished job 0 or job 1.
    let before_two = completed_before_two.lock().unwrap().clone().unwrap();
    assert!(
        before_two.iter().any(|&i| i == 0 || i == 1),
        "job 2 started before jobs 0 and 1 freed a worker: {before_two:?}"
    );
}

#[test]
fn pending_counts_undispatched_jobs() {
    let queue = JobQueue::new(1).unwrap();
    assert_eq!(queue.pending(), 0);

    let (release, started) = gate(&queue);
    started.recv().unwrap();
    for _ in 0..3 {
        queue.submit(|| {}).unwrap();
    }
    assert!(wait_until(|| queue.pending() == 3));

    drop(release);
    assert!(wait_until(|| queue.pending() == 0));
    queue.shutdown().unwrap();
}

#[test]
fn high_watermark_holds_back_submissions() {
    let queue = JobQueue::builder()
        .workers(1)
        .high_watermark(1)
        .build()
        .unwrap();
    let (release, started) = gate(&queue);
    started.recv().unwrap();

    let ran = Arc::new(Mutex::new(Vec::new()));
    let record = |name: &'static str| {
        let ran = Arc::clone(&ran);
        move || ran.lock().unwrap().push(name)
    };

    queue.submit(record("queued")).unwrap();
    assert_eq!(
        queue.submit_timeout(record("rejected"), Duration::from_millis(50)),
        Err(Error::Timeout)
    );

    drop(release);
    queue.submit_timeout(record("accepted"), PATIENCE).unwrap();
    queue.shutdown().unwrap();

    assert_eq!(*ran.lock().unwrap(), vec!["queued", "accepted"]);
}

#[test]
fn panicking_job_does_not_kill_its_worker() {
    let reports: Arc<Mutex<Vec<JobPanic>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let queue = JobQueue::builder()
        .workers(1)
        .on_panic(move |report| sink.lock().unwrap().push(report.clone()))
        .build()
        .unwrap();

    queue.submit(|| panic!("boom")).unwrap();
    let failed = queue
        .submit_with_handle(|| -> u32 { panic!("kaboom") })
        .unwrap();
    let survived = queue.submit_with_handle(|| 5).unwrap();

    assert_eq!(failed.wait(), Err(Error::JobAbandoned));
    assert_eq!(survived.wait(), Ok(5));
    queue.shutdown().unwrap();

    let reports = reports.lock().unwrap();
    let messages: Vec<_> = reports.iter().map(JobPanic::message).collect();
    assert_eq!(messages, vec!["boom", "kaboom"]);
    assert!(reports.iter().all(|r| r.worker_id() == 0));
}

#[test]
fn panicking_sink_does_not_kill_its_worker() {
    let queue = JobQueue::builder()
        .workers(1)
        .on_panic(|_| panic!("sink failure"))
        .build()
        .unwrap();

    queue.submit(|| panic!("job failure")).unwrap();
    assert_eq!(queue.submit_with_handle(|| "alive").unwrap().wait(), Ok("alive"));
    queue.shutdown().unwrap();
}

#[test]
fn shutdown_drains_queued_jobs() {
    let queue = JobQueue::new(2).unwrap();
    let submitter = queue.submitter();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..100 {
        let counter = Arc::clone(&counter);
        queue
            .submit(move || {
                thread::sleep(Duration::from_micros(100));
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
    }
    queue.shutdown().unwrap();

    assert_eq!(counter.load(Ordering::Relaxed), 100);
    assert_eq!(submitter.submit(|| {}), Err(Error::ShutDown));
    assert_eq!(submitter.pending(), 0);
}

#[test]
fn shutdown_now_discards_queued_jobs() {
    let queue = JobQueue::new(1).unwrap();
    let (release, started) = gate(&queue);
    started.recv().unwrap();

    let handles: Vec<_> = (0..10)
        .map(|i| queue.submit_with_handle(move || i).unwrap())
        .collect();
    assert!(wait_until(|| queue.pending() == 10));

    thread::scope(|s| {
        let stopper = s.spawn(move || queue.shutdown_now());

        // Discarded jobs drop their result senders.
        let mut handles = handles.into_iter();
        let first = handles.next().unwrap();
        assert_eq!(first.wait(), Err(Error::JobAbandoned));

        drop(release);
        assert_eq!(stopper.join().unwrap(), Ok(10));

        for handle in handles {
            assert_eq!(handle.wait(), Err(Error::JobAbandoned));
        }
    });
}

#[test]
fn shutdown_releases_blocked_submitters() {
    let queue = JobQueue::builder()
        .workers(1)
        .high_watermark(1)
        .build()
        .unwrap();
    let (release, started) = gate(&queue);
    started.recv().unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let counted = {
        let ran = Arc::clone(&ran);
        move || {
            ran.fetch_add(1, Ordering::SeqCst);
        }
    };
    queue.submit(counted.clone()).unwrap();

    let submitter = queue.submitter();
    thread::scope(|s| {
        let blocked = s.spawn(move || submitter.submit(counted));
        let stopper = s.spawn(move || queue.shutdown());

        assert_eq!(blocked.join().unwrap(), Err(Error::ShutDown));
        drop(release);
        assert_eq!(stopper.join().unwrap(), Ok(()));
    });

    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn shutdown_timeout_reports_stuck_workers() {
    let queue = JobQueue::new(1).unwrap();
    let (release, started) = gate(&queue);
    started.recv().unwrap();

    assert_eq!(
        queue.shutdown_timeout(Duration::from_millis(50)),
        Err(Error::Timeout)
    );
    drop(release);

    let queue = JobQueue::new(2).unwrap();
    queue.submit(|| thread::sleep(Duration::from_millis(5))).unwrap();
    assert_eq!(queue.shutdown_timeout(PATIENCE), Ok(()));
}

#[test]
fn shutdown_timeout_accepts_unbounded_timeouts() {
    let queue = JobQueue::new(1).unwrap();
    queue.submit(|| {}).unwrap();
    assert_eq!(queue.shutdown_timeout(Duration::MAX), Ok(()));
}

#[test]
fn dropping_the_queue_still_runs_queued_jobs() {
    let queue = JobQueue::new(1).unwrap();
    let handles: Vec<_> = (0..20)
        .map(|i| queue.submit_with_handle(move || i * 2).unwrap())
        .collect();
    drop(queue);

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.wait(), Ok(i * 2));
    }
}

#[test]
fn rejects_zero_workers() {
    assert!(matches!(JobQueue::new(0), Err(Error::InvalidConfig { .. })));
    assert!(matches!(
        JobQueue::builder().workers(2).high_watermark(0).build(),
        Err(Error::InvalidConfig { .. })
    ));
}

#[test]
fn accepts_no_op_jobs() {
    let queue = JobQueue::new(1).unwrap();
    queue.submit(|| {}).unwrap();
    assert_eq!(queue.worker_count(), 1);
    queue.shutdown().unwrap();
}

#[test]
fn names_threads_after_the_configured_prefix() {
    let queue = JobQueue::builder()
        .workers(1)
        .thread_name("ingest")
        .build()
        .unwrap();
    let name = queue
        .submit_with_handle(|| thread::current().name().map(str::to_owned))
        .unwrap()
        .wait()
        .unwrap();
    queue.shutdown().unwrap();

    assert_eq!(name.as_deref(), Some("ingest-worker-0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handles_can_be_awaited() {
    let queue = JobQueue::new(2).unwrap();
    let handles: Vec<_> = (0..4_u64)
        .map(|i| queue.submit_with_handle(move || i * i).unwrap())
        .collect();

    let mut squares = Vec::new();
    for handle in handles {
        squares.push(tokio::time::timeout(PATIENCE, handle).await.unwrap().unwrap());
    }
    assert_eq!(squares, vec![0, 1, 4, 9]);

    tokio::task::spawn_blocking(move || queue.shutdown())
        .await
        .unwrap()
        .unwrap();
}
