//! Tests for the bounded dispatch executor
//!
//! # Test Coverage
//!
//! - Submitted jobs execute on worker coroutines
//! - Panicking jobs are contained; the pool keeps serving
//! - Shutdown rejects new submissions but drains queued work
//! - Metrics reflect dispatch/completion/rejection counts

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use turnpike::config::DispatchConfig;
use turnpike::executor::{DispatchExecutor, SubmitError};

fn wait_until(deadline: Duration, probe: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if probe() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

fn small_executor() -> DispatchExecutor {
    DispatchExecutor::new(&DispatchConfig {
        workers: 2,
        queue_bound: 16,
        ..DispatchConfig::default()
    })
}

#[test]
fn test_jobs_execute() {
    common::init_tracing();
    let executor = small_executor();
    let counter = Arc::new(AtomicU64::new(0));

    for _ in 0..8 {
        let counter = counter.clone();
        executor
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("submit succeeds");
    }

    assert!(wait_until(Duration::from_secs(5), || {
        counter.load(Ordering::SeqCst) == 8
    }));
    assert_eq!(executor.metrics().dispatched_count(), 8);
    assert!(wait_until(Duration::from_secs(5), || {
        executor.metrics().completed_count() == 8
    }));
}

#[test]
fn test_panicking_job_does_not_kill_the_pool() {
    common::init_tracing();
    let executor = small_executor();
    let survived = Arc::new(AtomicU64::new(0));

    executor
        .submit(|| panic!("job blew up"))
        .expect("submit succeeds");
    let probe = survived.clone();
    executor
        .submit(move || {
            probe.fetch_add(1, Ordering::SeqCst);
        })
        .expect("submit succeeds");

    assert!(wait_until(Duration::from_secs(5), || {
        survived.load(Ordering::SeqCst) == 1
    }));
    assert!(wait_until(Duration::from_secs(5), || {
        executor.metrics().panicked_count() == 1
    }));
}

#[test]
fn test_shutdown_rejects_new_work_but_drains_queued() {
    common::init_tracing();
    let executor = small_executor();
    let drained = Arc::new(AtomicU64::new(0));

    for _ in 0..4 {
        let drained = drained.clone();
        executor
            .submit(move || {
                drained.fetch_add(1, Ordering::SeqCst);
            })
            .expect("submit succeeds");
    }
    executor.shutdown();
    assert!(executor.is_shutdown());
    assert_eq!(executor.submit(|| {}), Err(SubmitError::ShuttingDown));

    // Work queued before shutdown still runs.
    assert!(wait_until(Duration::from_secs(5), || {
        drained.load(Ordering::SeqCst) == 4
    }));
    assert_eq!(executor.metrics().rejected_count(), 1);
}
