//! # Dispatch Executor Module
//!
//! A bounded pool of `may` worker coroutines that performs all blocking
//! resolution, filtering, and invocation work off the transport thread.
//!
//! Workers share a single channel and load-balance naturally. The queue
//! bound is enforced with an atomic depth counter: a full queue rejects
//! the submission instead of queueing it, and once shutdown is requested
//! every further submission is rejected - shutdown races never produce
//! silently queued work.

use crate::config::DispatchConfig;
use may::sync::mpsc;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send>;

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// `shutdown` has been requested; no further work is accepted
    ShuttingDown,
    /// The queue is at its configured bound
    QueueFull,
    /// Every worker has exited and the channel is closed
    Disconnected,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::ShuttingDown => write!(f, "executor is shutting down"),
            SubmitError::QueueFull => write!(f, "executor queue is full"),
            SubmitError::Disconnected => write!(f, "executor workers are gone"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Counters for monitoring the pool.
#[derive(Debug, Default)]
pub struct ExecutorMetrics {
    queue_depth: AtomicUsize,
    dispatched: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
}

impl ExecutorMetrics {
    fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    fn undo_dispatch(&self) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    /// Jobs submitted but not yet finished (approximate).
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn panicked_count(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

/// Bounded worker pool for dispatch work.
pub struct DispatchExecutor {
    sender: mpsc::Sender<Job>,
    shutdown: AtomicBool,
    metrics: Arc<ExecutorMetrics>,
    queue_bound: usize,
}

impl DispatchExecutor {
    /// Spawn the worker coroutines and return the executor.
    ///
    /// Worker count, stack size, queue bound, and worker labels all come
    /// from the config.
    pub fn new(config: &DispatchConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(rx);
        let metrics = Arc::new(ExecutorMetrics::default());
        let workers = config.workers.max(1);

        info!(
            workers = workers,
            queue_bound = config.queue_bound,
            stack_size = config.stack_size,
            "Starting dispatch executor"
        );

        for worker_id in 0..workers {
            let rx = rx.clone();
            let metrics = metrics.clone();
            let label = config.worker_label(worker_id);

            // SAFETY: may's coroutine spawn is unsafe because the runtime
            // cannot verify stack discipline for arbitrary closures. The
            // worker loop owns everything it touches (Arc'd receiver and
            // metrics), jobs are Send + 'static, and panics are contained
            // by catch_unwind below.
            let spawn_result = unsafe {
                may::coroutine::Builder::new()
                    .stack_size(config.stack_size)
                    .spawn(move || {
                        debug!(worker = %label, "Dispatch worker started");
                        while let Ok(job) = rx.recv() {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                metrics.record_panic();
                                error!(worker = %label, "Dispatch job panicked");
                            }
                            metrics.record_completion();
                        }
                        debug!(worker = %label, "Dispatch worker exiting");
                    })
            };
            if let Err(err) = spawn_result {
                error!(
                    worker_id = worker_id,
                    error = %err,
                    "Failed to spawn dispatch worker"
                );
            }
        }

        Self {
            sender: tx,
            shutdown: AtomicBool::new(false),
            metrics,
            queue_bound: config.queue_bound.max(1),
        }
    }

    /// Submit a job for execution on a worker.
    ///
    /// Rejected (never silently queued) when shutdown has been requested,
    /// the queue is at its bound, or the workers are gone.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), SubmitError> {
        if self.shutdown.load(Ordering::Acquire) {
            self.metrics.record_rejection();
            return Err(SubmitError::ShuttingDown);
        }
        if self.metrics.queue_depth() >= self.queue_bound {
            self.metrics.record_rejection();
            return Err(SubmitError::QueueFull);
        }
        self.metrics.record_dispatch();
        if self.sender.send(Box::new(job)).is_err() {
            self.metrics.undo_dispatch();
            self.metrics.record_rejection();
            return Err(SubmitError::Disconnected);
        }
        Ok(())
    }

    /// Request shutdown: already queued work drains, further submissions
    /// are rejected. Workers exit when the executor is dropped and the
    /// channel closes.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        info!(
            queue_depth = self.metrics.queue_depth(),
            "Dispatch executor shutting down - rejecting further submissions"
        );
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &Arc<ExecutorMetrics> {
        &self.metrics
    }
}
