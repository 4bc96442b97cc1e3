//! Background teardown of unloaded domains.
//!
//! Unloading a domain only removes its bookkeeping. The last strong reference
//! is handed to this pool, whose workers finish the teardown off the caller's
//! thread.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, trace};
use parking_lot::{Condvar, Mutex};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

use isobridge_core::utils::TeardownConfig;

/// Error when submitting a job to the teardown pool
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool is shutting down
    #[error("teardown pool is shutting down")]
    ShuttingDown,

    /// A worker thread could not be started
    #[error("failed to spawn teardown worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Statistics about the teardown pool
#[derive(Debug, Default, Clone)]
pub struct TeardownStats {
    /// Number of jobs queued
    pub jobs_queued: usize,

    /// Number of jobs completed
    pub jobs_completed: usize,

    /// Number of jobs that panicked
    pub jobs_panicked: usize,

    /// Maximum job execution time (microseconds)
    pub max_execution_time_us: u64,
}

/// Job with metadata for tracking
struct Job {
    func: Box<dyn FnOnce() + Send + 'static>,
    enqueued_at: Instant,
}

/// Counters shared between the pool handle and its workers
#[derive(Default)]
struct Shared {
    jobs_completed: AtomicUsize,
    jobs_panicked: AtomicUsize,
    max_execution_time_us: AtomicUsize,

    /// Jobs accepted but not yet finished
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl Shared {
    fn finish_job(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }
}

/// A small worker pool for domain teardown
pub struct TeardownPool {
    sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    is_shutting_down: Arc<AtomicBool>,
    jobs_queued: AtomicUsize,
    overflow_spawned: AtomicUsize,
    shared: Arc<Shared>,
}

impl TeardownPool {
    /// Create a pool with the given configuration
    pub fn new(config: &TeardownConfig) -> Result<Self, PoolError> {
        let (sender, receiver) = bounded(config.queue_size);
        let is_shutting_down = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared::default());

        info!(
            "Creating teardown pool with {} workers and queue size {}",
            config.workers, config.queue_size
        );

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let receiver = receiver.clone();
            let shutdown_flag = Arc::clone(&is_shutting_down);
            let shared = Arc::clone(&shared);

            let handle = thread::Builder::new()
                .name(format!("isobridge-teardown-{}", id))
                .spawn(move || Self::worker_loop(id, receiver, shutdown_flag, shared))?;
            workers.push(handle);
        }

        Ok(Self {
            sender,
            workers,
            is_shutting_down,
            jobs_queued: AtomicUsize::new(0),
            overflow_spawned: AtomicUsize::new(0),
            shared,
        })
    }

    fn worker_loop(
        id: usize,
        receiver: Receiver<Job>,
        shutdown_flag: Arc<AtomicBool>,
        shared: Arc<Shared>,
    ) {
        debug!("Teardown worker {}: Starting", id);

        while !shutdown_flag.load(Ordering::Relaxed) {
            // Wake every 100ms to observe the shutdown flag
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(job) => Self::run_job(&format!("worker {}", id), job, &shared),
                Err(_) => {
                    if shutdown_flag.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }
        }

        debug!("Teardown worker {}: Shutting down", id);
    }

    fn run_job(runner: &str, job: Job, shared: &Shared) {
        trace!(
            "Teardown {}: Running job (queue time: {:.2}ms)",
            runner,
            job.enqueued_at.elapsed().as_micros() as f64 / 1000.0
        );

        let exec_start = Instant::now();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job.func));
        let exec_time_us = exec_start.elapsed().as_micros() as usize;
        shared
            .max_execution_time_us
            .fetch_max(exec_time_us, Ordering::Relaxed);

        match result {
            Ok(()) => {
                shared.jobs_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(
                    "Teardown {}: Job panicked: {:?}",
                    runner,
                    e.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
                );
                shared.jobs_panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
        shared.finish_job();
    }

    /// Run a job the full queue could not take on a thread of its own.
    fn spawn_overflow(&self, job: Job) -> Result<(), PoolError> {
        let shared = Arc::clone(&self.shared);
        let overflow = self.overflow_spawned.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("isobridge-teardown-overflow-{}", overflow))
            .spawn(move || Self::run_job("overflow", job, &shared))?;
        Ok(())
    }

    /// Queue a teardown job
    ///
    /// Never blocks and never runs the job on the calling thread. When the
    /// queue is full the job gets a dedicated thread instead.
    pub fn execute<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shutting_down.load(Ordering::Relaxed) {
            return Err(PoolError::ShuttingDown);
        }

        *self.shared.outstanding.lock() += 1;

        let job = Job {
            func: Box::new(f),
            enqueued_at: Instant::now(),
        };

        match self.sender.try_send(job) {
            Ok(()) => {
                self.jobs_queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                debug!("Teardown queue full, spawning an overflow thread");
                self.jobs_queued.fetch_add(1, Ordering::Relaxed);
                self.spawn_overflow(job).inspect_err(|_| {
                    self.jobs_queued.fetch_sub(1, Ordering::Relaxed);
                    self.shared.finish_job();
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.finish_job();
                Err(PoolError::ShuttingDown)
            }
        }
    }

    /// Block until every accepted job has finished or `timeout` elapses
    ///
    /// Returns `true` if the pool is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self.shared.outstanding.lock();
        while *outstanding > 0 {
            if self
                .shared
                .idle
                .wait_until(&mut outstanding, deadline)
                .timed_out()
            {
                return *outstanding == 0;
            }
        }
        true
    }

    /// Get current statistics
    pub fn stats(&self) -> TeardownStats {
        TeardownStats {
            jobs_queued: self.jobs_queued.load(Ordering::Relaxed),
            jobs_completed: self.shared.jobs_completed.load(Ordering::Relaxed),
            jobs_panicked: self.shared.jobs_panicked.load(Ordering::Relaxed),
            max_execution_time_us: self.shared.max_execution_time_us.load(Ordering::Relaxed)
                as u64,
        }
    }

    /// Stop accepting jobs
    pub fn shutdown(&self) {
        info!("Shutting down teardown pool");
        self.is_shutting_down.store(true, Ordering::Relaxed);
    }

    /// Number of jobs that ran on an overflow thread
    pub fn overflow_count(&self) -> usize {
        self.overflow_spawned.load(Ordering::Relaxed)
    }

    /// Get the number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for TeardownPool {
    fn drop(&mut self) {
        self.shutdown();
        debug!("Teardown pool dropped - workers will exit when they next check the shutdown flag");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(workers: usize, queue_size: usize) -> TeardownConfig {
        TeardownConfig {
            workers,
            queue_size,
        }
    }

    #[test]
    fn test_jobs_run() {
        let pool = TeardownPool::new(&config(2, 16)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.stats().jobs_completed, 10);
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool = TeardownPool::new(&config(1, 4)).unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);

        pool.execute(|| panic!("teardown failed")).unwrap();
        pool.execute(move || flag_clone.store(true, Ordering::SeqCst))
            .unwrap();

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert!(flag.load(Ordering::SeqCst));

        let stats = pool.stats();
        assert_eq!(stats.jobs_queued, 2);
        assert_eq!(stats.jobs_panicked, 1);
    }

    #[test]
    fn test_full_queue_overflows_to_own_thread() {
        let pool = TeardownPool::new(&config(1, 1)).unwrap();
        let gate = Arc::new(Mutex::new(()));
        let lock = gate.lock();

        let gate_clone = Arc::clone(&gate);
        pool.execute(move || {
            let _lock = gate_clone.lock();
        })
        .unwrap();

        // Let the worker pick up the blocking job
        thread::sleep(Duration::from_millis(50));

        pool.execute(|| {}).unwrap();

        let caller = thread::current().id();
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.execute(move || {
            tx.send(thread::current().id()).unwrap();
        })
        .unwrap();

        // The worker is still blocked, so only an overflow thread can run it
        let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(ran_on, caller);
        assert_eq!(pool.overflow_count(), 1);
        assert!(!pool.wait_idle(Duration::from_millis(10)));

        drop(lock);
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(pool.stats().jobs_completed, 3);
        assert_eq!(pool.stats().jobs_queued, 3);
    }

    #[test]
    fn test_shutdown_rejects_jobs() {
        let pool = TeardownPool::new(&config(1, 4)).unwrap();
        pool.shutdown();
        assert!(matches!(pool.execute(|| {}), Err(PoolError::ShuttingDown)));
        assert!(pool.wait_idle(Duration::from_millis(10)));
    }
}
