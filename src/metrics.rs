use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Optional performance metrics for the job system.
#[derive(Debug)]
pub struct Metrics {
    /// Jobs allocated through `create_job`.
    pub jobs_created: AtomicU64,
    /// Jobs pushed onto the shared queue.
    pub jobs_submitted: AtomicU64,
    /// Entries invoked (successful or not).
    pub jobs_executed: AtomicU64,
    /// Entries that returned an error or panicked.
    pub jobs_failed: AtomicU64,
    /// Jobs executed by a thread that was waiting on another job.
    pub help_out_executions: AtomicU64,
    /// Help-out attempts that found nothing runnable and backed off.
    pub help_out_backoffs: AtomicU64,
    /// Times a worker parked on the idle condition variable.
    pub worker_parks: AtomicU64,
    /// Times the queue backing storage grew.
    pub queue_growths: AtomicU64,
    /// Job slots returned to the arena free list.
    pub slots_reclaimed: AtomicU64,
    /// Time when metrics collection started.
    pub start_time: Instant,
}

impl Metrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self {
            jobs_created: AtomicU64::new(0),
            jobs_submitted: AtomicU64::new(0),
            jobs_executed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            help_out_executions: AtomicU64::new(0),
            help_out_backoffs: AtomicU64::new(0),
            worker_parks: AtomicU64::new(0),
            queue_growths: AtomicU64::new(0),
            slots_reclaimed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of current metrics values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_created: self.jobs_created.load(Ordering::Relaxed),
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_executed: self.jobs_executed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            help_out_executions: self.help_out_executions.load(Ordering::Relaxed),
            help_out_backoffs: self.help_out_backoffs.load(Ordering::Relaxed),
            worker_parks: self.worker_parks.load(Ordering::Relaxed),
            queue_growths: self.queue_growths.load(Ordering::Relaxed),
            slots_reclaimed: self.slots_reclaimed.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_created: u64,
    pub jobs_submitted: u64,
    pub jobs_executed: u64,
    pub jobs_failed: u64,
    pub help_out_executions: u64,
    pub help_out_backoffs: u64,
    pub worker_parks: u64,
    pub queue_growths: u64,
    pub slots_reclaimed: u64,
    pub elapsed_seconds: f64,
}

impl MetricsSnapshot {
    /// Calculates jobs per second throughput.
    pub fn jobs_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.jobs_executed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Approximates queue depth (submitted - executed).
    pub fn queue_depth(&self) -> i64 {
        self.jobs_submitted as i64 - self.jobs_executed as i64
    }
}
