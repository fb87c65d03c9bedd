//! High-level job system interface.
//!
//! The JobSystem is the primary entry point for creating jobs, linking them
//! into hierarchies, submitting them and waiting on their completion.

use crate::error::Result;
use crate::job::{EntryOutput, JobHandle, JobStatus, boxed_entry};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsSnapshot;
use crate::param::{Param, Params};
use crate::queue::DEFAULT_GROW_CHUNK;
use crate::scheduler::Scheduler;
use crate::worker::{MAX_WORKERS, WorkerPool};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Configuration for the job system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSystemConfig {
    /// Number of worker threads, clamped to `1..=MAX_WORKERS`.
    /// Default: available parallelism.
    pub worker_count: usize,
    /// Slots added to the queue each time it fills up. Default: 64.
    pub queue_grow_chunk: usize,
    /// Maximum number of queued jobs; `None` leaves the queue unbounded.
    pub queue_high_watermark: Option<usize>,
    /// Maximum number of live jobs in the arena; `None` for unbounded.
    pub max_jobs: Option<usize>,
    /// Stack size for each worker thread in bytes. Default: 512KB.
    pub stack_size: usize,
    /// Thread name prefix; the worker index is appended.
    pub thread_name: String,
    /// Pin worker `i` to logical core `i`.
    pub pin_workers: bool,
}

impl Default for JobSystemConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            worker_count: workers.min(MAX_WORKERS),
            queue_grow_chunk: DEFAULT_GROW_CHUNK,
            queue_high_watermark: None,
            max_jobs: None,
            stack_size: 512 * 1024,
            thread_name: "job-worker".to_string(),
            pin_workers: false,
        }
    }
}

impl JobSystemConfig {
    /// Default configuration with an explicit worker count.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }
}

/// Handle to a running job system.
///
/// Cloning is cheap; all clones drive the same workers. The pool is stopped
/// and joined by [`shutdown`](JobSystem::shutdown) or when the last clone
/// is dropped.
#[derive(Clone)]
pub struct JobSystem {
    scheduler: Arc<Scheduler>,
    pool: Arc<WorkerPool>,
}

impl JobSystem {
    /// Creates a new job system with the specified number of worker threads.
    ///
    /// # Example
    ///
    /// ```
    /// use jobtree::JobSystem;
    ///
    /// let job_system = JobSystem::new(4).unwrap();
    /// assert_eq!(job_system.num_workers(), 4);
    /// job_system.shutdown().unwrap();
    /// ```
    pub fn new(num_threads: usize) -> Result<Self> {
        Self::new_with_config(JobSystemConfig::with_workers(num_threads))
    }

    /// Creates a new job system with custom configuration.
    pub fn new_with_config(config: JobSystemConfig) -> Result<Self> {
        let scheduler = Arc::new(Scheduler::new(&config));
        let pool = WorkerPool::start(Arc::clone(&scheduler), &config)?;
        debug!(?config, "Job system started");
        Ok(JobSystem {
            scheduler,
            pool: Arc::new(pool),
        })
    }

    /// Creates a job system with one thread per CPU core, up to `MAX_WORKERS`.
    pub fn with_default_threads() -> Result<Self> {
        Self::new_with_config(JobSystemConfig::default())
    }

    /// Creates a job without submitting it.
    ///
    /// With a parent, the parent's unfinished count is raised before this
    /// returns, so the parent cannot complete until this job has.
    ///
    /// # Example
    ///
    /// ```
    /// use jobtree::JobSystem;
    ///
    /// let js = JobSystem::new(2).unwrap();
    /// let root = js.create_job(|_| {}, None).unwrap();
    /// for i in 0..4 {
    ///     let child = js
    ///         .create_job(|params| {
    ///             let _scale = params.float(0).unwrap_or(1.0);
    ///         }, Some(root))
    ///         .unwrap();
    ///     js.add_param(child, i as f32).unwrap();
    ///     js.submit(child).unwrap();
    ///     js.release(child).unwrap();
    /// }
    /// js.submit(root).unwrap();
    /// js.wait(root).unwrap();
    /// assert!(js.is_complete(root).unwrap());
    /// js.release(root).unwrap();
    /// ```
    pub fn create_job<F, R>(&self, entry: F, parent: Option<JobHandle>) -> Result<JobHandle>
    where
        F: FnOnce(&Params) -> R + Send + 'static,
        R: EntryOutput,
    {
        self.scheduler.create(boxed_entry(entry), parent)
    }

    /// Appends a typed parameter. Must happen before the job is submitted.
    pub fn add_param(&self, job: JobHandle, value: impl Into<Param>) -> Result<()> {
        self.scheduler.add_param(job, value.into())
    }

    /// Queues a job and wakes one idle worker. Never blocks.
    pub fn submit(&self, job: JobHandle) -> Result<()> {
        self.scheduler.submit(job)
    }

    /// Creates and submits a job in one step.
    pub fn run<F, R>(&self, entry: F, parent: Option<JobHandle>) -> Result<JobHandle>
    where
        F: FnOnce(&Params) -> R + Send + 'static,
        R: EntryOutput,
    {
        let job = self.create_job(entry, parent)?;
        self.submit(job)?;
        Ok(job)
    }

    /// Blocks until the job and every job created under it have completed.
    ///
    /// The calling thread executes other queued jobs while it waits, so this
    /// is safe to call from inside a job entry.
    pub fn wait(&self, job: JobHandle) -> Result<()> {
        self.scheduler.wait(job)
    }

    /// Gives up the caller's handle. The job's slot is reused once the job
    /// has also completed; the handle is invalid afterwards.
    pub fn release(&self, job: JobHandle) -> Result<()> {
        self.scheduler.release(job)
    }

    /// Returns the execution status of the job's own entry.
    pub fn status(&self, job: JobHandle) -> Result<JobStatus> {
        self.scheduler.status(job)
    }

    /// Returns the failure message if the entry failed or panicked.
    pub fn failure(&self, job: JobHandle) -> Result<Option<String>> {
        self.scheduler.failure(job)
    }

    /// Returns the job's unfinished count (itself plus outstanding children).
    pub fn unfinished_count(&self, job: JobHandle) -> Result<i32> {
        self.scheduler.unfinished_count(job)
    }

    /// Checks if the job and its tracked descendants have completed.
    pub fn is_complete(&self, job: JobHandle) -> Result<bool> {
        Ok(self.unfinished_count(job)? == 0)
    }

    /// Returns the number of worker threads in the system.
    pub fn num_workers(&self) -> usize {
        self.pool.size()
    }

    /// Returns the number of workers currently parked waiting for work.
    pub fn idle_workers(&self) -> usize {
        self.scheduler.parked_workers()
    }

    /// Returns the number of jobs waiting in the shared queue.
    pub fn queue_len(&self) -> usize {
        self.scheduler.queue_len()
    }

    /// Returns the number of job slots currently in use.
    pub fn live_jobs(&self) -> usize {
        self.scheduler.live_jobs()
    }

    /// Returns false once shutdown has started.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Returns a snapshot of the scheduler metrics.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.scheduler.metrics.snapshot()
    }

    /// Shuts down the job system, draining queued jobs and joining workers.
    ///
    /// Further submissions fail with `Error::ShutDown`. Returns
    /// `Error::WorkerPanicked` if any worker thread panicked.
    ///
    /// Jobs cannot be cancelled. If a queued job has a child that is never
    /// submitted, the worker executing it helps out forever and this call
    /// (or dropping the last handle) blocks.
    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub(crate) fn same_system(&self, other: &JobSystem) -> bool {
        Arc::ptr_eq(&self.scheduler, &other.scheduler)
    }
}
