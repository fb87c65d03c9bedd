//! Worker thread implementation.
//!
//! Worker threads park on the scheduler's idle condition variable until a
//! job is submitted, then execute it (helping out on other jobs while it
//! waits for its children) and go back for more.

use crate::error::{Error, Result};
use crate::job_system::JobSystemConfig;
use crate::scheduler::{Scheduler, current_worker, set_current_worker};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Upper bound on the number of worker threads in one pool.
pub const MAX_WORKERS: usize = 8;

/// Clamps a requested worker count into `1..=MAX_WORKERS`.
pub fn clamp_worker_count(requested: usize) -> usize {
    if requested > MAX_WORKERS {
        warn!(requested, max = MAX_WORKERS, "Clamping worker count");
        MAX_WORKERS
    } else if requested == 0 {
        warn!("Worker count of zero requested; starting one worker");
        1
    } else {
        requested
    }
}

/// A worker thread that executes jobs from the shared queue.
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns a named worker thread, optionally pinned to `core`.
    fn spawn(
        id: usize,
        scheduler: Arc<Scheduler>,
        config: &JobSystemConfig,
        core: Option<core_affinity::CoreId>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name, id))
            .stack_size(config.stack_size)
            .spawn(move || {
                if let Some(core) = core {
                    if !core_affinity::set_for_current(core) {
                        warn!(worker = id, core = core.id, "Failed to pin worker");
                    }
                }

                Worker::run_loop(id, &scheduler);
            })?;

        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    /// Main execution loop for the worker thread.
    fn run_loop(id: usize, scheduler: &Scheduler) {
        set_current_worker(Some(id));
        debug!(worker = id, "Worker started");

        while let Some(job) = scheduler.wait_for_job() {
            scheduler.execute(job);
        }

        debug!(worker = id, "Worker stopped");
        set_current_worker(None);
    }

    /// Returns the worker's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    fn is_current_thread(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id())
    }

    /// Waits for the worker thread to finish.
    pub fn join(mut self) -> thread::Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.join()
        } else {
            Ok(())
        }
    }
}

/// The fixed set of worker threads driving one scheduler.
pub(crate) struct WorkerPool {
    workers: Mutex<Vec<Worker>>,
    scheduler: Arc<Scheduler>,
    size: usize,
}

impl WorkerPool {
    /// Starts `config.worker_count` workers (clamped).
    ///
    /// If any thread fails to spawn, the workers started so far are stopped
    /// and joined before the error is returned.
    pub(crate) fn start(scheduler: Arc<Scheduler>, config: &JobSystemConfig) -> Result<Self> {
        Self::start_with(scheduler, config, Worker::spawn)
    }

    fn start_with<S>(
        scheduler: Arc<Scheduler>,
        config: &JobSystemConfig,
        mut spawn: S,
    ) -> Result<Self>
    where
        S: FnMut(
            usize,
            Arc<Scheduler>,
            &JobSystemConfig,
            Option<core_affinity::CoreId>,
        ) -> std::io::Result<Worker>,
    {
        let count = clamp_worker_count(config.worker_count);
        let core_ids = if config.pin_workers {
            core_affinity::get_core_ids()
        } else {
            None
        };

        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let core = core_ids.as_ref().and_then(|ids| ids.get(id).copied());
            match spawn(id, Arc::clone(&scheduler), config, core) {
                Ok(worker) => workers.push(worker),
                Err(source) => {
                    error!(worker = id, error = %source, "Failed to spawn worker; rolling back");
                    scheduler.stop();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(Error::WorkerSpawnFailure { index: id, source });
                }
            }
        }

        debug!(workers = count, pinned = core_ids.is_some(), "Worker pool started");

        Ok(WorkerPool {
            workers: Mutex::new(workers),
            scheduler,
            size: count,
        })
    }

    /// Returns the number of worker threads the pool started with.
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Stops the pool and waits for all threads to finish.
    ///
    /// Jobs already queued are drained before the workers exit. There is no
    /// cancellation: a queued parent whose child is never submitted keeps its
    /// worker helping out forever, and this call never returns.
    pub(crate) fn shutdown(&self) -> Result<()> {
        if current_worker().is_some() {
            return Err(Error::ShutdownFromWorker);
        }

        self.scheduler.stop();

        let workers = std::mem::take(&mut *self.workers.lock());
        let mut failed_count = 0;
        for worker in workers {
            let worker_id = worker.id();
            if worker.join().is_err() {
                failed_count += 1;
                error!(worker = worker_id, "Worker panicked during execution");
            }
        }

        debug!("Worker pool shut down");

        if failed_count > 0 {
            Err(Error::WorkerPanicked {
                count: failed_count,
            })
        } else {
            Ok(())
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.scheduler.stop();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            // The last handle can be dropped by a job running on a worker;
            // that thread exits on its own once the queue drains.
            if worker.is_current_thread() {
                continue;
            }
            let _ = worker.join();
        }
    }
}
