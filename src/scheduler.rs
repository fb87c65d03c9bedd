//! Scheduling core shared by worker threads and callers.
//!
//! Holds the global queue, the job arena and the idle condition variable.
//! Submission, execution with help-out, completion propagation and waiting
//! all live here; the worker pool and the public [`JobSystem`] only drive it.
//!
//! [`JobSystem`]: crate::JobSystem

use crate::arena::JobArena;
use crate::error::{Error, Result};
use crate::job::{Entry, JobHandle, JobSlot, JobStatus};
use crate::job_system::JobSystemConfig;
#[cfg(feature = "metrics")]
use crate::metrics::Metrics;
use crate::param::Param;
use crate::queue::JobQueue;
use crossbeam::utils::{Backoff, CachePadded};
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::sync::Arc;
use tracing::{error, trace, warn};

thread_local! {
    static WORKER_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Returns the index of the worker thread running the caller, if any.
pub fn current_worker() -> Option<usize> {
    WORKER_INDEX.with(Cell::get)
}

pub(crate) fn set_current_worker(index: Option<usize>) {
    WORKER_INDEX.with(|cell| cell.set(index));
}

struct IdleState {
    running: bool,
    parked: usize,
}

pub(crate) struct Scheduler {
    queue: CachePadded<JobQueue>,
    arena: JobArena,
    idle: CachePadded<Mutex<IdleState>>,
    wake: Condvar,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Metrics,
}

impl Scheduler {
    pub(crate) fn new(config: &JobSystemConfig) -> Self {
        Scheduler {
            queue: CachePadded::new(JobQueue::new(
                config.queue_grow_chunk,
                config.queue_high_watermark,
            )),
            arena: JobArena::new(config.max_jobs),
            idle: CachePadded::new(Mutex::new(IdleState {
                running: true,
                parked: 0,
            })),
            wake: Condvar::new(),
            #[cfg(feature = "metrics")]
            metrics: Metrics::new(),
        }
    }

    /// Allocates a job, counting it against its parent before it can be
    /// seen by any queue.
    pub(crate) fn create(&self, entry: Entry, parent: Option<JobHandle>) -> Result<JobHandle> {
        let parent_slot = parent.map(|p| self.arena.get(p)).transpose()?;
        let (handle, slot) = self.arena.allocate(entry, parent)?;

        if let (Some(parent), Some(parent_slot)) = (parent, parent_slot) {
            if let Err(e) = self.link_child(parent, parent_slot) {
                slot.release_handle();
                self.arena.unref(handle.index(), &slot);
                self.arena.unref(handle.index(), &slot);
                return Err(e);
            }
        }

        #[cfg(feature = "metrics")]
        Metrics::bump(&self.metrics.jobs_created);

        trace!(
            job = %handle,
            parent = ?parent,
            slots = self.arena.capacity(),
            "Created job"
        );
        Ok(handle)
    }

    /// Counts one more child against `parent`.
    ///
    /// `parent_slot` was resolved before the increment, so the slot may have
    /// been reclaimed and handed to another job in between. The generation is
    /// checked again afterwards and a misdirected increment is taken back.
    fn link_child(&self, parent: JobHandle, parent_slot: Arc<JobSlot>) -> Result<()> {
        if !parent_slot.unfinished.try_add_child() {
            if parent_slot.generation() != parent.generation() {
                return Err(Error::StaleHandle(parent));
            }
            return Err(Error::ParentCompleted(parent));
        }

        if parent_slot.generation() != parent.generation() {
            // The unrelated job may have finished meanwhile; if so, taking
            // the increment back completes it.
            self.finish(parent.index(), parent_slot);
            return Err(Error::StaleHandle(parent));
        }
        Ok(())
    }

    pub(crate) fn add_param(&self, handle: JobHandle, value: Param) -> Result<()> {
        let slot = self.arena.get(handle)?;
        let mut body = slot.body.lock();
        if body.submitted {
            return Err(Error::AlreadySubmitted(handle));
        }
        body.params.push(value)
    }

    /// Pushes a job onto the shared queue and wakes one parked worker.
    pub(crate) fn submit(&self, handle: JobHandle) -> Result<()> {
        if !self.is_running() {
            return Err(Error::ShutDown);
        }

        let slot = self.arena.get(handle)?;
        {
            let mut body = slot.body.lock();
            if body.submitted {
                return Err(Error::AlreadySubmitted(handle));
            }
            body.submitted = true;
        }

        match self.queue.push(handle) {
            Ok(_grew) => {
                #[cfg(feature = "metrics")]
                {
                    Metrics::bump(&self.metrics.jobs_submitted);
                    if _grew {
                        Metrics::bump(&self.metrics.queue_growths);
                    }
                }
            }
            Err(e) => {
                slot.body.lock().submitted = false;
                return Err(e);
            }
        }

        trace!(job = %handle, "Submitted job");

        // Signal under the idle lock: a worker checks the queue under the
        // same lock before parking, so the wake-up cannot be missed.
        let idle = self.idle.lock();
        if idle.parked > 0 {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Blocks a worker until a job is available.
    ///
    /// Returns `None` once the system is stopped and the queue is drained.
    pub(crate) fn wait_for_job(&self) -> Option<JobHandle> {
        loop {
            if let Some(job) = self.queue.pop() {
                return Some(job);
            }

            let mut idle = self.idle.lock();
            if !self.queue.is_empty() {
                continue;
            }
            if !idle.running {
                return None;
            }

            #[cfg(feature = "metrics")]
            Metrics::bump(&self.metrics.worker_parks);

            idle.parked += 1;
            self.wake.wait(&mut idle);
            idle.parked -= 1;
        }
    }

    /// Runs a popped job: help out until its children are done, invoke the
    /// entry, then propagate completion.
    pub(crate) fn execute(&self, handle: JobHandle) {
        let slot = match self.arena.get(handle) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(job = %handle, error = %e, "Dropping queued job with stale handle");
                return;
            }
        };

        let backoff = Backoff::new();
        while !slot.unfinished.only_self_pending() {
            self.help_out(&backoff);
        }

        trace!(job = %handle, worker = ?current_worker(), "Executing job");

        let outcome = slot.run_entry();

        #[cfg(feature = "metrics")]
        Metrics::bump(&self.metrics.jobs_executed);

        if let Err(message) = outcome {
            #[cfg(feature = "metrics")]
            Metrics::bump(&self.metrics.jobs_failed);
            error!(job = %handle, error = %message, "Job entry failed");
        }

        self.finish(handle.index(), slot);
    }

    /// Runs one other queued job, or backs off if nothing is runnable.
    ///
    /// Only jobs with no outstanding children are taken. A job that still
    /// waits on children may be an ancestor of the job this thread is
    /// already inside, and nesting it here would never return.
    fn help_out(&self, backoff: &Backoff) {
        let job = self.queue.pop_ready(|candidate| {
            self.arena
                .get(candidate)
                .map_or(true, |slot| slot.unfinished.only_self_pending())
        });

        match job {
            Some(job) => {
                #[cfg(feature = "metrics")]
                Metrics::bump(&self.metrics.help_out_executions);

                backoff.reset();
                self.execute(job);
            }
            None => {
                #[cfg(feature = "metrics")]
                Metrics::bump(&self.metrics.help_out_backoffs);

                backoff.snooze();
            }
        }
    }

    /// Removes the job's own unit of work and walks up the parent chain.
    ///
    /// A node decrements its parent exactly once, when its own counter
    /// reaches zero, so each level is accounted for by its own completion.
    fn finish(&self, index: u32, slot: Arc<JobSlot>) {
        let mut index = index;
        let mut current = slot;

        loop {
            // Read the link first: once the counter hits zero the slot may be
            // reclaimed by a concurrent release.
            let parent = current.parent();
            if !current.unfinished.complete_one() {
                break;
            }

            if self.arena.unref(index, &current) {
                #[cfg(feature = "metrics")]
                Metrics::bump(&self.metrics.slots_reclaimed);
            }

            let Some(parent) = parent else {
                break;
            };

            match self.arena.get(parent) {
                Ok(parent_slot) => {
                    index = parent.index();
                    current = parent_slot;
                }
                Err(_) => {
                    warn!(parent = %parent, "Parent link is stale; stopping completion walk");
                    break;
                }
            }
        }
    }

    /// Helps out until the job and all its tracked descendants completed.
    pub(crate) fn wait(&self, handle: JobHandle) -> Result<()> {
        let slot = self.arena.get(handle)?;
        let backoff = Backoff::new();
        while !slot.unfinished.is_complete() {
            self.help_out(&backoff);
        }
        Ok(())
    }

    pub(crate) fn release(&self, handle: JobHandle) -> Result<()> {
        let _reclaimed = self.arena.release(handle)?;

        #[cfg(feature = "metrics")]
        if _reclaimed {
            Metrics::bump(&self.metrics.slots_reclaimed);
        }
        Ok(())
    }

    pub(crate) fn status(&self, handle: JobHandle) -> Result<JobStatus> {
        Ok(self.arena.get(handle)?.status())
    }

    pub(crate) fn failure(&self, handle: JobHandle) -> Result<Option<String>> {
        Ok(self.arena.get(handle)?.body.lock().failure.clone())
    }

    pub(crate) fn unfinished_count(&self, handle: JobHandle) -> Result<i32> {
        Ok(self.arena.get(handle)?.unfinished.value())
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn live_jobs(&self) -> usize {
        self.arena.live()
    }

    pub(crate) fn parked_workers(&self) -> usize {
        self.idle.lock().parked
    }

    pub(crate) fn is_running(&self) -> bool {
        self.idle.lock().running
    }

    /// Flips the running flag and wakes every parked worker.
    pub(crate) fn stop(&self) {
        let mut idle = self.idle.lock();
        idle.running = false;
        self.wake.notify_all();
    }
}
