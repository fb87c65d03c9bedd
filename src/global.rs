//! Process-wide job system instance.
//!
//! Engine code and script bindings reach the scheduler through these free
//! functions instead of passing a [`JobSystem`] around. Exactly one instance
//! may be installed at a time.

use crate::error::{Error, Result};
use crate::job::{EntryOutput, JobHandle, JobStatus};
use crate::job_system::{JobSystem, JobSystemConfig};
use crate::param::{Param, Params};
use parking_lot::RwLock;
use tracing::debug;

lazy_static::lazy_static! {
    static ref INSTANCE: RwLock<Option<JobSystem>> = RwLock::new(None);
}

/// Starts the global pool with `worker_count` workers.
pub fn init(worker_count: usize) -> Result<JobSystem> {
    init_with_config(JobSystemConfig::with_workers(worker_count))
}

/// Starts the global pool with a custom configuration.
///
/// Fails with `AlreadyInitialized` while another global pool is installed;
/// that pool keeps running untouched.
pub fn init_with_config(config: JobSystemConfig) -> Result<JobSystem> {
    let mut instance = INSTANCE.write();
    if instance.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    let system = JobSystem::new_with_config(config)?;
    *instance = Some(system.clone());
    debug!("Global job system installed");
    Ok(system)
}

/// Returns a handle to the global job system.
pub fn instance() -> Result<JobSystem> {
    INSTANCE.read().clone().ok_or(Error::NotInitialized)
}

/// Uninstalls `handle` if it is the global instance, then stops and joins
/// its workers.
pub fn shutdown(handle: JobSystem) -> Result<()> {
    {
        let mut instance = INSTANCE.write();
        if instance.as_ref().is_some_and(|current| current.same_system(&handle)) {
            *instance = None;
            debug!("Global job system uninstalled");
        }
    }
    handle.shutdown()
}

/// Creates a job on the global system.
pub fn create_job<F, R>(entry: F, parent: Option<JobHandle>) -> Result<JobHandle>
where
    F: FnOnce(&Params) -> R + Send + 'static,
    R: EntryOutput,
{
    instance()?.create_job(entry, parent)
}

pub fn add_param(job: JobHandle, value: impl Into<Param>) -> Result<()> {
    instance()?.add_param(job, value)
}

pub fn submit(job: JobHandle) -> Result<()> {
    instance()?.submit(job)
}

/// Blocks until `job` completes, helping out with queued work meanwhile.
pub fn wait(job: JobHandle) -> Result<()> {
    // Clone the handle out so the lock is not held while waiting
    let system = instance()?;
    system.wait(job)
}

pub fn release(job: JobHandle) -> Result<()> {
    instance()?.release(job)
}

pub fn status(job: JobHandle) -> Result<JobStatus> {
    instance()?.status(job)
}
