//! Error types returned by the job system.

use crate::job::JobHandle;
use thiserror::Error;

/// Errors reported synchronously by job system operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("job parameter list is full (capacity {capacity})")]
    TooManyParameters { capacity: usize },

    #[error("job system is not initialized")]
    NotInitialized,

    #[error("job system is already initialized")]
    AlreadyInitialized,

    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawnFailure {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("stale or unknown job handle {0}")]
    StaleHandle(JobHandle),

    #[error("job {0} has already been submitted")]
    AlreadySubmitted(JobHandle),

    #[error("parent job {0} has already completed")]
    ParentCompleted(JobHandle),

    #[error("job queue is full (limit {limit})")]
    QueueFull { limit: usize },

    #[error("job arena is exhausted (capacity {capacity})")]
    ArenaExhausted { capacity: usize },

    #[error("job system has been shut down")]
    ShutDown,

    #[error("shutdown cannot be called from a worker thread")]
    ShutdownFromWorker,

    #[error("{count} worker thread(s) panicked")]
    WorkerPanicked { count: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
