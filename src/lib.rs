//! # jobtree - Hierarchical Job Scheduler
//!
//! A fixed pool of worker threads executes short-lived jobs pulled from a
//! shared queue. Jobs can be linked into parent/child hierarchies: a parent
//! completes only after every job created under it has completed.
//!
//! ## Architecture
//!
//! - **Jobs**: an entry callback, up to eight typed parameters, an optional
//!   parent link and an atomic count of unfinished work
//! - **Job Queue**: a single lock-protected LIFO stack shared by all threads
//! - **Workers**: OS threads that park when the queue is empty and are woken
//!   on submission
//! - **Help-out**: a thread waiting on a job runs other ready jobs instead of
//!   idling, so waiting inside a job never starves the pool
//!
//! ## Example
//!
//! ```
//! use jobtree::JobSystem;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let job_system = JobSystem::new(4).unwrap();
//! let sum = Arc::new(AtomicUsize::new(0));
//!
//! let root = job_system.create_job(|_| {}, None).unwrap();
//! for i in 0..10 {
//!     let sum = sum.clone();
//!     let child = job_system
//!         .create_job(move |_| { sum.fetch_add(i, Ordering::SeqCst); }, Some(root))
//!         .unwrap();
//!     job_system.submit(child).unwrap();
//!     job_system.release(child).unwrap();
//! }
//! job_system.submit(root).unwrap();
//! job_system.wait(root).unwrap();
//!
//! assert_eq!(sum.load(Ordering::SeqCst), 45);
//! job_system.shutdown().unwrap();
//! ```

mod arena;
pub mod counter;
pub mod error;
pub mod global;
pub mod job;
pub mod job_system;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod param;
pub mod queue;
mod scheduler;
pub mod worker;

pub use counter::UnfinishedCount;
pub use error::{Error, Result};
pub use job::{EntryOutput, JobHandle, JobStatus};
pub use job_system::{JobSystem, JobSystemConfig};
#[cfg(feature = "metrics")]
pub use metrics::{Metrics, MetricsSnapshot};
pub use param::{BufferRef, MAX_JOB_PARAMS, Param, ParamType, Params};
pub use scheduler::current_worker;
pub use worker::MAX_WORKERS;
