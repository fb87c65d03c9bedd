//! Job records, handles and entry execution.
//!
//! A job is an entry callback plus its parameter slots, an optional parent
//! link and the counter of unfinished work rooted at it. Records live in the
//! system's job arena and are addressed through generation checked
//! [`JobHandle`]s.

use crate::counter::UnfinishedCount;
use crate::param::Params;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

/// Boxed entry callback stored in a job record.
pub(crate) type Entry = Box<dyn FnOnce(&Params) -> Result<(), String> + Send + 'static>;

const NO_PARENT: u64 = u64::MAX;

/// Reference to a job in the arena.
///
/// Handles are plain indices tagged with the generation of the slot they
/// were issued for; once the slot is reclaimed and reused every old handle
/// is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    index: u32,
    generation: u32,
}

impl JobHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        JobHandle { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn to_bits(self) -> u64 {
        ((self.index as u64) << 32) | self.generation as u64
    }

    fn from_bits(bits: u64) -> Option<Self> {
        if bits == NO_PARENT {
            None
        } else {
            Some(JobHandle {
                index: (bits >> 32) as u32,
                generation: bits as u32,
            })
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Execution status of a job, tracked separately from its completion counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created or queued, entry not yet started.
    Pending,
    /// Entry is running.
    Running,
    /// Entry returned successfully.
    Succeeded,
    /// Entry returned an error or panicked.
    Failed,
}

impl JobStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Succeeded,
            _ => JobStatus::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Succeeded => 2,
            JobStatus::Failed => 3,
        }
    }
}

/// Values an entry callback may return.
///
/// Plain `()` entries always succeed; `Result<(), E>` entries report their
/// error as the job's failure message.
pub trait EntryOutput {
    fn into_outcome(self) -> Result<(), String>;
}

impl EntryOutput for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> EntryOutput for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// Wraps a typed entry closure into the stored entry form.
pub(crate) fn boxed_entry<F, R>(entry: F) -> Entry
where
    F: FnOnce(&Params) -> R + Send + 'static,
    R: EntryOutput,
{
    Box::new(move |params: &Params| entry(params).into_outcome())
}

#[derive(Default)]
pub(crate) struct JobBody {
    pub(crate) entry: Option<Entry>,
    pub(crate) params: Params,
    pub(crate) submitted: bool,
    pub(crate) failure: Option<String>,
}

/// One job record.
///
/// Records are aligned to 256 bytes so neighbouring jobs touched by
/// different workers never share a cache line.
#[repr(align(256))]
pub(crate) struct JobSlot {
    generation: AtomicU32,
    pub(crate) unfinished: UnfinishedCount,
    /// Caller handle reference plus one reference held until completion.
    refs: AtomicU32,
    handle_released: AtomicBool,
    parent: AtomicU64,
    status: AtomicU8,
    pub(crate) body: Mutex<JobBody>,
}

impl JobSlot {
    pub(crate) fn new() -> Self {
        JobSlot {
            generation: AtomicU32::new(0),
            unfinished: UnfinishedCount::new(),
            refs: AtomicU32::new(0),
            handle_released: AtomicBool::new(false),
            parent: AtomicU64::new(NO_PARENT),
            status: AtomicU8::new(JobStatus::Pending.as_u8()),
            body: Mutex::new(JobBody::default()),
        }
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Arms a free slot for a new job.
    pub(crate) fn prepare(&self, entry: Entry, parent: Option<JobHandle>) {
        {
            let mut body = self.body.lock();
            body.entry = Some(entry);
            body.params.clear();
            body.submitted = false;
            body.failure = None;
        }
        self.parent
            .store(parent.map_or(NO_PARENT, JobHandle::to_bits), Ordering::Release);
        self.status
            .store(JobStatus::Pending.as_u8(), Ordering::Release);
        self.handle_released.store(false, Ordering::Release);
        self.refs.store(2, Ordering::Release);
        self.unfinished.reset();
    }

    /// Drops the job's payload and invalidates every outstanding handle.
    pub(crate) fn retire(&self) {
        {
            let mut body = self.body.lock();
            body.entry = None;
            body.params.clear();
            body.failure = None;
        }
        self.parent.store(NO_PARENT, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn parent(&self) -> Option<JobHandle> {
        JobHandle::from_bits(self.parent.load(Ordering::Acquire))
    }

    pub(crate) fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: JobStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    /// Marks the caller's handle as released. Returns false on a second release.
    pub(crate) fn release_handle(&self) -> bool {
        !self.handle_released.swap(true, Ordering::AcqRel)
    }

    /// Drops one reference. Returns true when the slot can be reclaimed.
    pub(crate) fn unref(&self) -> bool {
        let previous = self.refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "job slot reference count underflow");
        previous == 1
    }

    /// Runs the entry callback with the job's parameters.
    ///
    /// Panics inside the entry are caught and reported as a failure so the
    /// completion path always runs.
    pub(crate) fn run_entry(&self) -> Result<(), String> {
        let (entry, params) = {
            let mut body = self.body.lock();
            (body.entry.take(), std::mem::take(&mut body.params))
        };

        self.set_status(JobStatus::Running);

        let outcome = match entry {
            Some(entry) => match panic::catch_unwind(AssertUnwindSafe(|| entry(&params))) {
                Ok(outcome) => outcome,
                Err(payload) => Err(panic_message(payload.as_ref())),
            },
            None => Err("job entry already consumed".to_string()),
        };

        {
            let mut body = self.body.lock();
            body.params = params;
            body.failure = outcome.as_ref().err().cloned();
        }

        self.set_status(if outcome.is_ok() {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        });

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("job panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("job panicked: {msg}")
    } else {
        "job panicked".to_string()
    }
}
