//! Index-addressed storage for job records.
//!
//! Slots are never deallocated while the system lives; reclaimed slots are
//! retired (generation bumped) and their index recycled through a free list.

use crate::error::{Error, Result};
use crate::job::{Entry, JobHandle, JobSlot};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct JobArena {
    slots: RwLock<Vec<Arc<JobSlot>>>,
    free: Mutex<Vec<u32>>,
    live: AtomicUsize,
    max_jobs: Option<usize>,
}

impl JobArena {
    pub(crate) fn new(max_jobs: Option<usize>) -> Self {
        JobArena {
            slots: RwLock::new(Vec::new()),
            free: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
            max_jobs,
        }
    }

    /// Takes a free slot (or grows the arena) and arms it with `entry`.
    pub(crate) fn allocate(
        &self,
        entry: Entry,
        parent: Option<JobHandle>,
    ) -> Result<(JobHandle, Arc<JobSlot>)> {
        let previous = self.live.fetch_add(1, Ordering::AcqRel);
        if let Some(capacity) = self.max_jobs {
            if previous >= capacity {
                self.live.fetch_sub(1, Ordering::AcqRel);
                return Err(Error::ArenaExhausted { capacity });
            }
        }

        let reused = self.free.lock().pop();
        let (index, slot) = match reused {
            Some(index) => (index, Arc::clone(&self.slots.read()[index as usize])),
            None => {
                let mut slots = self.slots.write();
                let index = slots.len() as u32;
                let slot = Arc::new(JobSlot::new());
                slots.push(Arc::clone(&slot));
                (index, slot)
            }
        };

        slot.prepare(entry, parent);
        Ok((JobHandle::new(index, slot.generation()), slot))
    }

    /// Resolves a handle, rejecting handles whose slot has been reused.
    pub(crate) fn get(&self, handle: JobHandle) -> Result<Arc<JobSlot>> {
        let slot = self
            .slots
            .read()
            .get(handle.index() as usize)
            .cloned()
            .ok_or(Error::StaleHandle(handle))?;

        if slot.generation() != handle.generation() {
            return Err(Error::StaleHandle(handle));
        }
        Ok(slot)
    }

    /// Drops one reference on the slot at `index`, reclaiming it on the last.
    pub(crate) fn unref(&self, index: u32, slot: &JobSlot) -> bool {
        if !slot.unref() {
            return false;
        }
        slot.retire();
        self.free.lock().push(index);
        self.live.fetch_sub(1, Ordering::AcqRel);
        true
    }

    /// Drops the caller's reference for `handle`.
    ///
    /// Returns true if the slot was reclaimed by this call.
    pub(crate) fn release(&self, handle: JobHandle) -> Result<bool> {
        let slot = self.get(handle)?;
        if !slot.release_handle() {
            return Err(Error::StaleHandle(handle));
        }
        Ok(self.unref(handle.index(), &slot))
    }

    /// Number of jobs currently holding a slot.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of slots ever allocated.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.read().len()
    }
}
