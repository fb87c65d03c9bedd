//! Completion counter tracking a job and its outstanding children.

use std::sync::atomic::{AtomicI32, Ordering};

/// Atomic count of unfinished work rooted at one job.
///
/// Starts at 1 for the job itself. Each direct child adds one while it is
/// outstanding. The job is complete exactly when the value reaches zero.
#[derive(Debug)]
pub struct UnfinishedCount {
    value: AtomicI32,
}

impl UnfinishedCount {
    pub fn new() -> Self {
        UnfinishedCount {
            value: AtomicI32::new(1),
        }
    }

    /// Re-arms the counter for a fresh job.
    pub(crate) fn reset(&self) {
        self.value.store(1, Ordering::Release);
    }

    /// Registers one more outstanding child.
    ///
    /// Fails if the counter already reached zero: a completed job cannot
    /// take new children.
    pub fn try_add_child(&self) -> bool {
        let mut current = self.value.load(Ordering::Acquire);
        loop {
            if current <= 0 {
                return false;
            }
            match self.value.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Removes one unit of outstanding work.
    ///
    /// Returns true if this call brought the counter to zero.
    pub fn complete_one(&self) -> bool {
        // AcqRel: the work done before this decrement is visible to whoever
        // observes zero, and the thread reaching zero sees all sibling work.
        let previous = self.value.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "unfinished count went negative");
        previous == 1
    }

    /// Returns the current value.
    pub fn value(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    /// Returns true if there are no children outstanding.
    pub fn only_self_pending(&self) -> bool {
        self.value() <= 1
    }

    /// Checks if the counter has reached zero.
    pub fn is_complete(&self) -> bool {
        self.value() == 0
    }
}

impl Default for UnfinishedCount {
    fn default() -> Self {
        Self::new()
    }
}
