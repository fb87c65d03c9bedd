//! Shared LIFO queue of pending job handles.

use crate::error::{Error, Result};
use crate::job::JobHandle;
use parking_lot::Mutex;

/// Default number of slots added each time the queue fills up.
pub const DEFAULT_GROW_CHUNK: usize = 64;

/// Mutex-protected stack of submitted jobs.
///
/// Pushing and popping happen at the same end so children spawned by the
/// running job are picked up before older siblings.
pub struct JobQueue {
    jobs: Mutex<Vec<JobHandle>>,
    grow_chunk: usize,
    high_watermark: Option<usize>,
}

impl JobQueue {
    pub fn new(grow_chunk: usize, high_watermark: Option<usize>) -> Self {
        JobQueue {
            jobs: Mutex::new(Vec::new()),
            grow_chunk: grow_chunk.max(1),
            high_watermark,
        }
    }

    /// Pushes a handle.
    ///
    /// Returns `Ok(true)` if the backing storage had to grow. Fails only
    /// when a high watermark is configured and reached.
    pub fn push(&self, job: JobHandle) -> Result<bool> {
        let mut jobs = self.jobs.lock();
        if let Some(limit) = self.high_watermark {
            if jobs.len() >= limit {
                return Err(Error::QueueFull { limit });
            }
        }

        let grew = jobs.len() == jobs.capacity();
        if grew {
            jobs.reserve_exact(self.grow_chunk);
        }
        jobs.push(job);
        Ok(grew)
    }

    /// Pops the most recently pushed handle.
    pub fn pop(&self) -> Option<JobHandle> {
        self.jobs.lock().pop()
    }

    /// Pops the most recently pushed handle accepted by `ready`.
    ///
    /// Handles above it stay in place, in order.
    pub fn pop_ready(&self, mut ready: impl FnMut(JobHandle) -> bool) -> Option<JobHandle> {
        let mut jobs = self.jobs.lock();
        let position = jobs.iter().rposition(|&job| ready(job))?;
        Some(jobs.remove(position))
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.jobs.lock().capacity()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        JobQueue::new(DEFAULT_GROW_CHUNK, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn handle(i: u32) -> JobHandle {
        JobHandle::new(i, 0)
    }

    #[test]
    fn test_lifo_order() {
        let queue = JobQueue::default();
        queue.push(handle(1)).unwrap();
        queue.push(handle(2)).unwrap();
        queue.push(handle(3)).unwrap();

        assert_eq!(queue.pop(), Some(handle(3)));
        assert_eq!(queue.pop(), Some(handle(2)));
        assert_eq!(queue.pop(), Some(handle(1)));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_ready_skips_unready_top() {
        let queue = JobQueue::default();
        for i in 0..4 {
            queue.push(handle(i)).unwrap();
        }

        assert_eq!(queue.pop_ready(|h| h.index() % 2 == 0), Some(handle(2)));
        assert_eq!(queue.pop_ready(|h| h.index() > 10), None);
        assert_eq!(queue.pop(), Some(handle(3)));
        assert_eq!(queue.pop(), Some(handle(1)));
        assert_eq!(queue.pop(), Some(handle(0)));
    }

    #[test]
    fn test_grows_by_fixed_chunk() {
        let queue = JobQueue::new(64, None);
        assert!(queue.push(handle(0)).unwrap());
        let first = queue.capacity();
        assert!(first >= 64);

        for i in 1..first as u32 {
            assert!(!queue.push(handle(i)).unwrap());
        }
        assert!(queue.push(handle(first as u32)).unwrap());
        assert!(queue.capacity() >= first + 64);
        assert_eq!(queue.len(), first + 1);
    }

    #[test]
    fn test_high_watermark() {
        let queue = JobQueue::new(4, Some(2));
        queue.push(handle(0)).unwrap();
        queue.push(handle(1)).unwrap();
        assert!(matches!(
            queue.push(handle(2)),
            Err(Error::QueueFull { limit: 2 })
        ));
        assert_eq!(queue.len(), 2);

        queue.pop();
        assert!(queue.push(handle(2)).is_ok());
    }

    #[test]
    fn test_concurrent_push_pop_loses_nothing() {
        let queue = Arc::new(JobQueue::default());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        queue.push(handle(p * 1000 + i)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut seen = Vec::new();
        while let Some(h) = queue.pop() {
            seen.push(h.index());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..4000).collect::<Vec<_>>());
    }
}
