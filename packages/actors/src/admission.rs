//! Bounded FIFO admission queue with backpressure.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use job_core::{JobError, JobId};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct AdmissionState {
    items: VecDeque<JobId>,
    closed: bool,
}

/// Holds the identities of pending jobs in submission order.
///
/// Owns no job state; the job table stays the single source of truth.
#[derive(Debug)]
pub struct AdmissionQueue {
    state: Mutex<AdmissionState>,
    notify: Notify,
    capacity: usize,
}

impl AdmissionQueue {
    /// Create a new queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(AdmissionState::default()),
            notify: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a pending job without blocking.
    ///
    /// Fails with `QueueFull` at capacity and `ShuttingDown` once closed.
    pub fn offer(&self, job_id: JobId) -> Result<(), JobError> {
        let mut state = self.lock();
        if state.closed {
            return Err(JobError::ShuttingDown);
        }
        if state.items.len() >= self.capacity {
            return Err(JobError::QueueFull {
                capacity: self.capacity,
            });
        }
        state.items.push_back(job_id);
        drop(state);

        self.notify.notify_one();
        Ok(())
    }

    /// Wait up to `timeout` for the next job.
    ///
    /// Returns `None` on timeout, or as soon as the queue is closed and empty.
    pub async fn take(&self, timeout: Duration) -> Option<JobId> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register before inspecting the state so a close() between the
            // check and the wait still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(job_id) = state.items.pop_front() {
                    return Some(job_id);
                }
                if state.closed {
                    return None;
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// 1-based position of a still-pending job.
    ///
    /// Eventually consistent: a concurrent `take` may shift the answer right
    /// after it is returned. Use for display only.
    pub fn position_of(&self, job_id: JobId) -> Option<usize> {
        self.lock()
            .items
            .iter()
            .position(|id| *id == job_id)
            .map(|idx| idx + 1)
    }

    /// Remove a job (for cancellation), freeing its slot.
    pub fn remove(&self, job_id: JobId) -> bool {
        let mut state = self.lock();
        match state.items.iter().position(|id| *id == job_id) {
            Some(idx) => state.items.remove(idx).is_some(),
            None => false,
        }
    }

    /// Stop admitting new jobs and wake any waiting consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Drop every queued job, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let count = state.items.len();
        state.items.clear();
        count
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = AdmissionQueue::new(10);
        let ids: Vec<JobId> = (0..3).map(|_| JobId::new()).collect();
        for id in &ids {
            queue.offer(*id).unwrap();
        }

        for id in &ids {
            assert_eq!(queue.take(Duration::from_millis(10)).await, Some(*id));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity() {
        let queue = AdmissionQueue::new(2);
        assert!(queue.offer(JobId::new()).is_ok());
        assert!(queue.offer(JobId::new()).is_ok());
        assert_eq!(
            queue.offer(JobId::new()),
            Err(JobError::QueueFull { capacity: 2 })
        );
        assert!(queue.is_full());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_position_and_remove() {
        let queue = AdmissionQueue::new(10);
        let a = JobId::new();
        let b = JobId::new();
        let c = JobId::new();
        for id in [a, b, c] {
            queue.offer(id).unwrap();
        }

        assert_eq!(queue.position_of(c), Some(3));
        assert!(queue.remove(b));
        assert!(!queue.remove(b));
        assert_eq!(queue.position_of(c), Some(2));
        assert_eq!(queue.position_of(b), None);
    }

    #[tokio::test]
    async fn test_take_times_out_when_empty() {
        let queue = AdmissionQueue::new(1);
        assert_eq!(queue.take(Duration::from_millis(20)).await, None);
    }

    #[tokio::test]
    async fn test_take_wakes_on_offer() {
        let queue = Arc::new(AdmissionQueue::new(1));
        let id = JobId::new();

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.offer(id).unwrap();

        assert_eq!(consumer.await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_and_releases_consumer() {
        let queue = Arc::new(AdmissionQueue::new(1));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        assert_eq!(consumer.await.unwrap(), None);
        assert_eq!(queue.offer(JobId::new()), Err(JobError::ShuttingDown));
        assert!(queue.is_closed());
    }
}
