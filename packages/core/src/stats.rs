//! Aggregate statistics for the job service.

use serde::{Deserialize, Serialize};

use crate::JobStatus;

/// Number of tracked jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    /// Count one job with the given status.
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Expired => {}
        }
    }

    /// Jobs not yet finished (pending + running).
    pub fn active(&self) -> u64 {
        self.pending + self.running
    }

    /// Jobs the worker has finished.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }

    /// Total tracked jobs.
    pub fn total(&self) -> u64 {
        self.active() + self.processed() + self.cancelled
    }
}

/// Snapshot of the service exposed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Jobs currently held by the table.
    pub total_jobs: u64,
    /// Jobs waiting in the admission queue.
    pub queue_size: usize,
    /// Admission queue capacity.
    pub max_queue_size: usize,
    /// Per-status breakdown.
    #[serde(flatten)]
    pub counts: StatusCounts,
    /// Whether the worker loop is alive.
    pub worker_running: bool,
    /// Retention window for finished jobs.
    pub job_ttl_secs: u64,
    /// Hard ceiling on concurrent processor invocations.
    pub max_concurrent_jobs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_status() {
        let mut counts = StatusCounts::default();
        for status in [
            JobStatus::Pending,
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
            JobStatus::Expired,
        ] {
            counts.record(status);
        }

        assert_eq!(counts.active(), 3);
        assert_eq!(counts.processed(), 2);
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.success_rate(), Some(50.0));
        assert_eq!(StatusCounts::default().success_rate(), None);
    }
}
