//! Error taxonomy for the job subsystem.

use crate::{JobId, JobStatus};

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Recoverable outcomes reported back to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Job not found or has expired: {0}")]
    NotFound(JobId),

    #[error("Job {job_id} is {status}")]
    Conflict { job_id: JobId, status: JobStatus },

    #[error("Job {job_id} has no result yet (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    #[error("Processor failed: {0}")]
    ProcessorFailure(String),

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl JobError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::QueueFull { .. } | JobError::NotReady { .. })
    }
}
