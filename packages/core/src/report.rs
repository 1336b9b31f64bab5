//! Caller-facing projections of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobError, JobId, JobStatus};

/// Returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub job_id: JobId,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    /// 1-based place in the admission queue. Best effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

/// Status and progress of a job, for polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Only set while the job is pending. Best effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
}

impl JobStatusReport {
    pub fn new(job: &Job, queue_position: Option<usize>) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message.clone(),
            queue_position: queue_position.filter(|_| job.status == JobStatus::Pending),
        }
    }
}

/// Outcome of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultReport {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<u64>,
    pub token_count: Option<u64>,
}

impl JobResultReport {
    /// The processor output, or the failure recorded on the job.
    pub fn outcome(&self) -> Result<&serde_json::Value, JobError> {
        match (self.status, &self.result) {
            (JobStatus::Completed, Some(result)) => Ok(result),
            (JobStatus::Failed, _) => Err(JobError::ProcessorFailure(
                self.error_message.clone().unwrap_or_default(),
            )),
            (status, _) => Err(JobError::NotReady {
                job_id: self.job_id,
                status,
            }),
        }
    }
}

impl From<Job> for JobResultReport {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            result: job.result,
            error_message: job.error_message,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            processing_time_ms: job.processing_time_ms,
            token_count: job.token_count,
        }
    }
}
