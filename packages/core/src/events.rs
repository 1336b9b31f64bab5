//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus};

/// Events emitted by the job table as jobs move through their lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job entered the table.
    JobSubmitted {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// A job's status changed.
    JobStatusChanged {
        job_id: JobId,
        old_status: JobStatus,
        new_status: JobStatus,
        timestamp: DateTime<Utc>,
    },
    /// A running job reported progress.
    JobProgress {
        job_id: JobId,
        progress: f64,
        timestamp: DateTime<Utc>,
    },
    /// A finished job outlived its retention window and was dropped.
    JobExpired {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobSubmitted { timestamp, .. } => *timestamp,
            JobEvent::JobStatusChanged { timestamp, .. } => *timestamp,
            JobEvent::JobProgress { timestamp, .. } => *timestamp,
            JobEvent::JobExpired { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event.
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::JobSubmitted { job_id, .. } => *job_id,
            JobEvent::JobStatusChanged { job_id, .. } => *job_id,
            JobEvent::JobProgress { job_id, .. } => *job_id,
            JobEvent::JobExpired { job_id, .. } => *job_id,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobSubmitted { job_id, .. } => format!("Job {} submitted", job_id),
            JobEvent::JobStatusChanged {
                job_id,
                old_status,
                new_status,
                ..
            } => format!("Job {} {} -> {}", job_id, old_status, new_status),
            JobEvent::JobProgress {
                job_id, progress, ..
            } => format!("Job {} at {:.1}%", job_id, progress),
            JobEvent::JobExpired { job_id, .. } => format!("Job {} expired", job_id),
        }
    }
}
