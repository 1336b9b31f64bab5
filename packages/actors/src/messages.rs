//! Message types for actor communication.

use job_core::{Job, JobError, JobId, StatusCounts};
use ractor::RpcReplyPort;

/// An atomic state transition applied to a job inside the table actor.
pub type JobMutation = Box<dyn FnOnce(&mut Job) -> Result<(), JobError> + Send>;

/// Messages for the JobTableActor.
pub enum TableMessage {
    /// Add a new pending job.
    Insert {
        job: Box<Job>,
        reply: RpcReplyPort<Result<(), JobError>>,
    },

    /// Get a snapshot of a job. Expired jobs are evicted and reported missing.
    Get {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Remove a job unconditionally.
    Remove {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Apply a state transition under exclusive access.
    Mutate {
        job_id: JobId,
        apply: JobMutation,
        reply: RpcReplyPort<Result<Job, JobError>>,
    },

    /// Progress reported by the processor. Dropped unless the job is running.
    Progress { job_id: JobId, percent: f64 },

    /// Count tracked jobs per status.
    Counts { reply: RpcReplyPort<StatusCounts> },

    /// Remove terminal jobs older than the TTL.
    Sweep { reply: RpcReplyPort<usize> },

    /// Remove every job regardless of status.
    Purge { reply: RpcReplyPort<usize> },

    /// Periodic tick for housekeeping.
    Tick,
}

impl std::fmt::Debug for TableMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableMessage::Insert { job, .. } => write!(f, "Insert({})", job.id),
            TableMessage::Get { job_id, .. } => write!(f, "Get({})", job_id),
            TableMessage::Remove { job_id, .. } => write!(f, "Remove({})", job_id),
            TableMessage::Mutate { job_id, .. } => write!(f, "Mutate({})", job_id),
            TableMessage::Progress { job_id, percent } => {
                write!(f, "Progress({}, {})", job_id, percent)
            }
            TableMessage::Counts { .. } => f.write_str("Counts"),
            TableMessage::Sweep { .. } => f.write_str("Sweep"),
            TableMessage::Purge { .. } => f.write_str("Purge"),
            TableMessage::Tick => f.write_str("Tick"),
        }
    }
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Wait for the next queued job and run it.
    Poll,
}
