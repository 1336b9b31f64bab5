//! Job domain types and the job lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::JobError;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Legal edges:
///
/// ```text
/// Pending -> Running -> Completed | Failed
/// Pending -> Cancelled
/// Completed | Failed | Cancelled -> Expired
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in the admission queue.
    #[default]
    Pending,
    /// Job is being executed by the worker.
    Running,
    /// Job completed successfully.
    Completed,
    /// The processor reported an error.
    Failed,
    /// Job was cancelled before it started.
    Cancelled,
    /// Retention window elapsed. Only ever seen inside the table.
    Expired,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired
        )
    }

    /// Check if the job produced an outcome that `result` can report.
    pub fn has_outcome(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Completed, JobStatus::Expired)
                | (JobStatus::Failed, JobStatus::Expired)
                | (JobStatus::Cancelled, JobStatus::Expired)
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_model() -> String {
    "small".to_string()
}

fn default_pipeline() -> Vec<String> {
    ["entity", "quote", "supersense", "event", "coref"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A text analysis request handed to the processor untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Text to analyze.
    pub text: String,
    /// Identifier for the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,
    /// Model size, e.g. "small" or "big".
    #[serde(default = "default_model")]
    pub model: String,
    /// Pipeline components to run.
    #[serde(default = "default_pipeline")]
    pub pipeline: Vec<String>,
}

impl JobRequest {
    /// Create a request with the default model and pipeline.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            book_id: None,
            model: default_model(),
            pipeline: default_pipeline(),
        }
    }

    /// Set the document identifier.
    pub fn with_book_id(mut self, book_id: impl Into<String>) -> Self {
        self.book_id = Some(book_id.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the pipeline components.
    pub fn with_pipeline(mut self, pipeline: Vec<String>) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// A submitted analysis request and its tracked lifecycle.
///
/// Mutated only through the transition methods below, which reject any
/// move that is not an edge of the [`JobStatus`] state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// The request to process.
    pub request: JobRequest,
    /// Current status.
    pub status: JobStatus,
    /// Progress percentage in `[0, 100]`.
    pub progress: f64,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the worker picked the job up.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Processor output, only when completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure detail, only when failed or cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall time between start and completion.
    pub processing_time_ms: Option<u64>,
    /// Number of tokens in the result payload.
    pub token_count: Option<u64>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: JobId::new(),
            request,
            status: JobStatus::Pending,
            progress: 0.0,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            processing_time_ms: None,
            token_count: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::Conflict {
                job_id: self.id,
                status: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Pending -> Running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Record a progress update.
    ///
    /// Returns `true` if the stored value changed. Updates are ignored unless
    /// the job is running, and never move progress backwards.
    pub fn record_progress(&mut self, percent: f64) -> bool {
        if self.status != JobStatus::Running || percent.is_nan() {
            return false;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// Running -> Completed, computing the completion metrics.
    pub fn complete(
        &mut self,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(now);
        self.progress = 100.0;
        self.processing_time_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as u64);
        self.token_count = result
            .get("tokens")
            .and_then(serde_json::Value::as_array)
            .map(|tokens| tokens.len() as u64);
        self.result = Some(result);
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(now);
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Pending -> Cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Cancelled)?;
        self.completed_at = Some(now);
        self.error_message = Some("Job was cancelled before it started".to_string());
        Ok(())
    }

    /// Terminal -> Expired.
    pub fn expire(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Expired)
    }

    /// Check whether this job has outlived the retention window.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        if !self.status.can_transition_to(JobStatus::Expired) {
            return false;
        }
        match self.completed_at {
            Some(completed_at) => now - completed_at > ttl,
            None => true,
        }
    }
}
