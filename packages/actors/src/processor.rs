//! The processor capability and its progress sink.

use job_core::{JobId, JobRequest};
use tokio::sync::mpsc;

/// Result type for processors.
pub type ProcessorResult = Result<serde_json::Value, ProcessorError>;

/// Failure raised by a processor. The message is recorded on the job.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ProcessorError {
    message: String,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ProcessorError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProcessorError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// The long-running computation executed for each job.
///
/// `execute` is blocking and may run for minutes. The worker calls it on a
/// dedicated blocking thread and never runs two invocations at once.
pub trait Processor: Send + Sync + 'static {
    /// Process a request, reporting progress through `progress`.
    fn execute(&self, request: &JobRequest, progress: &ProgressSink) -> ProcessorResult;
}

/// A simple function-based processor.
pub struct FnProcessor<F>
where
    F: Fn(&JobRequest, &ProgressSink) -> ProcessorResult + Send + Sync + 'static,
{
    processor: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&JobRequest, &ProgressSink) -> ProcessorResult + Send + Sync + 'static,
{
    /// Create a new function-based processor.
    pub fn new(processor: F) -> Self {
        Self { processor }
    }
}

impl<F> Processor for FnProcessor<F>
where
    F: Fn(&JobRequest, &ProgressSink) -> ProcessorResult + Send + Sync + 'static,
{
    fn execute(&self, request: &JobRequest, progress: &ProgressSink) -> ProcessorResult {
        (self.processor)(request, progress)
    }
}

/// Progress reporter handed to the processor.
///
/// Callable from any thread. Updates go into a bounded channel that is
/// drained onto the job table's mailbox; when the channel is full the
/// update is dropped rather than stalling the processor.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    job_id: JobId,
    tx: mpsc::Sender<f64>,
}

impl ProgressSink {
    /// Create a sink and the receiving end of its channel.
    pub fn channel(job_id: JobId, capacity: usize) -> (Self, mpsc::Receiver<f64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { job_id, tx }, rx)
    }

    /// The job this sink reports for.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Report progress as a percentage in `[0, 100]`.
    pub fn report(&self, percent: f64) {
        if let Err(e) = self.tx.try_send(percent) {
            tracing::debug!("Dropped progress update for job {}: {}", self.job_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_processor_reports_progress() {
        let processor = FnProcessor::new(|request: &JobRequest, progress: &ProgressSink| {
            progress.report(50.0);
            Ok(serde_json::json!({ "chars": request.text.len() }))
        });
        let (sink, mut rx) = ProgressSink::channel(JobId::new(), 4);

        let output = processor.execute(&JobRequest::new("abc"), &sink).unwrap();
        assert_eq!(output["chars"], 3);
        assert_eq!(rx.try_recv().ok(), Some(50.0));
    }

    #[test]
    fn test_full_sink_drops_updates() {
        let (sink, mut rx) = ProgressSink::channel(JobId::new(), 1);
        sink.report(10.0);
        sink.report(20.0);
        assert_eq!(rx.try_recv().ok(), Some(10.0));
        assert!(rx.try_recv().is_err());
    }
}
