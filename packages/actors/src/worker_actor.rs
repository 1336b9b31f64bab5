//! Worker actor: the single execution lane for the processor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use job_core::{Job, JobError, JobId};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::admission::AdmissionQueue;
use crate::messages::WorkerMessage;
use crate::processor::{Processor, ProgressSink};
use crate::table_actor::JobTable;

/// State for the worker actor.
pub struct WorkerActorState {
    /// Source of pending job ids.
    pub queue: Arc<AdmissionQueue>,
    /// Job table handle.
    pub table: JobTable,
    /// The computation run for each job.
    pub processor: Arc<dyn Processor>,
    /// Bounded wait for the next job.
    pub poll_timeout: Duration,
    /// Capacity of the progress channel.
    pub progress_buffer: usize,
    /// Shared liveness flag, read by stats.
    running: Arc<AtomicBool>,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub queue: Arc<AdmissionQueue>,
    pub table: JobTable,
    pub processor: Arc<dyn Processor>,
    pub poll_timeout: Duration,
    pub progress_buffer: usize,
    pub running: Arc<AtomicBool>,
}

/// Worker actor that drains the admission queue one job at a time.
///
/// The loop is a `Poll` message the actor keeps re-sending to itself, so a
/// stop signal is observed between jobs, or within one poll timeout when idle.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker (poll timeout {:?})", args.poll_timeout);
        args.running.store(true, Ordering::SeqCst);

        Ok(WorkerActorState {
            queue: args.queue,
            table: args.table,
            processor: args.processor,
            poll_timeout: args.poll_timeout,
            progress_buffer: args.progress_buffer,
            running: args.running,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        myself.send_message(WorkerMessage::Poll)?;
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.running.store(false, Ordering::SeqCst);
        tracing::info!("Worker stopped");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if let Some(job_id) = state.queue.take(state.poll_timeout).await {
                    run_job(state, job_id).await;
                }

                // Keep the loop going; a pending stop signal wins over this.
                if myself.send_message(WorkerMessage::Poll).is_err() {
                    tracing::debug!("Worker mailbox closed, leaving poll loop");
                }
            }
        }

        Ok(())
    }
}

/// Run one job end to end. Never fails: every problem ends up either on the
/// job record or in the log.
async fn run_job(state: &WorkerActorState, job_id: JobId) {
    let job = match state
        .table
        .mutate(job_id, |job: &mut Job| job.start(Utc::now()))
        .await
    {
        Ok(job) => job,
        // Cancelled or evicted between dequeue and start.
        Err(e @ (JobError::NotFound(_) | JobError::Conflict { .. })) => {
            tracing::debug!("Skipping job {}: {}", job_id, e);
            return;
        }
        Err(e) => {
            tracing::warn!("Failed to start job {}: {}", job_id, e);
            return;
        }
    };

    tracing::info!("Worker picked up job {}", job_id);

    let (sink, mut progress_rx) = ProgressSink::channel(job_id, state.progress_buffer);
    let processor = state.processor.clone();
    let request = job.request;
    let mut execution =
        tokio::task::spawn_blocking(move || processor.execute(&request, &sink));

    // Bridge progress from the blocking thread onto the table's mailbox
    // while the processor runs.
    let outcome = loop {
        tokio::select! {
            biased;
            Some(percent) = progress_rx.recv() => {
                state.table.report_progress(job_id, percent);
            }
            outcome = &mut execution => break outcome,
        }
    };
    while let Ok(percent) = progress_rx.try_recv() {
        state.table.report_progress(job_id, percent);
    }
    // Sink clones the processor kept alive now hit a closed channel.
    drop(progress_rx);

    let finished = match outcome {
        Ok(Ok(result)) => {
            state
                .table
                .mutate(job_id, move |job: &mut Job| job.complete(result, Utc::now()))
                .await
        }
        Ok(Err(e)) => {
            tracing::warn!("Job {} failed: {}", job_id, e);
            let message = e.to_string();
            state
                .table
                .mutate(job_id, move |job: &mut Job| job.fail(message, Utc::now()))
                .await
        }
        Err(e) => {
            let message = if e.is_panic() {
                "Processor panicked"
            } else {
                "Processor was cancelled"
            };
            tracing::warn!("Job {} failed: {}", job_id, message);
            state
                .table
                .mutate(job_id, move |job: &mut Job| job.fail(message, Utc::now()))
                .await
        }
    };

    match finished {
        Ok(job) => tracing::info!(
            "Job {} {} in {}ms",
            job_id,
            job.status,
            job.processing_time_ms.unwrap_or_default()
        ),
        Err(e) => tracing::warn!("Failed to record outcome of job {}: {}", job_id, e),
    }
}
