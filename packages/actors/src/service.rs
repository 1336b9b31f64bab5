//! Lifecycle controller: submit, query, cancel and shut down jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use job_core::{
    ConfigError, Job, JobError, JobEvent, JobId, JobRequest, JobResultReport, JobStatus,
    JobStatusReport, ServiceConfig, ServiceStats, Submission,
};
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorRef};
use tokio::sync::{Mutex, broadcast};

use crate::admission::AdmissionQueue;
use crate::messages::WorkerMessage;
use crate::processor::Processor;
use crate::table_actor::{JobTable, JobTableArgs};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// The processor runs on exactly one lane.
pub const MAX_CONCURRENT_JOBS: u32 = 1;

/// Errors raised while starting the service.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn actor: {0}")]
    Spawn(String),
}

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The worker stopped on its own within the grace period.
    Graceful,
    /// The grace period elapsed and the running job was abandoned.
    Forced,
    /// The service had already been shut down.
    AlreadyStopped,
}

struct WorkerHandle {
    actor: ActorRef<WorkerMessage>,
    join: JoinHandle<()>,
}

/// Entry point used by the HTTP layer.
///
/// Construct once at process start and share by reference. Owns the job
/// table actor, the admission queue and the single worker.
pub struct JobService {
    config: ServiceConfig,
    table: JobTable,
    queue: Arc<AdmissionQueue>,
    worker: Mutex<Option<WorkerHandle>>,
    table_join: Mutex<Option<JoinHandle<()>>>,
    worker_running: Arc<AtomicBool>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl JobService {
    /// Spawn the table and the worker and start accepting jobs.
    pub async fn start(
        config: ServiceConfig,
        processor: Arc<dyn Processor>,
    ) -> Result<Self, StartError> {
        config.validate()?;
        tracing::info!(
            "Starting job service (capacity {}, ttl {:?})",
            config.max_queue_size,
            config.job_ttl()
        );

        let (event_tx, _) = broadcast::channel(1024);
        let (table, table_join) = JobTable::spawn(JobTableArgs {
            ttl: config.job_ttl(),
            sweep_interval: config.sweep_interval(),
            event_tx: event_tx.clone(),
        })
        .await
        .map_err(|e| StartError::Spawn(format!("job table: {}", e)))?;

        let queue = Arc::new(AdmissionQueue::new(config.max_queue_size));
        let worker_running = Arc::new(AtomicBool::new(false));
        let args = WorkerArgs {
            queue: queue.clone(),
            table: table.clone(),
            processor,
            poll_timeout: config.poll_timeout(),
            progress_buffer: config.progress_buffer,
            running: worker_running.clone(),
        };
        let (actor, join) = match Actor::spawn(None, WorkerActor, args).await {
            Ok(spawned) => spawned,
            Err(e) => {
                table.stop();
                return Err(StartError::Spawn(format!("worker: {}", e)));
            }
        };

        Ok(Self {
            config,
            table,
            queue,
            worker: Mutex::new(Some(WorkerHandle { actor, join })),
            table_join: Mutex::new(Some(table_join)),
            worker_running,
            event_tx,
        })
    }

    /// Submit a request.
    ///
    /// Fails with `QueueFull` when the admission queue is at capacity; the
    /// table is left exactly as it was.
    pub async fn submit(&self, request: JobRequest) -> Result<Submission, JobError> {
        if self.queue.is_closed() {
            return Err(JobError::ShuttingDown);
        }
        if self.queue.is_full() {
            return Err(JobError::QueueFull {
                capacity: self.queue.capacity(),
            });
        }

        let job = Job::new(request);
        let job_id = job.id;
        let submitted_at = job.submitted_at;
        self.table.insert(job).await?;

        if let Err(e) = self.queue.offer(job_id) {
            // Roll back so no pending entry is left behind.
            if let Err(remove_err) = self.table.remove(job_id).await {
                tracing::warn!("Failed to roll back job {}: {}", job_id, remove_err);
            }
            tracing::info!("Rejected job {}: {}", job_id, e);
            return Err(e);
        }

        tracing::info!("Job {} submitted", job_id);
        Ok(Submission {
            job_id,
            status: JobStatus::Pending,
            submitted_at,
            queue_position: self.queue.position_of(job_id),
        })
    }

    /// Current status and progress of a job.
    pub async fn status(&self, job_id: JobId) -> Result<JobStatusReport, JobError> {
        let job = self.table.get(job_id).await?;
        let position = match job.status {
            JobStatus::Pending => self.queue.position_of(job_id),
            _ => None,
        };
        Ok(JobStatusReport::new(&job, position))
    }

    /// Outcome of a completed or failed job.
    ///
    /// Any other status, cancelled included, yields `NotReady` carrying the
    /// current status.
    pub async fn result(&self, job_id: JobId) -> Result<JobResultReport, JobError> {
        let job = self.table.get(job_id).await?;
        if !job.status.has_outcome() {
            return Err(JobError::NotReady {
                job_id,
                status: job.status,
            });
        }
        Ok(job.into())
    }

    /// Cancel a pending job.
    ///
    /// Running and finished jobs fail with `Conflict`.
    pub async fn cancel(&self, job_id: JobId) -> Result<JobStatusReport, JobError> {
        let job = self
            .table
            .mutate(job_id, |job: &mut Job| job.cancel(Utc::now()))
            .await?;
        self.queue.remove(job_id);
        tracing::info!("Job {} cancelled", job_id);
        Ok(JobStatusReport::new(&job, None))
    }

    /// Aggregate counts and queue occupancy.
    pub async fn stats(&self) -> Result<ServiceStats, JobError> {
        let counts = self.table.counts().await?;
        Ok(ServiceStats {
            total_jobs: counts.total(),
            queue_size: self.queue.len(),
            max_queue_size: self.queue.capacity(),
            counts,
            worker_running: self.worker_running.load(Ordering::SeqCst),
            job_ttl_secs: self.config.job_ttl().as_secs(),
            max_concurrent_jobs: MAX_CONCURRENT_JOBS,
        })
    }

    /// Drop expired jobs now instead of waiting for the periodic sweep.
    pub async fn sweep(&self) -> Result<usize, JobError> {
        self.table.sweep().await
    }

    /// Receive lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Whether new submissions are accepted.
    pub fn is_accepting(&self) -> bool {
        !self.queue.is_closed()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shut down using the configured grace period.
    pub async fn shutdown_default(&self) -> ShutdownOutcome {
        self.shutdown(self.config.shutdown_grace()).await
    }

    /// Stop admitting, let the running job finish within `grace`, then tear
    /// the queue and table down.
    ///
    /// When the grace period elapses the worker is killed and the processor
    /// call is abandoned on its blocking thread.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        self.queue.close();
        let Some(worker) = self.worker.lock().await.take() else {
            return ShutdownOutcome::AlreadyStopped;
        };

        let dropped = self.queue.clear();
        tracing::info!(
            "Shutting down job service (grace {:?}, {} queued jobs dropped)",
            grace,
            dropped
        );

        worker.actor.stop(None);
        let mut join = worker.join;
        let outcome = match tokio::time::timeout(grace, &mut join).await {
            Ok(_) => ShutdownOutcome::Graceful,
            Err(_) => {
                tracing::warn!("Grace period elapsed, abandoning the running job");
                worker.actor.kill();
                if let Err(e) = join.await {
                    tracing::debug!("Worker task ended with: {}", e);
                }
                ShutdownOutcome::Forced
            }
        };
        self.worker_running.store(false, Ordering::SeqCst);

        match self.table.purge().await {
            Ok(removed) => tracing::debug!("Removed {} jobs at shutdown", removed),
            Err(e) => tracing::warn!("Failed to purge job table: {}", e),
        }
        self.table.stop();
        if let Some(table_join) = self.table_join.lock().await.take() {
            let _ = table_join.await;
        }

        tracing::info!("Job service stopped ({:?})", outcome);
        outcome
    }
}
