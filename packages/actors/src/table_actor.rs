//! Job table actor: the single owner of every job's mutable state.
//!
//! All reads and writes go through the actor's mailbox, which serializes
//! them. Callers only ever receive cloned snapshots.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use job_core::{Job, JobError, JobEvent, JobId, JobStatus, StatusCounts};
use ractor::concurrency::JoinHandle;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tokio::sync::broadcast;

use crate::messages::{JobMutation, TableMessage};

/// Arguments for spawning the job table.
pub struct JobTableArgs {
    /// Retention window for terminal jobs.
    pub ttl: Duration,
    /// Interval between periodic sweeps.
    pub sweep_interval: Duration,
    /// Event broadcaster.
    pub event_tx: broadcast::Sender<JobEvent>,
}

/// State for the job table actor.
pub struct JobTableState {
    jobs: HashMap<JobId, Job>,
    ttl: chrono::Duration,
    event_tx: broadcast::Sender<JobEvent>,
}

impl JobTableState {
    /// Create an empty table.
    pub fn new(ttl: Duration, event_tx: broadcast::Sender<JobEvent>) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            jobs: HashMap::new(),
            ttl: chrono::Duration::milliseconds(ttl_ms),
            event_tx,
        }
    }

    /// Broadcast an event. Nobody listening is fine.
    fn broadcast(&self, event: JobEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Look a job up, evicting it first if it has outlived the TTL.
    fn live_job(&mut self, job_id: JobId) -> Option<&mut Job> {
        let expired = self.jobs.get(&job_id)?.is_expired(Utc::now(), self.ttl);
        if expired {
            self.evict(job_id);
            return None;
        }
        self.jobs.get_mut(&job_id)
    }

    fn evict(&mut self, job_id: JobId) {
        let Some(mut job) = self.jobs.remove(&job_id) else {
            return;
        };
        let old_status = job.status;
        if job.expire().is_err() {
            return;
        }
        let now = Utc::now();
        self.broadcast(JobEvent::JobStatusChanged {
            job_id,
            old_status,
            new_status: JobStatus::Expired,
            timestamp: now,
        });
        self.broadcast(JobEvent::JobExpired {
            job_id,
            timestamp: now,
        });
    }

    fn insert(&mut self, job: Job) -> Result<(), JobError> {
        if let Some(existing) = self.jobs.get(&job.id) {
            return Err(JobError::Conflict {
                job_id: job.id,
                status: existing.status,
            });
        }
        let job_id = job.id;
        self.jobs.insert(job_id, job);
        self.broadcast(JobEvent::JobSubmitted {
            job_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn mutate(&mut self, job_id: JobId, apply: JobMutation) -> Result<Job, JobError> {
        let job = self.live_job(job_id).ok_or(JobError::NotFound(job_id))?;
        let old_status = job.status;

        // Apply to a copy so a rejected transition leaves the job untouched.
        let mut updated = job.clone();
        apply(&mut updated)?;
        *job = updated.clone();

        if updated.status != old_status {
            self.broadcast(JobEvent::JobStatusChanged {
                job_id,
                old_status,
                new_status: updated.status,
                timestamp: Utc::now(),
            });
        }
        Ok(updated)
    }

    fn record_progress(&mut self, job_id: JobId, percent: f64) {
        let Some(job) = self.jobs.get_mut(&job_id) else {
            return;
        };
        if !job.record_progress(percent) {
            tracing::trace!("Ignored progress {} for job {} ({})", percent, job_id, job.status);
            return;
        }
        let progress = job.progress;
        self.broadcast(JobEvent::JobProgress {
            job_id,
            progress,
            timestamp: Utc::now(),
        });
    }

    fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in self.jobs.values() {
            counts.record(job.status);
        }
        counts
    }

    /// Remove every terminal job older than the TTL.
    pub fn sweep(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.is_expired(now, self.ttl))
            .map(|job| job.id)
            .collect();
        for job_id in &expired {
            self.evict(*job_id);
        }
        expired.len()
    }

    fn purge(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        count
    }
}

/// Actor owning the job table.
pub struct JobTableActor;

impl Actor for JobTableActor {
    type Msg = TableMessage;
    type State = JobTableState;
    type Arguments = JobTableArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting job table (ttl {:?}, sweep every {:?})",
            args.ttl,
            args.sweep_interval
        );

        // Start periodic sweep
        let myself_clone = myself.clone();
        let sweep_interval = args.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                if myself_clone.send_message(TableMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(JobTableState::new(args.ttl, args.event_tx))
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            TableMessage::Insert { job, reply } => {
                let _ = reply.send(state.insert(*job));
            }

            TableMessage::Get { job_id, reply } => {
                let _ = reply.send(state.live_job(job_id).cloned());
            }

            TableMessage::Remove { job_id, reply } => {
                let _ = reply.send(state.jobs.remove(&job_id));
            }

            TableMessage::Mutate {
                job_id,
                apply,
                reply,
            } => {
                let _ = reply.send(state.mutate(job_id, apply));
            }

            TableMessage::Progress { job_id, percent } => {
                state.record_progress(job_id, percent);
            }

            TableMessage::Counts { reply } => {
                let _ = reply.send(state.counts());
            }

            TableMessage::Sweep { reply } => {
                let _ = reply.send(state.sweep());
            }

            TableMessage::Purge { reply } => {
                let removed = state.purge();
                tracing::info!("Purged {} jobs from the table", removed);
                let _ = reply.send(removed);
            }

            TableMessage::Tick => {
                let removed = state.sweep();
                if removed > 0 {
                    tracing::debug!("Swept {} expired jobs", removed);
                }
            }
        }

        Ok(())
    }
}

/// Cloneable handle to the job table actor.
#[derive(Clone)]
pub struct JobTable {
    actor: ActorRef<TableMessage>,
}

impl JobTable {
    /// Spawn the table actor and return a handle to it.
    pub async fn spawn(
        args: JobTableArgs,
    ) -> Result<(Self, JoinHandle<()>), ractor::SpawnErr> {
        let (actor, handle) = Actor::spawn(None, JobTableActor, args).await?;
        Ok((Self { actor }, handle))
    }

    async fn call<T, F>(&self, build: F) -> Result<T, JobError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> TableMessage,
    {
        match ractor::rpc::call(&self.actor, build, None).await {
            Ok(CallResult::Success(value)) => Ok(value),
            Ok(CallResult::Timeout) => Err(JobError::Unavailable("job table timed out".into())),
            Ok(CallResult::SenderError) => {
                Err(JobError::Unavailable("job table dropped the request".into()))
            }
            Err(_) => Err(JobError::Unavailable("job table is not running".into())),
        }
    }

    /// Add a new pending job.
    pub async fn insert(&self, job: Job) -> Result<(), JobError> {
        self.call(|reply| TableMessage::Insert {
            job: Box::new(job),
            reply,
        })
        .await?
    }

    /// Snapshot of a job, or `NotFound` if missing or past its TTL.
    pub async fn get(&self, job_id: JobId) -> Result<Job, JobError> {
        self.call(|reply| TableMessage::Get { job_id, reply })
            .await?
            .ok_or(JobError::NotFound(job_id))
    }

    /// Remove a job regardless of its status.
    pub async fn remove(&self, job_id: JobId) -> Result<Option<Job>, JobError> {
        self.call(|reply| TableMessage::Remove { job_id, reply })
            .await
    }

    /// Apply a state transition atomically and return the updated snapshot.
    pub async fn mutate<F>(&self, job_id: JobId, apply: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobError> + Send + 'static,
    {
        self.call(|reply| TableMessage::Mutate {
            job_id,
            apply: Box::new(apply),
            reply,
        })
        .await?
    }

    /// Queue a progress update onto the table's mutation path.
    pub fn report_progress(&self, job_id: JobId, percent: f64) {
        if self
            .actor
            .send_message(TableMessage::Progress { job_id, percent })
            .is_err()
        {
            tracing::debug!("Job table gone, dropping progress for job {}", job_id);
        }
    }

    /// Count tracked jobs per status.
    pub async fn counts(&self) -> Result<StatusCounts, JobError> {
        self.call(|reply| TableMessage::Counts { reply }).await
    }

    /// Remove terminal jobs older than the TTL.
    pub async fn sweep(&self) -> Result<usize, JobError> {
        self.call(|reply| TableMessage::Sweep { reply }).await
    }

    /// Remove every job.
    pub async fn purge(&self) -> Result<usize, JobError> {
        self.call(|reply| TableMessage::Purge { reply }).await
    }

    /// Stop the table actor.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}
