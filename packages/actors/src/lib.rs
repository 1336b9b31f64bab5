//! Actor runtime for the analysis job subsystem.
//!
//! This crate provides the Ractor-based runtime that serializes long-running
//! analysis jobs onto a single execution lane.
//!
//! # Architecture
//!
//! - `JobTableActor` - Sole owner of job state; its mailbox is the mutation path
//! - `AdmissionQueue` - Bounded FIFO of pending job ids, rejects when full
//! - `WorkerActor` - Drains the queue one job at a time and runs the `Processor`
//! - `JobService` - Submit, status, result, cancel, stats and shutdown
//!
//! # Usage
//!
//! ```ignore
//! use actors::{FnProcessor, JobService};
//! use job_core::{JobRequest, ServiceConfig};
//!
//! let processor = FnProcessor::new(|request, progress| {
//!     progress.report(50.0);
//!     Ok(serde_json::json!({ "tokens": [] }))
//! });
//! let service = JobService::start(ServiceConfig::default(), Arc::new(processor)).await?;
//! let submission = service.submit(JobRequest::new("Call me Ishmael.")).await?;
//! let status = service.status(submission.job_id).await?;
//! ```

mod admission;
mod messages;
mod processor;
mod service;
mod table_actor;
mod worker_actor;

pub use admission::AdmissionQueue;
pub use messages::{JobMutation, TableMessage, WorkerMessage};
pub use processor::{FnProcessor, Processor, ProcessorError, ProcessorResult, ProgressSink};
pub use service::{JobService, MAX_CONCURRENT_JOBS, ShutdownOutcome, StartError};
pub use table_actor::{JobTable, JobTableActor, JobTableArgs};
pub use worker_actor::{WorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
