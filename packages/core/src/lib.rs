//! Core domain types for the analysis job subsystem.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobStatus and the lifecycle state machine
//! - JobError and ConfigError
//! - ServiceConfig, statistics and caller-facing reports
//! - Events for real-time updates

mod config;
mod error;
mod events;
mod job;
mod report;
mod stats;

pub use config::{ConfigError, ENV_PREFIX, ServiceConfig};
pub use error::{JobError, JobResult};
pub use events::JobEvent;
pub use job::{Job, JobId, JobRequest, JobStatus};
pub use report::{JobResultReport, JobStatusReport, Submission};
pub use stats::{ServiceStats, StatusCounts};
