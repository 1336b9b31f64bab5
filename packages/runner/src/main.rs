//! Runs the job service against a staged demonstration processor.
//!
//! Each command line argument is submitted as one document; with no arguments
//! a few sample passages are used. The process exits once every accepted job
//! has finished, or on Ctrl-C, shutting the service down gracefully.

mod logging;
mod staged;

use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::JobService;
use job_core::{JobEvent, JobId, JobRequest, ServiceConfig};
use tokio::sync::broadcast::error::RecvError;

use crate::staged::StagedProcessor;

const SAMPLE_TEXTS: &[&str] = &[
    "Call me Ishmael. Some years ago, never mind how long precisely, I thought I would sail about a little.",
    "It is a truth universally acknowledged, that a single man in possession of a good fortune, must be in want of a wife.",
    "Happy families are all alike; every unhappy family is unhappy in its own way.",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let config = ServiceConfig::from_env()?;
    let processor = Arc::new(StagedProcessor::new(Duration::from_millis(250)));
    let service = JobService::start(config, processor).await?;
    let mut events = service.subscribe();

    let mut texts: Vec<String> = std::env::args().skip(1).collect();
    if texts.is_empty() {
        texts = SAMPLE_TEXTS.iter().map(|text| text.to_string()).collect();
    }

    let mut outstanding = HashSet::new();
    for (index, text) in texts.into_iter().enumerate() {
        let request = JobRequest::new(text).with_book_id(format!("book-{}", index + 1));
        match service.submit(request).await {
            Ok(submission) => {
                tracing::info!(
                    "Accepted job {} at queue position {:?}",
                    submission.job_id,
                    submission.queue_position
                );
                outstanding.insert(submission.job_id);
            }
            Err(e) => tracing::warn!("Submission rejected: {}", e),
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !outstanding.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(JobEvent::JobProgress { job_id, progress, .. }) => {
                    tracing::info!("Job {} at {:.0}%", job_id, progress);
                }
                Ok(JobEvent::JobStatusChanged { job_id, new_status, .. })
                    if new_status.is_terminal() =>
                {
                    outstanding.remove(&job_id);
                    log_result(&service, job_id).await;
                }
                Ok(event) => tracing::debug!("{}", event.description()),
                Err(RecvError::Lagged(missed)) => tracing::warn!("Missed {} events", missed),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, {} jobs unfinished", outstanding.len());
                break;
            }
        }
    }

    match service.stats().await {
        Ok(stats) => tracing::info!(
            "Processed {} jobs ({} completed, {} failed, {} cancelled)",
            stats.counts.processed(),
            stats.counts.completed,
            stats.counts.failed,
            stats.counts.cancelled
        ),
        Err(e) => tracing::warn!("Failed to read stats: {}", e),
    }

    let outcome = service.shutdown_default().await;
    tracing::info!("Shutdown finished: {:?}", outcome);
    Ok(())
}

async fn log_result(service: &JobService, job_id: JobId) {
    match service.result(job_id).await {
        Ok(report) => match report.outcome() {
            Ok(_) => tracing::info!(
                "Job {} completed with {} tokens in {}ms",
                job_id,
                report.token_count.unwrap_or_default(),
                report.processing_time_ms.unwrap_or_default()
            ),
            Err(e) => tracing::warn!("Job {} failed: {}", job_id, e),
        },
        Err(e) => tracing::warn!("Job {} has no result: {}", job_id, e),
    }
}
