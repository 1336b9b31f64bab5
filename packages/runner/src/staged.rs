//! Demonstration processor that walks through the analysis stages.

use std::time::Duration;

use actors::{Processor, ProcessorError, ProcessorResult, ProgressSink};
use job_core::JobRequest;
use serde_json::json;

/// Stages reported by the real pipeline, with the progress reached at each.
const STAGES: &[(&str, f64)] = &[
    ("loading model", 5.0),
    ("tokenizing", 25.0),
    ("tagging entities", 50.0),
    ("resolving coreference", 75.0),
    ("attributing quotes", 95.0),
];

/// Sleeps through each stage and returns a whitespace tokenization.
pub struct StagedProcessor {
    stage_delay: Duration,
}

impl StagedProcessor {
    pub fn new(stage_delay: Duration) -> Self {
        Self { stage_delay }
    }
}

impl Processor for StagedProcessor {
    fn execute(&self, request: &JobRequest, progress: &ProgressSink) -> ProcessorResult {
        if request.text.trim().is_empty() {
            return Err(ProcessorError::new("Text must not be empty"));
        }

        for (stage, percent) in STAGES {
            tracing::debug!("Job {}: {}", progress.job_id(), stage);
            std::thread::sleep(self.stage_delay);
            progress.report(*percent);
        }

        let tokens: Vec<_> = request
            .text
            .split_whitespace()
            .enumerate()
            .map(|(index, word)| json!({ "index": index, "word": word }))
            .collect();

        Ok(json!({
            "book_id": request.book_id,
            "model": request.model,
            "pipeline": request.pipeline,
            "tokens": tokens,
        }))
    }
}
