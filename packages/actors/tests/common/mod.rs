#![allow(dead_code)]

use std::error::Error;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actors::{JobService, Processor, ProcessorError, ProcessorResult, ProgressSink};
use job_core::{JobId, JobRequest, JobStatus, JobStatusReport, ServiceConfig};
use serde_json::json;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Instruction for the job currently inside a [`GatedProcessor`].
pub enum Step {
    Progress(f64),
    Finish,
    Fail(String),
}

/// Test-side handle that drives a [`GatedProcessor`].
#[derive(Clone)]
pub struct Gate {
    tx: Sender<Step>,
    started: Arc<Mutex<Vec<String>>>,
}

impl Gate {
    pub fn send(&self, step: Step) {
        let _ = self.tx.send(step);
    }

    pub fn finish(&self) {
        self.send(Step::Finish);
    }

    /// Labels of the requests the processor has started, in order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

/// Processor that blocks each job until the test tells it what to do.
pub struct GatedProcessor {
    rx: Mutex<Receiver<Step>>,
    started: Arc<Mutex<Vec<String>>>,
}

impl GatedProcessor {
    pub fn new() -> (Self, Gate) {
        let (tx, rx) = mpsc::channel();
        let started = Arc::new(Mutex::new(Vec::new()));
        let gate = Gate {
            tx,
            started: started.clone(),
        };
        (
            Self {
                rx: Mutex::new(rx),
                started,
            },
            gate,
        )
    }
}

impl Processor for GatedProcessor {
    fn execute(&self, request: &JobRequest, progress: &ProgressSink) -> ProcessorResult {
        let label = request
            .book_id
            .clone()
            .unwrap_or_else(|| request.text.clone());
        self.started.lock().unwrap().push(label);

        let rx = self.rx.lock().unwrap();
        loop {
            match rx.recv_timeout(Duration::from_secs(10)) {
                Ok(Step::Progress(percent)) => progress.report(percent),
                Ok(Step::Finish) => return Ok(tokens_for(&request.text)),
                Ok(Step::Fail(message)) => return Err(ProcessorError::new(message)),
                Err(RecvTimeoutError::Timeout) => return Err("gate timed out".into()),
                Err(RecvTimeoutError::Disconnected) => return Err("gate dropped".into()),
            }
        }
    }
}

/// Result payload with one entry per whitespace-separated word.
pub fn tokens_for(text: &str) -> serde_json::Value {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    json!({ "tokens": tokens })
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig::default().with_poll_timeout(Duration::from_millis(20))
}

pub fn request(label: &str) -> JobRequest {
    JobRequest::new(format!("text for {label}")).with_book_id(label)
}

pub async fn start_gated(config: ServiceConfig) -> Result<(JobService, Gate), Box<dyn Error>> {
    let (processor, gate) = GatedProcessor::new();
    let service = JobService::start(config, Arc::new(processor)).await?;
    Ok((service, gate))
}

/// Poll until the job reaches `expected`, failing after a few seconds.
pub async fn wait_for_status(
    service: &JobService,
    job_id: JobId,
    expected: JobStatus,
) -> Result<JobStatusReport, Box<dyn Error>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let report = service.status(job_id).await?;
        if report.status == expected {
            return Ok(report);
        }
        if Instant::now() > deadline {
            return Err(format!("job {} stuck in {}, expected {}", job_id, report.status, expected).into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the job's progress reaches `expected`.
pub async fn wait_for_progress(
    service: &JobService,
    job_id: JobId,
    expected: f64,
) -> Result<JobStatusReport, Box<dyn Error>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let report = service.status(job_id).await?;
        if report.progress >= expected {
            return Ok(report);
        }
        if Instant::now() > deadline {
            return Err(format!("job {} stuck at {}%", job_id, report.progress).into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
