mod common;

use std::time::{Duration, Instant};

use actors::ShutdownOutcome;
use common::{TestResult, request, start_gated, test_config, wait_for_status};
use job_core::{JobError, JobEvent, JobStatus};

#[tokio::test]
async fn test_graceful_shutdown_finishes_running_job() -> TestResult {
    let (service, gate) = start_gated(test_config()).await?;
    let mut events = service.subscribe();

    let running = service.submit(request("running")).await?;
    wait_for_status(&service, running.job_id, JobStatus::Running).await?;
    service.submit(request("queued")).await?;

    let releaser = {
        let gate = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            gate.finish();
        })
    };

    let outcome = service.shutdown(Duration::from_secs(10)).await;
    releaser.await?;
    assert_eq!(outcome, ShutdownOutcome::Graceful);

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        if let JobEvent::JobStatusChanged {
            job_id,
            new_status: JobStatus::Completed,
            ..
        } = event
        {
            completed |= job_id == running.job_id;
        }
    }
    assert!(completed);
    assert_eq!(gate.started(), vec!["running"]);

    Ok(())
}

#[tokio::test]
async fn test_zero_grace_abandons_running_job() -> TestResult {
    let (service, gate) = start_gated(test_config()).await?;

    let running = service.submit(request("stuck")).await?;
    wait_for_status(&service, running.job_id, JobStatus::Running).await?;

    let started = Instant::now();
    let outcome = service.shutdown(Duration::ZERO).await;
    assert_eq!(outcome, ShutdownOutcome::Forced);
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(!service.is_accepting());
    assert_eq!(
        service.submit(request("late")).await.unwrap_err(),
        JobError::ShuttingDown
    );

    // Let the abandoned blocking thread return.
    gate.finish();
    Ok(())
}

#[tokio::test]
async fn test_repeated_shutdown_is_a_no_op() -> TestResult {
    let (service, _gate) = start_gated(test_config()).await?;

    assert_eq!(
        service.shutdown(Duration::from_secs(5)).await,
        ShutdownOutcome::Graceful
    );
    assert_eq!(
        service.shutdown(Duration::from_secs(5)).await,
        ShutdownOutcome::AlreadyStopped
    );
    assert!(service.stats().await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_idle_worker_observes_stop_within_poll_timeout() -> TestResult {
    let config = test_config().with_poll_timeout(Duration::from_millis(50));
    let (service, _gate) = start_gated(config).await?;
    assert!(service.stats().await?.worker_running);

    let started = Instant::now();
    let outcome = service.shutdown(Duration::from_secs(5)).await;
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert!(started.elapsed() < Duration::from_secs(1));

    Ok(())
}
