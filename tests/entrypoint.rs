//! The process entrypoint returns its exit code even when a job never stops.

use app_runtime::lifecycle::entrypoint::{EXIT_DEGRADED, EXIT_USAGE};
use app_runtime::lifecycle::run_application;
use app_runtime::{job_fn, Job, JobContext, JobError};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

mod common;

/// Run the entrypoint on its own thread; `None` if it has not returned in time.
fn run_with_deadline(
    argv: Vec<&'static str>,
    jobs: Vec<Box<dyn Job>>,
    deadline: Duration,
) -> Option<u8> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let code = run_application("stuck", "never stops", Vec::new(), argv, move |_| {
            common::ScriptedApp::new(jobs)
        });
        let _ = tx.send(code);
    });
    rx.recv_timeout(deadline).ok()
}

#[test]
fn test_blocking_job_does_not_hold_process_open() {
    let stuck: Box<dyn Job> = Box::new(job_fn("stuck", |_ctx: JobContext| async move {
        let _ = tokio::task::spawn_blocking(|| thread::sleep(Duration::from_secs(30))).await;
        Ok::<_, JobError>(())
    }));
    let requester: Box<dyn Job> = Box::new(job_fn("requester", |ctx: JobContext| async move {
        ctx.sleep(Duration::from_millis(100)).await?;
        ctx.request_stop();
        Ok::<_, JobError>(())
    }));

    let began = Instant::now();
    let code = run_with_deadline(vec!["-g", "200"], vec![stuck, requester], Duration::from_secs(5));

    assert_eq!(code, Some(EXIT_DEGRADED));
    assert!(began.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_unknown_argument_is_usage_error() {
    let code = run_with_deadline(vec!["--no-such-flag"], Vec::new(), Duration::from_secs(5));
    assert_eq!(code, Some(EXIT_USAGE));
}
