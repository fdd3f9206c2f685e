//! Lifecycle tests for the orchestrator: natural completion, failures,
//! explicit stops, grace period and launch errors.

use app_runtime::lifecycle::{Completion, JobState, LifecycleState, SignalKind, Trigger};
use app_runtime::{job_fn, Job, JobContext, JobError, LifecycleError, Outcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

mod common;
use common::Events;

fn states(report: &app_runtime::RunReport) -> Vec<(String, JobState)> {
    report
        .jobs
        .iter()
        .map(|j| (j.name.clone(), j.state))
        .collect()
}

/// Paused clock: elapsed time is exact up to timer resolution.
fn assert_elapsed(began: Instant, expected: Duration) {
    let elapsed = began.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {:?}, expected {:?}",
        elapsed,
        expected
    );
}

const CANCELLED: JobState = JobState::Finished(Completion::Cancelled);
const COMPLETED: JobState = JobState::Finished(Completion::Completed);

#[tokio::test(start_paused = true)]
async fn test_zero_jobs_succeeds_immediately() {
    let events = Events::default();
    let orch = common::scripted(common::ScriptedApp::new(Vec::new()).with_events(events.clone()));

    let began = Instant::now();
    let report = orch.run().await.unwrap();

    assert_elapsed(began, Duration::ZERO);
    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(report.trigger, Some(Trigger::JobsCompleted));
    assert!(report.jobs.is_empty());
    assert_eq!(events.snapshot(), vec!["setup", "teardown"]);
}

#[tokio::test(start_paused = true)]
async fn test_natural_completion_is_success() {
    let orch = common::orchestrator(vec![
        common::completes("short", Duration::from_secs(1)),
        common::completes("long", Duration::from_secs(2)),
    ]);

    let began = Instant::now();
    let report = orch.run().await.unwrap();

    assert_elapsed(began, Duration::from_secs(2));
    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(report.trigger, Some(Trigger::JobsCompleted));
    assert_eq!(
        states(&report),
        vec![("short".into(), COMPLETED), ("long".into(), COMPLETED)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_failure_cancels_siblings() {
    let orch = common::orchestrator(vec![
        common::idle("a"),
        common::fails("worker", Duration::from_secs(1), "boom"),
        common::idle("b"),
    ]);

    let report = orch.run().await.unwrap();

    assert_eq!(report.outcome(), Outcome::Failed);
    assert_eq!(report.trigger, Some(Trigger::JobFailed("worker".into())));
    match &report.failure {
        Some(LifecycleError::Job(failure)) => {
            assert_eq!(failure.job, "worker");
            assert_eq!(failure.error.to_string(), "boom");
        }
        other => panic!("unexpected failure: {:?}", other),
    }
    assert!(report.suppressed.is_empty());
    assert_eq!(
        states(&report),
        vec![
            ("a".into(), CANCELLED),
            ("worker".into(), JobState::Finished(Completion::Failed)),
            ("b".into(), CANCELLED),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_failures_surface_first_observed() {
    let orch = common::orchestrator(vec![
        common::fails("left", Duration::from_secs(1), "left broke"),
        common::fails("right", Duration::from_secs(1), "right broke"),
    ]);

    let report = orch.run().await.unwrap();

    let surfaced = match &report.failure {
        Some(LifecycleError::Job(failure)) => failure.job.clone(),
        other => panic!("unexpected failure: {:?}", other),
    };
    assert_eq!(report.outcome(), Outcome::Failed);
    assert_eq!(report.suppressed.len(), 1);
    assert_ne!(report.suppressed[0].job, surfaced);
    assert_eq!(report.trigger, Some(Trigger::JobFailed(surfaced)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let mut orch = common::orchestrator(vec![common::idle("a"), common::idle("b")]);
    orch.start().await.unwrap();
    assert_eq!(orch.state(), LifecycleState::Running);

    orch.stop();
    orch.stop();
    orch.stop();
    orch.wait().await.unwrap();
    orch.stop();

    assert_eq!(orch.state(), LifecycleState::Stopped);
    assert_eq!(orch.shutdown_handle().reason(), Some(Trigger::StopRequested));
    assert!(orch.job_summaries().iter().all(|j| j.state == CANCELLED));
}

#[tokio::test(start_paused = true)]
async fn test_job_can_request_stop() {
    let requester: Box<dyn Job> = Box::new(job_fn("requester", |ctx: JobContext| async move {
        ctx.sleep(Duration::from_secs(1)).await?;
        ctx.request_stop();
        Ok::<_, JobError>(())
    }));
    let orch = common::orchestrator(vec![requester, common::idle("other")]);

    let report = orch.run().await.unwrap();

    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(report.trigger, Some(Trigger::StopRequested));
    assert!(report.externally_requested());
}

#[tokio::test(start_paused = true)]
async fn test_grace_period_bounds_wait() {
    let orch = common::orchestrator(vec![
        common::stubborn("stubborn", Duration::from_secs(10)),
        common::idle("polite"),
    ]);
    let stop = orch.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.request_stop();
    });

    let began = Instant::now();
    let report = orch.run().await.unwrap();

    // stop at 1s + 2s grace
    assert_elapsed(began, Duration::from_secs(3));
    assert_eq!(report.outcome(), Outcome::Degraded);
    assert_eq!(report.abandoned, vec!["stubborn".to_string()]);
    assert_eq!(
        states(&report),
        vec![
            ("stubborn".into(), JobState::Abandoned),
            ("polite".into(), CANCELLED),
        ]
    );
}

async fn produce(ctx: JobContext, tx: mpsc::Sender<u32>) -> Result<(), JobError> {
    let mut n = 0;
    loop {
        ctx.sleep(Duration::from_millis(100)).await?;
        n += 1;
        ctx.run_until_cancelled(tx.send(n))
            .await?
            .map_err(|_| JobError::failed("queue closed"))?;
    }
}

async fn consume(ctx: JobContext, rx: SharedReceiver) -> Result<(), JobError> {
    loop {
        let next = ctx
            .run_until_cancelled(async { rx.lock().await.recv().await })
            .await?;
        if next.is_none() {
            return Ok(());
        }
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<u32>>>;

#[tokio::test(start_paused = true)]
async fn test_producers_and_consumers_stop_on_signal() {
    let (tx, rx) = mpsc::channel::<u32>(16);
    let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));

    let mut jobs: Vec<Box<dyn Job>> = Vec::new();
    for i in 0..3 {
        let tx = tx.clone();
        jobs.push(Box::new(job_fn(format!("producer-{}", i), move |ctx| {
            produce(ctx, tx)
        })));
    }
    for i in 0..2 {
        let rx = rx.clone();
        jobs.push(Box::new(job_fn(format!("consumer-{}", i), move |ctx| {
            consume(ctx, rx)
        })));
    }
    drop(tx);

    let orch = common::orchestrator(jobs);
    let shutdown = orch.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger(Trigger::Signal(SignalKind::Terminate));
    });

    let began = Instant::now();
    let report = orch.run().await.unwrap();

    assert_elapsed(began, Duration::from_secs(1));
    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(report.trigger, Some(Trigger::Signal(SignalKind::Terminate)));
    assert!(report.externally_requested());
    assert_eq!(report.jobs.len(), 5);
    assert!(report.jobs.iter().all(|j| j.state == CANCELLED));
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_cancels_launched_jobs() {
    let events = Events::default();
    let mut orch = common::orchestrator(vec![
        common::observed("first", events.clone()),
        common::unlaunchable("db"),
        common::stubborn("later", Duration::from_millis(100)),
    ]);

    let mut state = orch.subscribe_state();
    let transitions = tokio::spawn(async move {
        let mut seen = vec![*state.borrow_and_update()];
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            seen.push(current);
            if current == LifecycleState::Stopped {
                break;
            }
        }
        seen
    });

    let err = orch.start().await.unwrap_err();

    match err {
        LifecycleError::Launch(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].job, "db");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(orch.state(), LifecycleState::Stopped);
    assert_eq!(orch.shutdown_handle().reason(), Some(Trigger::LaunchFailed));

    let summaries: Vec<_> = orch.job_summaries().into_iter().map(|j| j.state).collect();
    assert_eq!(summaries, vec![CANCELLED, JobState::NotLaunched, CANCELLED]);
    assert_eq!(events.snapshot().last().map(String::as_str), Some("first cancelled"));

    // starting → stopped, never through stopping
    let seen = transitions.await.unwrap();
    assert_eq!(seen, vec![LifecycleState::Starting, LifecycleState::Stopped]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_slow_launch() {
    let mut orch = common::orchestrator(vec![
        common::idle("ready"),
        common::slow_launch("db", Duration::from_secs(60)),
        common::idle("after"),
    ]);
    let stop = orch.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.request_stop();
    });

    let began = Instant::now();
    orch.start().await.unwrap();

    assert_elapsed(began, Duration::from_secs(1));
    assert_eq!(orch.state(), LifecycleState::Starting);

    orch.wait().await.unwrap();
    assert_eq!(orch.state(), LifecycleState::Stopped);
    assert_eq!(orch.shutdown_handle().reason(), Some(Trigger::StopRequested));

    let summaries: Vec<_> = orch.job_summaries().into_iter().map(|j| j.state).collect();
    assert_eq!(summaries, vec![CANCELLED, JobState::Skipped, JobState::Skipped]);
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_through_run() {
    let events = Events::default();
    let app = common::ScriptedApp::new(vec![common::idle("ok"), common::unlaunchable("db")])
        .with_events(events.clone());

    let report = common::scripted(app).run().await.unwrap();

    assert_eq!(report.outcome(), Outcome::Failed);
    assert!(matches!(report.failure, Some(LifecycleError::Launch(_))));
    assert_eq!(events.snapshot(), vec!["setup", "teardown"]);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_escapes_run() {
    let events = Events::default();
    let app = common::ScriptedApp::new(vec![
        common::idle("other"),
        common::terminal("fatal", Duration::from_secs(1), "disk gone"),
    ])
    .with_events(events.clone());

    let terminal = common::scripted(app).run().await.unwrap_err();

    assert_eq!(terminal.message(), "disk gone");
    assert_eq!(events.snapshot(), vec!["setup"]);
}

#[tokio::test(start_paused = true)]
async fn test_setup_failure_skips_jobs() {
    let events = Events::default();
    let app = common::ScriptedApp::new(vec![common::observed("never", events.clone())])
        .with_events(events.clone())
        .failing_setup();

    let report = common::scripted(app).run().await.unwrap();

    assert_eq!(report.outcome(), Outcome::Failed);
    assert!(matches!(
        report.failure,
        Some(LifecycleError::Hook { hook: "setup", .. })
    ));
    assert!(report.jobs.is_empty());
    assert_eq!(events.snapshot(), vec!["setup"]);
}

#[tokio::test(start_paused = true)]
async fn test_start_after_stop_launches_nothing() {
    let mut orch = common::orchestrator(vec![common::idle("late")]);
    let shutdown = orch.shutdown_handle();

    // Not armed yet: ignored.
    assert!(!shutdown.request_stop());
    orch.start().await.unwrap();
    orch.stop();
    orch.wait().await.unwrap();

    assert_eq!(orch.job_summaries()[0].state, CANCELLED);
}
