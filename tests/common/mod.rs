//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use app_runtime::config::Config;
use app_runtime::{job_fn, Application, BoxError, Job, JobContext, JobError, Orchestrator};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered log of what the application and its jobs did.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// An application whose jobs are handed in by the test.
pub struct ScriptedApp {
    jobs: Mutex<Option<Vec<Box<dyn Job>>>>,
    events: Events,
    fail_setup: bool,
}

impl ScriptedApp {
    pub fn new(jobs: Vec<Box<dyn Job>>) -> Self {
        Self {
            jobs: Mutex::new(Some(jobs)),
            events: Events::default(),
            fail_setup: false,
        }
    }

    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }
}

#[async_trait]
impl Application for ScriptedApp {
    fn name(&self) -> &str {
        "scripted"
    }

    fn jobs(&self, _config: &Config) -> Vec<Box<dyn Job>> {
        self.jobs.lock().unwrap().take().unwrap_or_default()
    }

    async fn setup(&self, _config: &Config) -> Result<(), BoxError> {
        self.events.push("setup");
        if self.fail_setup {
            return Err("setup refused".into());
        }
        Ok(())
    }

    async fn teardown(&self, _config: &Config) -> Result<(), BoxError> {
        self.events.push("teardown");
        Ok(())
    }
}

pub fn empty_config() -> Arc<Config> {
    Arc::new(Config::with_env("test", "", Vec::new(), |_| None).unwrap())
}

/// Orchestrator without OS signal handling and a 2 s grace period.
pub fn orchestrator(jobs: Vec<Box<dyn Job>>) -> Orchestrator<ScriptedApp> {
    scripted(ScriptedApp::new(jobs))
}

pub fn scripted(app: ScriptedApp) -> Orchestrator<ScriptedApp> {
    Orchestrator::new(app, empty_config())
        .handle_signals(false)
        .grace_period(Duration::from_secs(2))
}

/// Runs until cancelled.
pub fn idle(name: &str) -> Box<dyn Job> {
    Box::new(job_fn(name, |ctx: JobContext| async move {
        ctx.cancelled().await;
        Ok::<_, JobError>(())
    }))
}

/// Finishes on its own after `after`.
pub fn completes(name: &str, after: Duration) -> Box<dyn Job> {
    Box::new(job_fn(name, move |ctx: JobContext| async move {
        ctx.sleep(after).await
    }))
}

/// Fails with `message` after `after`, ignoring cancellation meanwhile.
pub fn fails(name: &str, after: Duration, message: &'static str) -> Box<dyn Job> {
    Box::new(job_fn(name, move |_ctx: JobContext| async move {
        tokio::time::sleep(after).await;
        Err::<(), _>(JobError::failed(message))
    }))
}

/// Raises a terminal failure after `after`.
pub fn terminal(name: &str, after: Duration, message: &'static str) -> Box<dyn Job> {
    Box::new(job_fn(name, move |ctx: JobContext| async move {
        ctx.sleep(after).await?;
        Err::<(), _>(JobError::terminal(message))
    }))
}

/// Keeps working for `busy` no matter what.
pub fn stubborn(name: &str, busy: Duration) -> Box<dyn Job> {
    Box::new(job_fn(name, move |_ctx: JobContext| async move {
        tokio::time::sleep(busy).await;
        Ok::<_, JobError>(())
    }))
}

/// Records its own cancellation before returning.
pub fn observed(name: &str, events: Events) -> Box<dyn Job> {
    let label = name.to_string();
    Box::new(job_fn(name, move |ctx: JobContext| async move {
        events.push(format!("{} started", label));
        ctx.cancelled().await;
        events.push(format!("{} cancelled", label));
        Ok::<_, JobError>(())
    }))
}

/// A job whose launch step always fails.
pub struct UnlaunchableJob {
    name: String,
}

pub fn unlaunchable(name: &str) -> Box<dyn Job> {
    Box::new(UnlaunchableJob {
        name: name.to_string(),
    })
}

#[async_trait]
impl Job for UnlaunchableJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn launch(&mut self, _ctx: &JobContext) -> Result<(), JobError> {
        Err(JobError::failed("connection refused"))
    }

    async fn run(&mut self, _ctx: JobContext) -> Result<(), JobError> {
        Ok(())
    }
}

/// A job whose launch step takes `delay` before succeeding.
pub struct SlowLaunchJob {
    name: String,
    delay: Duration,
}

pub fn slow_launch(name: &str, delay: Duration) -> Box<dyn Job> {
    Box::new(SlowLaunchJob {
        name: name.to_string(),
        delay,
    })
}

#[async_trait]
impl Job for SlowLaunchJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn launch(&mut self, _ctx: &JobContext) -> Result<(), JobError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn run(&mut self, ctx: JobContext) -> Result<(), JobError> {
        ctx.cancelled().await;
        Ok(())
    }
}
