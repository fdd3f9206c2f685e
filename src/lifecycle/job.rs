//! Job abstraction.
//!
//! A job is a unit of concurrent work. It gets a [`JobContext`] carrying a
//! cancellation token, must observe cancellation at its yield points, and
//! reports how it ended through its `Result`.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::config::Config;
use crate::error::JobError;
use crate::lifecycle::orchestrator::LifecycleState;
use crate::lifecycle::shutdown::Shutdown;

/// A unit of concurrent work owned by the orchestrator.
#[async_trait]
pub trait Job: Send + 'static {
    /// Name used in logs, metrics and reports.
    fn name(&self) -> &str;

    /// Acquire whatever the job needs before running (bind sockets, open
    /// connections). A failure here is a launch failure.
    async fn launch(&mut self, _ctx: &JobContext) -> Result<(), JobError> {
        Ok(())
    }

    /// Do the work. Must return soon after `ctx` is cancelled.
    async fn run(&mut self, ctx: JobContext) -> Result<(), JobError>;
}

/// Everything a running job may use. Cheap to clone.
#[derive(Clone)]
pub struct JobContext {
    name: Arc<str>,
    token: CancellationToken,
    shutdown: Shutdown,
    config: Arc<Config>,
    lifecycle: watch::Receiver<LifecycleState>,
}

impl JobContext {
    pub(crate) fn new(
        name: &str,
        shutdown: Shutdown,
        config: Arc<Config>,
        lifecycle: watch::Receiver<LifecycleState>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            token: shutdown.child_token(),
            shutdown,
            config,
            lifecycle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the job is asked to stop.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Ask the whole application to stop in an orderly way.
    pub fn request_stop(&self) {
        tracing::info!(job = %self.name, "Job requested application stop");
        self.shutdown.request_stop();
    }

    /// Observe the orchestrator's lifecycle state.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.clone()
    }

    /// Sleep as a cancellable yield point.
    pub async fn sleep(&self, duration: Duration) -> Result<(), JobError> {
        self.run_until_cancelled(tokio::time::sleep(duration)).await
    }

    /// Await `fut` unless the job is cancelled first.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Result<F::Output, JobError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(JobError::Cancelled),
            output = fut => Ok(output),
        }
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A job built from a closure.
pub struct FnJob<F> {
    name: String,
    f: Option<F>,
}

/// Wrap an async closure as a [`Job`].
pub fn job_fn<F, Fut>(name: impl Into<String>, f: F) -> FnJob<F>
where
    F: FnOnce(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    FnJob {
        name: name.into(),
        f: Some(f),
    }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: FnOnce(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, ctx: JobContext) -> Result<(), JobError> {
        match self.f.take() {
            Some(f) => f(ctx).await,
            None => Ok(()),
        }
    }
}

/// How a finished job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Returned on its own.
    Completed,
    /// Ended because it was asked to.
    Cancelled,
    /// Returned an error or panicked.
    Failed,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Completed => "completed",
            Completion::Cancelled => "cancelled",
            Completion::Failed => "failed",
        }
    }
}

/// Where a job is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Launch failed; never ran.
    NotLaunched,
    /// A stop arrived before or during launch; never ran.
    Skipped,
    Running,
    Finished(Completion),
    /// Still running when the grace period ran out.
    Abandoned,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Orchestrator-side record of a job, kept in declaration order.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub name: String,
    pub state: JobState,
}

/// Orchestrator-side handle: cancel and observe one job.
pub(crate) struct JobHandle {
    pub(crate) name: String,
    pub(crate) token: Option<CancellationToken>,
    pub(crate) state: JobState,
}

impl JobHandle {
    pub(crate) fn running(name: String, token: CancellationToken) -> Self {
        Self {
            name,
            token: Some(token),
            state: JobState::Running,
        }
    }

    pub(crate) fn not_launched(name: String) -> Self {
        Self {
            name,
            token: None,
            state: JobState::NotLaunched,
        }
    }

    pub(crate) fn skipped(name: String) -> Self {
        Self {
            name,
            token: None,
            state: JobState::Skipped,
        }
    }

    /// Request cooperative termination. Never blocks; safe after finish.
    pub(crate) fn cancel(&self) {
        if let Some(token) = &self.token {
            token.cancel();
        }
    }

    pub(crate) fn was_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }

    pub(crate) fn summary(&self) -> JobSummary {
        JobSummary {
            name: self.name.clone(),
            state: self.state,
        }
    }
}

/// What a job's task yields when it ends.
pub(crate) struct JobExit {
    pub(crate) index: usize,
    pub(crate) result: Result<(), JobError>,
}
