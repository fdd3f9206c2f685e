//! Lifecycle orchestrator.
//!
//! # State Transitions
//! ```text
//! Idle → Starting → Running → Stopping → Stopped
//! Starting → Stopped: launch failure
//! Running → Stopping: first trigger (signal, stop call, job failure)
//! Running → Stopped: every job finished on its own
//! Stopping → Stopped: every job finished, or the grace period ran out
//! ```

use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::Config;
use crate::error::{BoxError, JobError, JobFailure, LifecycleError, TerminalFailure};
use crate::lifecycle::job::{Completion, Job, JobContext, JobExit, JobHandle, JobState, JobSummary};
use crate::lifecycle::shutdown::{Shutdown, Trigger};
use crate::lifecycle::signals::SignalGuard;
use crate::observability::{logging, metrics};

/// Grace period used when none is configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Where the orchestrator is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// An application: declares its jobs and optional setup/teardown hooks.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    fn name(&self) -> &str {
        "application"
    }

    /// The concurrent work this application performs, in start order.
    ///
    /// Called once per run, when the orchestrator starts.
    fn jobs(&self, config: &Config) -> Vec<Box<dyn Job>>;

    /// Runs before any job is launched.
    async fn setup(&self, _config: &Config) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after every job has stopped.
    async fn teardown(&self, _config: &Config) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every job finished or was cancelled within the grace period.
    Success,
    /// A job failed to launch or failed while running.
    Failed,
    /// At least one job was abandoned after the grace period.
    Degraded,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Degraded => "degraded",
        }
    }
}

/// Everything known about a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// What started the stop sequence.
    pub trigger: Option<Trigger>,
    /// The first failure, which decides the outcome.
    pub failure: Option<LifecycleError>,
    /// Failures observed after the first one.
    pub suppressed: Vec<JobFailure>,
    /// Jobs still running when the grace period ran out.
    pub abandoned: Vec<String>,
    /// Every job in declaration order.
    pub jobs: Vec<JobSummary>,
}

impl RunReport {
    pub fn outcome(&self) -> Outcome {
        if self.failure.is_some() {
            Outcome::Failed
        } else if !self.abandoned.is_empty() {
            Outcome::Degraded
        } else {
            Outcome::Success
        }
    }

    /// Whether the run was stopped by a signal or an explicit stop call.
    pub fn externally_requested(&self) -> bool {
        self.trigger.as_ref().is_some_and(Trigger::is_external)
    }
}

/// Owns the jobs of one application run and drives start, stop and wait.
pub struct Orchestrator<A: Application> {
    app: Arc<A>,
    config: Arc<Config>,
    grace_period: Duration,
    handle_signals: bool,
    force_exit_on_repeat: bool,
    extra_jobs: Vec<Box<dyn Job>>,
    shutdown: Shutdown,
    state: watch::Sender<LifecycleState>,
    jobs: Vec<JobHandle>,
    tasks: JoinSet<JobExit>,
    stop_deadline: Option<Instant>,
    stop_began: Option<Instant>,
    failure: Option<JobFailure>,
    terminal: Option<TerminalFailure>,
    suppressed: Vec<JobFailure>,
    abandoned: Vec<String>,
}

impl<A: Application> Orchestrator<A> {
    pub fn new(app: A, config: Arc<Config>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            app: Arc::new(app),
            config,
            grace_period: DEFAULT_GRACE_PERIOD,
            handle_signals: true,
            force_exit_on_repeat: true,
            extra_jobs: Vec::new(),
            shutdown: Shutdown::new(),
            state,
            jobs: Vec::new(),
            tasks: JoinSet::new(),
            stop_deadline: None,
            stop_began: None,
            failure: None,
            terminal: None,
            suppressed: Vec::new(),
            abandoned: Vec::new(),
        }
    }

    /// Time allowed for jobs to finish once cancelled.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Whether `run` installs the process-wide signal guard.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Whether a repeated termination signal exits the process immediately.
    pub fn force_exit_on_repeat(mut self, enabled: bool) -> Self {
        self.force_exit_on_repeat = enabled;
        self
    }

    /// Add a job supplied by the runtime rather than the application.
    /// Started after the application's own jobs.
    pub fn with_job(mut self, job: Box<dyn Job>) -> Self {
        self.extra_jobs.push(job);
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// A handle that can stop this run from anywhere.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Every job so far, in declaration order.
    pub fn job_summaries(&self) -> Vec<JobSummary> {
        self.jobs.iter().map(JobHandle::summary).collect()
    }

    fn set_state(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Lifecycle transition");
        }
    }

    /// Launch every job. Launch failures are collected; if any occur, the
    /// jobs already launched are cancelled and awaited before returning.
    ///
    /// A stop that arrives meanwhile interrupts the launch in progress and
    /// skips the jobs not yet launched.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if self.state() != LifecycleState::Idle {
            return Err(LifecycleError::AlreadyStarted);
        }
        self.shutdown.arm();
        self.set_state(LifecycleState::Starting);

        let mut declared = self.app.jobs(&self.config);
        declared.append(&mut self.extra_jobs);
        tracing::info!(app = %self.app.name(), jobs = declared.len(), "Starting jobs");

        let shutdown = self.shutdown.clone();
        let mut launch_failures = Vec::new();
        for mut job in declared {
            let name = job.name().to_string();
            if shutdown.is_triggered() {
                tracing::warn!(job = %name, "Stop requested during start, job not launched");
                self.jobs.push(JobHandle::skipped(name));
                continue;
            }

            let span = logging::job_span(&name);
            let ctx = JobContext::new(
                &name,
                shutdown.clone(),
                self.config.clone(),
                self.state.subscribe(),
            );

            // A stop must not wait on a slow launch.
            let launched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                result = job.launch(&ctx).instrument(span.clone()) => Some(result),
            };

            match launched {
                Some(Ok(())) => self.spawn(job, ctx, span),
                Some(Err(error)) => {
                    tracing::error!(job = %name, error = %error, "Job failed to launch");
                    self.jobs.push(JobHandle::not_launched(name.clone()));
                    launch_failures.push(JobFailure::new(name, error));
                }
                None => {
                    tracing::warn!(job = %name, "Stop requested during launch, job not launched");
                    self.jobs.push(JobHandle::skipped(name));
                }
            }
        }

        if !launch_failures.is_empty() {
            // Straight from starting to stopped: never publish `Stopping` here.
            self.shutdown.trigger(Trigger::LaunchFailed);
            self.cancel_all();
            self.drive().await;
            if let Some(failure) = self.failure.take() {
                self.suppressed.push(failure);
            }
            return Err(LifecycleError::Launch(launch_failures));
        }

        if !self.shutdown.is_triggered() {
            self.set_state(LifecycleState::Running);
        }
        Ok(())
    }

    fn spawn(&mut self, mut job: Box<dyn Job>, ctx: JobContext, span: tracing::Span) {
        let index = self.jobs.len();
        let name = job.name().to_string();
        self.jobs.push(JobHandle::running(name.clone(), ctx.token().clone()));
        metrics::record_job_started(&name);

        self.tasks.spawn(
            async move {
                tracing::debug!("Job running");
                let result = AssertUnwindSafe(job.run(ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(panic.as_ref()))));
                JobExit { index, result }
            }
            .instrument(span),
        );
    }

    /// Ask every job to stop. Idempotent; a no-op before `start`.
    pub fn stop(&self) {
        self.shutdown.request_stop();
    }

    /// Block until every job has finished.
    ///
    /// Returns the first job failure, if any; cancellations are not errors.
    /// Once a stop is triggered, waiting is bounded by the grace period.
    pub async fn wait(&mut self) -> Result<(), LifecycleError> {
        self.drive().await;
        if let Some(terminal) = self.terminal.take() {
            return Err(LifecycleError::Terminal(terminal));
        }
        match self.failure.take() {
            Some(failure) => Err(LifecycleError::Job(failure)),
            None => Ok(()),
        }
    }

    async fn drive(&mut self) {
        loop {
            let next = if self.shutdown.is_triggered() {
                let deadline = match self.stop_deadline {
                    Some(deadline) => deadline,
                    None => self.begin_stopping(),
                };
                match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.abandon_remaining();
                        break;
                    }
                }
            } else {
                tokio::select! {
                    next = self.tasks.join_next() => next,
                    _ = self.shutdown.cancelled() => continue,
                }
            };

            match next {
                None => break,
                Some(Ok(exit)) => {
                    if self.record_exit(exit) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Job task ended abnormally");
                }
            }
        }

        if self.tasks.is_empty() && !self.shutdown.is_triggered() {
            self.shutdown.trigger(Trigger::JobsCompleted);
        }
        self.set_state(LifecycleState::Stopped);
    }

    fn begin_stopping(&mut self) -> Instant {
        self.set_state(LifecycleState::Stopping);
        self.cancel_all()
    }

    /// Cancel every job and start the grace period. Returns its deadline.
    fn cancel_all(&mut self) -> Instant {
        let now = Instant::now();
        let deadline = now + self.grace_period;
        self.stop_began = Some(now);
        self.stop_deadline = Some(deadline);

        for handle in &self.jobs {
            handle.cancel();
        }
        tracing::info!(
            running = self.tasks.len(),
            grace_ms = self.grace_period.as_millis() as u64,
            "Stopping jobs"
        );
        deadline
    }

    /// Record how a job ended. Returns `true` when the run must end now.
    fn record_exit(&mut self, exit: JobExit) -> bool {
        let handle = &mut self.jobs[exit.index];
        let name = handle.name.clone();

        let completion = match exit.result {
            Ok(()) if handle.was_cancelled() => Completion::Cancelled,
            Ok(()) => Completion::Completed,
            Err(JobError::Cancelled) => Completion::Cancelled,
            Err(JobError::Terminal(terminal)) => {
                handle.state = JobState::Finished(Completion::Failed);
                metrics::record_job_finished(&name, Completion::Failed.as_str());
                tracing::error!(job = %name, error = %terminal, "Terminal failure, aborting run");
                self.shutdown.trigger(Trigger::Terminal(name));
                self.terminal = Some(terminal);
                self.abandon_remaining();
                return true;
            }
            Err(error) => {
                handle.state = JobState::Finished(Completion::Failed);
                metrics::record_job_finished(&name, Completion::Failed.as_str());
                self.record_failure(JobFailure::new(name, error));
                return false;
            }
        };

        handle.state = JobState::Finished(completion);
        metrics::record_job_finished(&name, completion.as_str());
        tracing::info!(job = %name, completion = completion.as_str(), "Job finished");
        false
    }

    fn record_failure(&mut self, failure: JobFailure) {
        if self.failure.is_some() || self.terminal.is_some() {
            tracing::warn!(job = %failure.job, error = %failure.error, "Suppressed job failure");
            self.suppressed.push(failure);
            return;
        }
        tracing::error!(job = %failure.job, error = %failure.error, "Job failed");
        self.shutdown.trigger(Trigger::JobFailed(failure.job.clone()));
        self.failure = Some(failure);
    }

    /// Give up on every job still running; dropping the set aborts them.
    fn abandon_remaining(&mut self) {
        for handle in &mut self.jobs {
            if handle.state == JobState::Running {
                handle.cancel();
                handle.state = JobState::Abandoned;
                self.abandoned.push(handle.name.clone());
            }
        }
        if !self.abandoned.is_empty() {
            tracing::warn!(jobs = ?self.abandoned, "Abandoning jobs that did not stop in time");
        }
        drop(std::mem::take(&mut self.tasks));
    }

    /// Run the application: setup, start, wait for a trigger, stop,
    /// wait within the grace period, teardown.
    ///
    /// Job failures are recovered into the report; only a terminal failure
    /// is returned as an error.
    pub async fn run(mut self) -> Result<RunReport, TerminalFailure> {
        self.shutdown.arm();

        let guard = if self.handle_signals {
            let shutdown = self.shutdown.clone();
            let installed = SignalGuard::install_with(
                move |kind| {
                    shutdown.trigger(Trigger::Signal(kind));
                },
                self.force_exit_on_repeat,
            );
            match installed {
                Ok(guard) => Some(guard),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install signal handlers");
                    self.set_state(LifecycleState::Stopped);
                    return Ok(self.finish(Some(LifecycleError::Signal(e))));
                }
            }
        } else {
            None
        };

        let app = self.app.clone();
        let config = self.config.clone();

        if let Err(source) = shielded(guard.as_ref(), app.setup(&config)).await {
            tracing::error!(error = %source, "Application setup failed");
            self.set_state(LifecycleState::Stopped);
            return Ok(self.finish(Some(LifecycleError::Hook { hook: "setup", source })));
        }

        let mut failure = match self.start().await {
            Err(e) => Some(e),
            Ok(()) => {
                tracing::info!("Application running");
                match self.wait().await {
                    Ok(()) => None,
                    Err(LifecycleError::Terminal(terminal)) => return Err(terminal),
                    Err(e) => Some(e),
                }
            }
        };
        if let Some(terminal) = self.terminal.take() {
            return Err(terminal);
        }

        if let Err(source) = shielded(guard.as_ref(), app.teardown(&config)).await {
            tracing::error!(error = %source, "Application teardown failed");
            if failure.is_none() {
                failure = Some(LifecycleError::Hook { hook: "teardown", source });
            }
        }

        drop(guard);
        Ok(self.finish(failure))
    }

    fn finish(mut self, failure: Option<LifecycleError>) -> RunReport {
        let report = RunReport {
            trigger: self.shutdown.reason(),
            failure,
            suppressed: std::mem::take(&mut self.suppressed),
            abandoned: std::mem::take(&mut self.abandoned),
            jobs: self.job_summaries(),
        };

        let elapsed = self.stop_began.map(|t| t.elapsed()).unwrap_or_default();
        metrics::record_shutdown(report.outcome().as_str(), elapsed);

        match &report.failure {
            Some(failure) => tracing::error!(
                outcome = report.outcome().as_str(),
                trigger = ?report.trigger,
                error = %failure,
                "Application stopped"
            ),
            None => tracing::info!(
                outcome = report.outcome().as_str(),
                trigger = ?report.trigger,
                abandoned = report.abandoned.len(),
                "Application stopped"
            ),
        }
        report
    }
}

/// Run `fut` with SIGINT deferred when a guard is installed.
async fn shielded<F: Future>(guard: Option<&SignalGuard>, fut: F) -> F::Output {
    match guard {
        Some(guard) => guard.defer_during(fut).await,
        None => fut.await,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
