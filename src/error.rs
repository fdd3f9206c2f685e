//! Error taxonomy for the application runtime.
//!
//! Job-level errors never escape the orchestrator; they are collected into a
//! [`RunReport`](crate::lifecycle::RunReport). Only [`TerminalFailure`] is
//! propagated past `Orchestrator::run` to the entrypoint.

use thiserror::Error;

/// Boxed error used as the cause of job failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An unrecoverable condition that becomes the final outcome of a run.
#[derive(Debug, Error)]
#[error("terminal failure: {message}")]
pub struct TerminalFailure {
    message: String,
    #[source]
    cause: Option<BoxError>,
}

impl TerminalFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the originating cause.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// How a single job ended when it did not complete normally.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job stopped because it was asked to. Not a failure.
    #[error("job cancelled")]
    Cancelled,

    /// The job's work raised an error.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// The job hit a condition that must end the whole process.
    #[error(transparent)]
    Terminal(#[from] TerminalFailure),

    /// The job's task panicked.
    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Wrap any error as a job runtime failure.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        JobError::Failed(error.into())
    }

    /// Build a terminal failure from a message.
    pub fn terminal(message: impl Into<String>) -> Self {
        JobError::Terminal(TerminalFailure::new(message))
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

/// A job error tagged with the job that produced it.
#[derive(Debug, Error)]
#[error("job `{job}` failed: {error}")]
pub struct JobFailure {
    pub job: String,
    #[source]
    pub error: JobError,
}

impl JobFailure {
    pub fn new(job: impl Into<String>, error: JobError) -> Self {
        Self {
            job: job.into(),
            error,
        }
    }
}

/// Errors reported by the orchestrator's lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// One or more jobs could not be launched.
    #[error("failed to launch {} job(s): {}", .0.len(), join_failures(.0))]
    Launch(Vec<JobFailure>),

    /// A job failed after it started.
    #[error(transparent)]
    Job(JobFailure),

    /// A job raised a terminal failure.
    #[error(transparent)]
    Terminal(TerminalFailure),

    /// `start` was called more than once.
    #[error("orchestrator already started")]
    AlreadyStarted,

    /// OS signal handling could not be set up.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// An application hook failed.
    #[error("application {hook} failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Errors raised while installing the signal guard.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Another guard is active in this process.
    #[error("a signal guard is already installed in this process")]
    AlreadyInstalled,

    /// The OS refused the handler registration.
    #[error("failed to register signal handler: {0}")]
    Register(#[from] std::io::Error),
}

fn join_failures(failures: &[JobFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
