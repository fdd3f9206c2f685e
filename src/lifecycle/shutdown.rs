//! Shutdown coordination.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::lifecycle::signals::SignalKind;

/// What started the stop sequence of a run. Recorded at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// An OS termination signal.
    Signal(SignalKind),
    /// An explicit stop call, from outside or from a job.
    StopRequested,
    /// A job failed after it started.
    JobFailed(String),
    /// A job raised a terminal failure.
    Terminal(String),
    /// A job could not be launched.
    LaunchFailed,
    /// Every job finished on its own.
    JobsCompleted,
}

impl Trigger {
    /// Whether the stop came from outside the application's own jobs.
    pub fn is_external(&self) -> bool {
        matches!(self, Trigger::Signal(_) | Trigger::StopRequested)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Signal(kind) => write!(f, "signal {}", kind),
            Trigger::StopRequested => f.write_str("stop requested"),
            Trigger::JobFailed(job) => write!(f, "job `{}` failed", job),
            Trigger::Terminal(job) => write!(f, "terminal failure in job `{}`", job),
            Trigger::LaunchFailed => f.write_str("launch failure"),
            Trigger::JobsCompleted => f.write_str("all jobs completed"),
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// Cloned into every job context and into the signal guard. The first
/// trigger wins; later ones are ignored. Cancelling is a broadcast: every
/// job holds a child of the root token.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    trigger: Arc<OnceLock<Trigger>>,
    armed: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new, unarmed shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable triggering. Before this, triggers are no-ops.
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Record `trigger` and cancel every job, unless a trigger was
    /// already recorded. Returns whether this call won.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        if !self.armed.load(Ordering::SeqCst) {
            tracing::debug!(%trigger, "Ignoring stop trigger before start");
            return false;
        }
        let label = trigger.to_string();
        if self.trigger.set(trigger).is_err() {
            tracing::debug!(trigger = %label, "Stop already in progress, trigger coalesced");
            return false;
        }
        tracing::info!(trigger = %label, "Stop sequence triggered");
        self.token.cancel();
        true
    }

    /// Ask the whole application to stop.
    pub fn request_stop(&self) -> bool {
        self.trigger(Trigger::StopRequested)
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger.get().is_some()
    }

    /// The winning trigger, if any.
    pub fn reason(&self) -> Option<Trigger> {
        self.trigger.get().cloned()
    }

    /// Completes once a trigger has been recorded.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A token cancelled together with this coordinator.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
