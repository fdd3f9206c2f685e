//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Entrypoint (entrypoint.rs):
//!     Resolve config → Init logging/metrics → Orchestrator::run → Exit code
//!
//! Orchestrator (orchestrator.rs):
//!     setup → launch jobs → wait for trigger → cancel → wait (grace) → teardown
//!
//! Shutdown (shutdown.rs):
//!     Signal / stop call / job failure → first trigger wins → cancel root token
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown (SIGINT deferred in hooks)
//! ```
//!
//! # Design Decisions
//! - Jobs run concurrently on a JoinSet; completions observed in any order
//! - Cancellation is cooperative; the grace period bounds the wait
//! - Jobs still running after the grace period are abandoned, not awaited

pub mod entrypoint;
pub mod job;
pub mod orchestrator;
pub mod shutdown;
pub mod signals;

pub use entrypoint::{application_entrypoint, exit_code, run_application};
pub use job::{job_fn, Completion, FnJob, Job, JobContext, JobState, JobSummary};
pub use orchestrator::{Application, LifecycleState, Orchestrator, Outcome, RunReport};
pub use shutdown::{Shutdown, Trigger};
pub use signals::{SignalGuard, SignalKind};
