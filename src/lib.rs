//! Application lifecycle runtime library.

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::{CliEntry, Config, ConfigEntry, Value, ValueType};
pub use error::{BoxError, JobError, JobFailure, LifecycleError, TerminalFailure};
pub use lifecycle::{
    application_entrypoint, job_fn, Application, Job, JobContext, Orchestrator, Outcome, RunReport,
    Shutdown, SignalGuard,
};
