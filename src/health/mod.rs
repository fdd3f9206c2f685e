//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator lifecycle (watch channel)
//!     → state.rs maps it to a service state (unless overridden)
//!     → server.rs answers GET /health with status code + JSON report
//! ```
//!
//! # Design Decisions
//! - The endpoint is an ordinary job, so it starts and stops with the rest
//! - Enabled by the `HEALTH_CHECK` configuration entry

pub mod server;
pub mod state;

pub use server::{HealthCheckJob, HEALTH_JOB_NAME};
pub use state::{HealthReport, HealthState, HealthStatus, ServiceState};
