//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator and jobs produce:
//!     → logging.rs (structured log events, one span per job)
//!     → metrics.rs (job and shutdown counters)
//!
//! Consumers:
//!     → stderr (text or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Job name flows through all log lines via its span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{init_logger, LogFormat, LogLevel};
