//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! declared ConfigEntry list
//!     → validation.rs (duplicate names/flags, typed defaults, choices)
//!     → loader.rs: defaults, then .env + environment, then CLI (clap)
//!     → Config (resolved, immutable)
//!     → shared via Arc with the orchestrator and every job
//! ```
//!
//! # Design Decisions
//! - Precedence ascending: default < environment < command line
//! - The CLI parser is built at runtime from the entries, not derived
//! - Config is immutable once resolved; no reload

pub mod loader;
pub mod schema;
pub mod standard;
pub mod validation;

pub use loader::{Config, ConfigError};
pub use schema::{CliAction, CliEntry, ConfigEntry, Value, ValueType};
pub use standard::{standard_entries, with_standard_entries};
