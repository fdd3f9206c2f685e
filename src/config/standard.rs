//! Entries shared by every application built on the runtime.

use crate::config::schema::{CliEntry, ConfigEntry};
use crate::observability::logging::{format_choices, level_choices};

pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const LOG_FORMAT: &str = "LOG_FORMAT";
pub const DUMP_CONFIG: &str = "DUMP_CONFIG";
pub const GRACE_PERIOD_MS: &str = "GRACE_PERIOD_MS";
pub const HEALTH_CHECK: &str = "HEALTH_CHECK";
pub const HEALTH_CHECK_PORT: &str = "HEALTH_CHECK_PORT";
pub const METRICS_ADDRESS: &str = "METRICS_ADDRESS";

/// Default shutdown grace period in milliseconds.
pub const DEFAULT_GRACE_PERIOD_MS: i64 = 5_000;

/// The standard entries: logging, config dump, shutdown grace, health check
/// and metrics exporter.
pub fn standard_entries() -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new(LOG_LEVEL, "info")
            .help("Log level")
            .cli(CliEntry::new("log-level").short('l').choices(level_choices())),
        ConfigEntry::new(LOG_FORMAT, "text")
            .help("The format of the log messages")
            .cli(CliEntry::new("log-format").short('f').choices(format_choices())),
        ConfigEntry::new(DUMP_CONFIG, false)
            .help("Dump the actual configuration parameters of the application")
            .cli(CliEntry::new("dump-config").short('d').switch()),
        ConfigEntry::new(GRACE_PERIOD_MS, DEFAULT_GRACE_PERIOD_MS)
            .help("Time allowed for jobs to stop after cancellation, in milliseconds")
            .cli(CliEntry::new("grace-period-ms").short('g')),
        ConfigEntry::new(HEALTH_CHECK, false)
            .help("Run the health check web service with a '/health' endpoint")
            .cli(CliEntry::new("health-check").short('H').switch()),
        ConfigEntry::new(HEALTH_CHECK_PORT, 8008i64)
            .help("Port number of the health check web service")
            .cli(CliEntry::new("health-check-port")),
        ConfigEntry::new(METRICS_ADDRESS, "")
            .help("Bind address of the Prometheus metrics exporter (disabled when empty)")
            .cli(CliEntry::new("metrics-address")),
    ]
}

/// Standard entries followed by the application's own.
pub fn with_standard_entries(entries: Vec<ConfigEntry>) -> Vec<ConfigEntry> {
    let mut all = standard_entries();
    all.extend(entries);
    all
}
