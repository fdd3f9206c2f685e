//! Process entrypoint.
//!
//! # Exit Codes
//! - 0: every job finished or was cancelled in time
//! - 1: a job failed to launch or failed while running
//! - 2: degraded shutdown, some job outlived the grace period
//! - 3: terminal failure (message on stderr)
//! - 64: invalid configuration or command line

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::config::standard::{
    self, DUMP_CONFIG, GRACE_PERIOD_MS, HEALTH_CHECK, HEALTH_CHECK_PORT, LOG_FORMAT, LOG_LEVEL,
    METRICS_ADDRESS,
};
use crate::config::{Config, ConfigEntry, ConfigError};
use crate::error::TerminalFailure;
use crate::health::HealthCheckJob;
use crate::lifecycle::orchestrator::{Application, Orchestrator, Outcome, RunReport};
use crate::observability::{init_logger, metrics, LogFormat, LogLevel};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DEGRADED: u8 = 2;
pub const EXIT_TERMINAL: u8 = 3;
pub const EXIT_USAGE: u8 = 64;

/// Map the result of a run to a process exit code.
pub fn exit_code(result: &Result<RunReport, TerminalFailure>) -> u8 {
    match result {
        Err(_) => EXIT_TERMINAL,
        Ok(report) => match report.outcome() {
            Outcome::Success => EXIT_SUCCESS,
            Outcome::Failed => EXIT_FAILURE,
            Outcome::Degraded => EXIT_DEGRADED,
        },
    }
}

/// How long the runtime may keep blocking work alive once the run is over.
/// Abandoned jobs can hold blocking threads that never return.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Resolve configuration from `entries` plus the standard ones, set up
/// logging and metrics, then run the application built by `factory`.
///
/// `argv` excludes the program name.
pub fn application_entrypoint<A, F, I, T>(
    app_name: &str,
    description: &str,
    entries: Vec<ConfigEntry>,
    argv: I,
    factory: F,
) -> ExitCode
where
    A: Application,
    F: FnOnce(&Config) -> A,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    ExitCode::from(run_application(app_name, description, entries, argv, factory))
}

/// Same as [`application_entrypoint`], returning the raw exit code.
pub fn run_application<A, F, I, T>(
    app_name: &str,
    description: &str,
    entries: Vec<ConfigEntry>,
    argv: I,
    factory: F,
) -> u8
where
    A: Application,
    F: FnOnce(&Config) -> A,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = match resolve_config(app_name, description, entries, argv) {
        Ok(config) => config,
        Err(ConfigError::Cli(e)) => {
            let _ = e.print();
            return if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
        }
        Err(e) => {
            eprintln!("{}: {}", app_name, e);
            return EXIT_USAGE;
        }
    };

    let level = config
        .get_str(LOG_LEVEL)
        .ok()
        .and_then(LogLevel::parse)
        .unwrap_or_default();
    let format = config
        .get_str(LOG_FORMAT)
        .ok()
        .and_then(LogFormat::parse)
        .unwrap_or_default();
    init_logger(level, format);

    if config.get_bool(DUMP_CONFIG).unwrap_or(false) {
        config.log_dump();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: failed to start async runtime: {}", app_name, e);
            return EXIT_FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        start_metrics(&config);

        let app = factory(&config);
        let grace_period = grace_period(&config);
        let health = health_check_job(&config);

        let mut orchestrator = Orchestrator::new(app, Arc::new(config)).grace_period(grace_period);
        if let Some(job) = health {
            orchestrator = orchestrator.with_job(Box::new(job));
        }
        orchestrator.run().await
    });
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if let Err(terminal) = &result {
        eprintln!("{}: {}", app_name, terminal);
    }
    exit_code(&result)
}

fn resolve_config<I, T>(
    app_name: &str,
    description: &str,
    entries: Vec<ConfigEntry>,
    argv: I,
) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut config = Config::new(app_name, description, standard::with_standard_entries(entries))?;
    config.apply_cli_args(argv)?;
    Ok(config)
}

fn grace_period(config: &Config) -> Duration {
    let millis = config
        .get_int(GRACE_PERIOD_MS)
        .unwrap_or(standard::DEFAULT_GRACE_PERIOD_MS);
    Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

fn start_metrics(config: &Config) {
    let address = config.get_str(METRICS_ADDRESS).unwrap_or_default();
    if address.is_empty() {
        return;
    }
    match address.parse() {
        Ok(addr) => {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics exporter");
            }
        }
        Err(e) => tracing::error!(address = %address, error = %e, "Invalid metrics address"),
    }
}

fn health_check_job(config: &Config) -> Option<HealthCheckJob> {
    if !config.get_bool(HEALTH_CHECK).unwrap_or(false) {
        return None;
    }
    let port = config.get_int(HEALTH_CHECK_PORT).unwrap_or(8008);
    match u16::try_from(port) {
        Ok(port) => Some(HealthCheckJob::new(config.app_name(), port)),
        Err(_) => {
            tracing::error!(port, "Health check port out of range, endpoint disabled");
            None
        }
    }
}
