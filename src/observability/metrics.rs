//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_jobs_started_total` (counter): jobs launched
//! - `lifecycle_jobs_finished_total` (counter): jobs finished, by job and completion
//! - `lifecycle_shutdowns_total` (counter): runs finished, by outcome
//! - `lifecycle_shutdown_duration_seconds` (histogram): stop request to stopped
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in via `METRICS_ADDRESS`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_job_started(job: &str) {
    counter!("lifecycle_jobs_started_total", "job" => job.to_string()).increment(1);
}

pub fn record_job_finished(job: &str, completion: &'static str) {
    counter!(
        "lifecycle_jobs_finished_total",
        "job" => job.to_string(),
        "completion" => completion
    )
    .increment(1);
}

pub fn record_shutdown(outcome: &'static str, elapsed: Duration) {
    counter!("lifecycle_shutdowns_total", "outcome" => outcome).increment(1);
    histogram!("lifecycle_shutdown_duration_seconds").record(elapsed.as_secs_f64());
}
