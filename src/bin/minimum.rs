//! The smallest application: one job that idles until the process is told
//! to stop.

use app_runtime::config::Config;
use app_runtime::{application_entrypoint, job_fn, Application, Job, JobContext, JobError};
use std::process::ExitCode;

struct Minimum;

impl Application for Minimum {
    fn name(&self) -> &str {
        "minimum"
    }

    fn jobs(&self, _config: &Config) -> Vec<Box<dyn Job>> {
        vec![Box::new(job_fn("idle", |ctx: JobContext| async move {
            tracing::info!("Waiting for a termination signal");
            ctx.cancelled().await;
            Ok::<_, JobError>(())
        })) as Box<dyn Job>]
    }
}

fn main() -> ExitCode {
    application_entrypoint(
        "minimum",
        "Bare-minimum application",
        Vec::new(),
        std::env::args_os().skip(1),
        |_config| Minimum,
    )
}
