//! Health check web service.
//!
//! # Responsibilities
//! - Bind the health port during launch (a bind error is a launch failure)
//! - Serve `GET /health` from the shared [`HealthState`]
//! - Stop accepting when the job is cancelled

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::JobError;
use crate::health::state::{HealthReport, HealthState};
use crate::lifecycle::{Job, JobContext, LifecycleState};

/// Job name used in logs and reports.
pub const HEALTH_JOB_NAME: &str = "health-check";

#[derive(Clone)]
struct HealthContext {
    service_name: Arc<str>,
    health: Arc<HealthState>,
    lifecycle: watch::Receiver<LifecycleState>,
}

async fn health_handler(State(ctx): State<HealthContext>) -> (StatusCode, Json<HealthReport>) {
    let lifecycle = *ctx.lifecycle.borrow();
    let (code, report) = ctx.health.current(lifecycle).report(&ctx.service_name);
    (code, Json(report))
}

/// Serves the `/health` endpoint for as long as the application runs.
pub struct HealthCheckJob {
    service_name: Arc<str>,
    bind_addr: SocketAddr,
    health: Arc<HealthState>,
    listener: Option<TcpListener>,
}

impl HealthCheckJob {
    /// Listen on all interfaces at `port`; 0 picks a free port.
    pub fn new(service_name: &str, port: u16) -> Self {
        Self::bind_to(service_name, SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
    }

    pub fn bind_to(service_name: &str, bind_addr: SocketAddr) -> Self {
        Self {
            service_name: Arc::from(service_name),
            bind_addr,
            health: Arc::new(HealthState::new()),
            listener: None,
        }
    }

    /// Shared state: override the reported state or read the bound address.
    pub fn health(&self) -> Arc<HealthState> {
        self.health.clone()
    }
}

#[async_trait]
impl Job for HealthCheckJob {
    fn name(&self) -> &str {
        HEALTH_JOB_NAME
    }

    async fn launch(&mut self, _ctx: &JobContext) -> Result<(), JobError> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(JobError::failed)?;
        let addr = listener.local_addr().map_err(JobError::failed)?;
        self.health.set_local_addr(addr);
        self.listener = Some(listener);
        tracing::info!(address = %addr, "Health check endpoint bound");
        Ok(())
    }

    async fn run(&mut self, ctx: JobContext) -> Result<(), JobError> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(JobError::failed("health check listener not bound")),
        };

        let app = Router::new()
            .route("/health", get(health_handler))
            .with_state(HealthContext {
                service_name: self.service_name.clone(),
                health: self.health.clone(),
                lifecycle: ctx.lifecycle(),
            });

        let token = ctx.token().clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(JobError::failed)?;

        tracing::info!("Health check endpoint stopped");
        Ok(())
    }
}
