//! Service health state.
//!
//! # States
//! - NoInfo: nothing known yet
//! - WarmUp: starting, not ready for work
//! - Work: running
//! - ShutDown: stopping
//! - Stop: stopped
//!
//! # State Transitions
//! ```text
//! Follows the orchestrator by default:
//! Idle → NoInfo, Starting → WarmUp, Running → Work,
//! Stopping → ShutDown, Stopped → Stop
//! ```
//!
//! # Design Decisions
//! - A manual override is kept in an atomic; 0 means "follow the lifecycle"
//! - The HTTP status is derived from the state, never stored

use axum::http::StatusCode;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use crate::lifecycle::LifecycleState;

/// Health state of the service.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NoInfo = 1,
    WarmUp = 2,
    Work = 3,
    ShutDown = 4,
    Stop = 5,
}

impl From<u8> for ServiceState {
    fn from(val: u8) -> Self {
        match val {
            2 => ServiceState::WarmUp,
            3 => ServiceState::Work,
            4 => ServiceState::ShutDown,
            5 => ServiceState::Stop,
            _ => ServiceState::NoInfo,
        }
    }
}

impl From<LifecycleState> for ServiceState {
    fn from(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Idle => ServiceState::NoInfo,
            LifecycleState::Starting => ServiceState::WarmUp,
            LifecycleState::Running => ServiceState::Work,
            LifecycleState::Stopping => ServiceState::ShutDown,
            LifecycleState::Stopped => ServiceState::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Pass,
    Warn,
    Fail,
}

/// Body of the `/health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub notes: String,
    pub description: String,
}

impl ServiceState {
    /// HTTP status and body reported for this state.
    pub fn report(self, service_name: &str) -> (StatusCode, HealthReport) {
        let (code, status, notes) = match self {
            ServiceState::Work => (StatusCode::OK, HealthStatus::Pass, "Service is running"),
            ServiceState::WarmUp | ServiceState::ShutDown => (
                StatusCode::NON_AUTHORITATIVE_INFORMATION,
                HealthStatus::Warn,
                "Service is not healthy, it is warming up or shutting down",
            ),
            ServiceState::Stop => (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthStatus::Fail,
                "Service is not running",
            ),
            ServiceState::NoInfo => (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthStatus::Fail,
                "No information about the service",
            ),
        };
        let report = HealthReport {
            status,
            notes: notes.to_string(),
            description: format!("Health state of '{}' microservice", service_name),
        };
        (code, report)
    }
}

/// Shared health state of one service.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Manual override (0 = follow the lifecycle).
    manual: AtomicU8,
    local_addr: OnceLock<SocketAddr>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the reported state, ignoring the lifecycle.
    pub fn set(&self, state: ServiceState) {
        self.manual.store(state as u8, Ordering::Relaxed);
        tracing::debug!(state = ?state, "Health state overridden");
    }

    /// Go back to following the lifecycle.
    pub fn clear(&self) {
        self.manual.store(0, Ordering::Relaxed);
    }

    /// The state to report given the current lifecycle state.
    pub fn current(&self, lifecycle: LifecycleState) -> ServiceState {
        match self.manual.load(Ordering::Relaxed) {
            0 => lifecycle.into(),
            manual => manual.into(),
        }
    }

    /// Address the health endpoint is bound to, once launched.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub(crate) fn set_local_addr(&self, addr: SocketAddr) {
        let _ = self.local_addr.set(addr);
    }
}
