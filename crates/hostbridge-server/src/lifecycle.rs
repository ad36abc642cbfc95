//! Structured reporting for server and supervisor lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hostbridge_config::Endpoint;

use crate::server::BridgeError;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked before the server binds.
    fn server_starting(&self, endpoint: &Endpoint);

    /// Invoked once the server accepts connections.
    fn server_started(&self, addr: SocketAddr);

    /// Invoked when a start attempt fails.
    fn server_start_failed(&self, error: &BridgeError);

    /// Invoked when a running server begins stopping.
    fn server_stopping(&self);

    /// Invoked once the server has stopped.
    fn server_stopped(&self);

    /// Invoked when the supervisor restarts an unhealthy server.
    fn restart_attempted(&self, reason: &str, restarts_used: u32, max_restarts: u32);

    /// Invoked when an unhealthy server cannot be restarted within budget.
    fn restart_budget_exhausted(&self, resets_in: Duration);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn server_starting(&self, endpoint: &Endpoint) {
        (**self).server_starting(endpoint);
    }

    fn server_started(&self, addr: SocketAddr) {
        (**self).server_started(addr);
    }

    fn server_start_failed(&self, error: &BridgeError) {
        (**self).server_start_failed(error);
    }

    fn server_stopping(&self) {
        (**self).server_stopping();
    }

    fn server_stopped(&self) {
        (**self).server_stopped();
    }

    fn restart_attempted(&self, reason: &str, restarts_used: u32, max_restarts: u32) {
        (**self).restart_attempted(reason, restarts_used, max_restarts);
    }

    fn restart_budget_exhausted(&self, resets_in: Duration) {
        (**self).restart_budget_exhausted(resets_in);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn server_starting(&self, endpoint: &Endpoint) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "server_starting",
            endpoint = %endpoint,
            "starting bridge server"
        );
    }

    fn server_started(&self, addr: SocketAddr) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "server_started",
            addr = %addr,
            "bridge server listening"
        );
    }

    fn server_start_failed(&self, error: &BridgeError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "server_start_failed",
            error = %error,
            "bridge server failed to start"
        );
    }

    fn server_stopping(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "server_stopping",
            "stopping bridge server"
        );
    }

    fn server_stopped(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "server_stopped",
            "bridge server stopped"
        );
    }

    fn restart_attempted(&self, reason: &str, restarts_used: u32, max_restarts: u32) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "restart_attempted",
            reason,
            restarts_used,
            max_restarts,
            "restarting bridge server"
        );
    }

    fn restart_budget_exhausted(&self, resets_in: Duration) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "restart_budget_exhausted",
            resets_in_secs = resets_in.as_secs(),
            "restart budget exhausted; server left unhealthy"
        );
    }
}
