//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use hostbridge_config::Endpoint;

use crate::lifecycle::LifecycleReporter;
use crate::server::BridgeError;

/// Lifecycle events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ServerStarting,
    ServerStarted,
    ServerStartFailed(String),
    ServerStopping,
    ServerStopped,
    RestartAttempted {
        reason: String,
        restarts_used: u32,
        max_restarts: u32,
    },
    RestartBudgetExhausted,
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn server_starting(&self, _endpoint: &Endpoint) {
        self.record(LifecycleEvent::ServerStarting);
    }

    fn server_started(&self, _addr: SocketAddr) {
        self.record(LifecycleEvent::ServerStarted);
    }

    fn server_start_failed(&self, error: &BridgeError) {
        self.record(LifecycleEvent::ServerStartFailed(error.to_string()));
    }

    fn server_stopping(&self) {
        self.record(LifecycleEvent::ServerStopping);
    }

    fn server_stopped(&self) {
        self.record(LifecycleEvent::ServerStopped);
    }

    fn restart_attempted(&self, reason: &str, restarts_used: u32, max_restarts: u32) {
        self.record(LifecycleEvent::RestartAttempted {
            reason: reason.to_owned(),
            restarts_used,
            max_restarts,
        });
    }

    fn restart_budget_exhausted(&self, _resets_in: Duration) {
        self.record(LifecycleEvent::RestartBudgetExhausted);
    }
}
