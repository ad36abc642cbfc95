//! Background thread driving supervisor ticks.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::SUPERVISOR_TARGET;
use super::restart::{ManagedServer, RestartSupervisor, SupervisorStatus};
use crate::server::BridgeError;

type Shared<S> = Arc<Mutex<RestartSupervisor<S>>>;

fn lock<S>(shared: &Shared<S>) -> MutexGuard<'_, RestartSupervisor<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: ManagedServer + 'static> RestartSupervisor<S> {
    /// Moves the supervisor onto a monitor thread that ticks after the
    /// configured initial delay and then at the configured interval.
    ///
    /// The returned handle keeps operator access to the supervisor while the
    /// thread runs. Hosts with their own timer call
    /// [`RestartSupervisor::tick`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error when the thread cannot be spawned.
    pub fn spawn_monitor(self) -> io::Result<MonitorHandle<S>> {
        let initial_delay = self.config().initial_delay();
        let interval = self.config().interval();
        let shared = Arc::new(Mutex::new(self));
        let ticking = Arc::clone(&shared);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("hostbridge-monitor".to_owned())
            .spawn(move || {
                let mut wait = initial_delay;
                loop {
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            lock(&ticking).tick();
                            wait = interval;
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(target: SUPERVISOR_TARGET, "monitor thread exiting");
            })?;
        Ok(MonitorHandle {
            supervisor: shared,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Owns a running monitor thread and shares its supervisor.
///
/// Operator calls wait for any tick in progress. Dropping the handle signals
/// the thread to exit without waiting for it.
#[derive(Debug)]
pub struct MonitorHandle<S> {
    supervisor: Shared<S>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl<S: ManagedServer> MonitorHandle<S> {
    /// Returns true while the monitor thread runs.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Current monitoring state and budget.
    pub fn status(&self) -> SupervisorStatus {
        lock(&self.supervisor).status()
    }

    /// See [`RestartSupervisor::restart_now`].
    ///
    /// # Errors
    ///
    /// Returns the start failure.
    pub fn restart_now(&self) -> Result<(), BridgeError> {
        lock(&self.supervisor).restart_now()
    }

    /// See [`RestartSupervisor::emergency_stop`]. The thread keeps running
    /// and its ticks report [`super::SupervisorAction::NotMonitoring`].
    pub fn emergency_stop(&self) {
        lock(&self.supervisor).emergency_stop();
    }

    /// See [`RestartSupervisor::resume_monitoring`].
    pub fn resume_monitoring(&self) {
        lock(&self.supervisor).resume_monitoring();
    }

    /// Stops the monitor and hands the supervisor back.
    ///
    /// Returns `None` if the monitor thread panicked.
    pub fn stop(mut self) -> Option<RestartSupervisor<S>> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let thread = self.thread.take()?;
        if thread.join().is_err() {
            warn!(target: SUPERVISOR_TARGET, "monitor thread panicked");
            return None;
        }
        let shared = Arc::clone(&self.supervisor);
        drop(self);
        Arc::try_unwrap(shared)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<S> Drop for MonitorHandle<S> {
    fn drop(&mut self) {
        self.stop_tx.take();
    }
}
