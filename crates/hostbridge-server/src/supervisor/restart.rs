//! Liveness checks and budgeted restarts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use hostbridge_config::SupervisorConfig;

use super::SUPERVISOR_TARGET;
use super::budget::RestartBudget;
use super::clock::{Clock, SystemClock};
use crate::lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
use crate::server::{BridgeError, BridgeServer};

/// Server operations the supervisor relies on.
pub trait ManagedServer: Send {
    /// Starts the server; succeeds without effect when already running.
    ///
    /// # Errors
    ///
    /// Returns the server's start failure.
    fn start(&self) -> Result<(), BridgeError>;

    /// Stops the server; a no-op when stopped.
    fn stop(&self);

    /// Returns true while the server is running.
    fn is_running(&self) -> bool;

    /// Returns the server's health verdict.
    fn is_healthy(&self, force_refresh: bool) -> bool;
}

impl<H: 'static> ManagedServer for BridgeServer<H> {
    fn start(&self) -> Result<(), BridgeError> {
        Self::start(self)
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn is_running(&self) -> bool {
        Self::is_running(self)
    }

    fn is_healthy(&self, force_refresh: bool) -> bool {
        Self::is_healthy(self, force_refresh)
    }
}

/// Outcome of one supervisor tick or operator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    /// No instance existed; one was created and started.
    Created,
    /// Creating or restarting the instance failed to start it.
    StartFailed {
        /// Start failure as displayed.
        error: String,
    },
    /// The instance was running and healthy.
    Healthy,
    /// The instance was restarted, counting against the budget.
    Restarted {
        /// Restarts spent in the current window.
        restarts_used: u32,
    },
    /// The budget is spent; the instance was left alone.
    BudgetExhausted {
        /// Time until the window resets.
        resets_in: Duration,
    },
    /// An operator restarted the instance outside the budget.
    ManualRestart,
    /// An operator stopped monitoring and the instance.
    EmergencyStop,
    /// Monitoring is paused.
    NotMonitoring,
}

impl fmt::Display for SupervisorAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => formatter.write_str("created"),
            Self::StartFailed { error } => write!(formatter, "start failed: {error}"),
            Self::Healthy => formatter.write_str("healthy"),
            Self::Restarted { restarts_used } => {
                write!(formatter, "restarted ({restarts_used} used)")
            }
            Self::BudgetExhausted { resets_in } => write!(
                formatter,
                "restart budget exhausted (resets in {}s)",
                resets_in.as_secs()
            ),
            Self::ManualRestart => formatter.write_str("manual restart"),
            Self::EmergencyStop => formatter.write_str("emergency stop"),
            Self::NotMonitoring => formatter.write_str("not monitoring"),
        }
    }
}

/// Supervisor state for operator display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// False after an emergency stop until monitoring resumes.
    pub monitoring: bool,
    /// True when an instance exists and reports running.
    pub server_running: bool,
    /// Outcome of the latest tick or operator call.
    pub last_action: Option<SupervisorAction>,
    /// Restarts spent in the current window.
    pub restarts_used: u32,
    /// Restarts left in the current window.
    pub restarts_remaining: u32,
    /// Restarts allowed per window.
    pub max_restarts: u32,
    /// Time until the window resets.
    pub resets_in: Duration,
}

type Factory<S> = Box<dyn FnMut() -> S + Send>;

/// Keeps one server instance alive within a restart budget.
///
/// The factory is called once, on the first tick, to create the instance.
/// Hosts that also need to tick a [`BridgeServer`] pass a factory returning a
/// clone of the server they hold.
pub struct RestartSupervisor<S> {
    config: SupervisorConfig,
    factory: Factory<S>,
    server: Option<S>,
    budget: RestartBudget,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn LifecycleReporter>,
    last_action: Option<SupervisorAction>,
    monitoring: bool,
}

impl<S: ManagedServer> RestartSupervisor<S> {
    /// Builds a supervisor using the system clock and `tracing` reporter.
    pub fn new(config: SupervisorConfig, factory: impl FnMut() -> S + Send + 'static) -> Self {
        Self::with_parts(
            config,
            factory,
            Arc::new(SystemClock),
            Arc::new(StructuredLifecycleReporter::new()),
        )
    }

    /// Builds a supervisor with explicit time and reporting collaborators.
    pub fn with_parts(
        config: SupervisorConfig,
        factory: impl FnMut() -> S + Send + 'static,
        clock: Arc<dyn Clock>,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        let budget = RestartBudget::new(config.max_restarts, config.window(), clock.now());
        Self {
            config,
            factory: Box::new(factory),
            server: None,
            budget,
            clock,
            reporter,
            last_action: None,
            monitoring: true,
        }
    }

    /// Runs one liveness check.
    pub fn tick(&mut self) -> SupervisorAction {
        let action = self.check();
        debug!(target: SUPERVISOR_TARGET, action = %action, "supervisor tick");
        self.last_action = Some(action.clone());
        action
    }

    fn check(&mut self) -> SupervisorAction {
        if !self.monitoring {
            return SupervisorAction::NotMonitoring;
        }
        let server = match &self.server {
            Some(server) => server,
            None => {
                return match self.create() {
                    Ok(()) => SupervisorAction::Created,
                    Err(error) => SupervisorAction::StartFailed {
                        error: error.to_string(),
                    },
                };
            }
        };

        let running = server.is_running();
        if running && server.is_healthy(true) {
            return SupervisorAction::Healthy;
        }

        let now = self.clock.now();
        if !self.budget.try_consume(now) {
            let resets_in = self.budget.resets_in(now);
            self.reporter.restart_budget_exhausted(resets_in);
            return SupervisorAction::BudgetExhausted { resets_in };
        }

        let reason = if running { "unhealthy" } else { "stopped unexpectedly" };
        let restarts_used = self.budget.used(now);
        self.reporter
            .restart_attempted(reason, restarts_used, self.budget.max());
        match self.cycle() {
            Ok(()) => SupervisorAction::Restarted { restarts_used },
            Err(error) => SupervisorAction::StartFailed {
                error: error.to_string(),
            },
        }
    }

    fn create(&mut self) -> Result<(), BridgeError> {
        let server = (self.factory)();
        let outcome = server.start();
        self.server = Some(server);
        match &outcome {
            Ok(()) => info!(target: SUPERVISOR_TARGET, "created supervised server"),
            Err(error) => {
                warn!(target: SUPERVISOR_TARGET, error = %error, "supervised server failed to start");
            }
        }
        outcome
    }

    fn cycle(&self) -> Result<(), BridgeError> {
        let Some(server) = &self.server else {
            return Ok(());
        };
        server.stop();
        self.clock.sleep(self.config.settle());
        server.start()
    }

    /// Restarts the instance immediately without counting against the
    /// budget, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns the start failure.
    pub fn restart_now(&mut self) -> Result<(), BridgeError> {
        let outcome = if self.server.is_none() {
            self.create()
        } else {
            self.cycle()
        };
        self.last_action = Some(match &outcome {
            Ok(()) => SupervisorAction::ManualRestart,
            Err(error) => SupervisorAction::StartFailed {
                error: error.to_string(),
            },
        });
        outcome
    }

    /// Stops monitoring and the instance.
    pub fn emergency_stop(&mut self) {
        warn!(target: SUPERVISOR_TARGET, "emergency stop requested");
        self.monitoring = false;
        if let Some(server) = &self.server {
            server.stop();
        }
        self.last_action = Some(SupervisorAction::EmergencyStop);
    }

    /// Resumes monitoring after an emergency stop.
    pub fn resume_monitoring(&mut self) {
        self.monitoring = true;
    }

    /// Returns true while ticks perform checks.
    pub const fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// The supervised instance, once created.
    pub const fn server(&self) -> Option<&S> {
        self.server.as_ref()
    }

    /// Supervisor configuration.
    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Current monitoring state and budget.
    pub fn status(&self) -> SupervisorStatus {
        let now = self.clock.now();
        SupervisorStatus {
            monitoring: self.monitoring,
            server_running: self.server.as_ref().is_some_and(ManagedServer::is_running),
            last_action: self.last_action.clone(),
            restarts_used: self.budget.used(now),
            restarts_remaining: self.budget.remaining(now),
            max_restarts: self.budget.max(),
            resets_in: self.budget.resets_in(now),
        }
    }
}

impl<S> fmt::Debug for RestartSupervisor<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RestartSupervisor")
            .field("config", &self.config)
            .field("budget", &self.budget)
            .field("last_action", &self.last_action)
            .field("monitoring", &self.monitoring)
            .finish_non_exhaustive()
    }
}
