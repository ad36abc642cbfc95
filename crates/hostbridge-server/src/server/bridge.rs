//! Server lifecycle controller.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{debug, warn};

use hostbridge_config::{Endpoint, ServerConfig};

use super::errors::BridgeError;
use super::health::{HealthCache, HealthVerdict, evaluate};
use super::stats::ServerStats;
use super::status::{
    CommandsSection, ConnectionsSection, SchedulerSection, ServerSection, ServerState,
    StatusReport,
};
use super::SERVER_TARGET;
use crate::dispatch::{DispatchTable, StatusSource};
use crate::lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
use crate::scheduler::{MainThreadScheduler, SchedulerView, TickReport};
use crate::transport::{
    BridgeConnectionHandler, BridgeListener, ConnectionLimits, JoinOutcome, ListenerHandle,
};

/// State shared between the controller and connection threads.
struct ServerCore {
    config: ServerConfig,
    state: Mutex<ServerState>,
    bound: Mutex<Option<SocketAddr>>,
    listener: Mutex<Option<ListenerHandle>>,
    health: Mutex<HealthCache>,
    stats: Arc<ServerStats>,
    scheduler: Arc<dyn SchedulerView>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServerCore {
    fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ServerState) {
        *lock(&self.state) = state;
    }

    fn acceptor_alive(&self) -> bool {
        lock(&self.listener)
            .as_ref()
            .is_some_and(ListenerHandle::is_alive)
    }

    fn health(&self, force_refresh: bool) -> HealthVerdict {
        let now = Instant::now();
        let state = self.state();
        let acceptor_alive = self.acceptor_alive();
        let stats = self.stats.snapshot();
        lock(&self.health).get_or_refresh(now, force_refresh, || {
            evaluate(
                state,
                acceptor_alive,
                &stats,
                now,
                self.config.activity_window(),
            )
        })
    }

    fn report(&self) -> StatusReport {
        let state = self.state();
        let stats = self.stats.snapshot();
        let bound = *lock(&self.bound);
        let running = state == ServerState::Running;
        let uptime = match (running, stats.started_at) {
            (true, Some(started_at)) => started_at.elapsed().as_secs_f64(),
            _ => 0.0,
        };
        StatusReport {
            server: ServerSection {
                running,
                state,
                host: self.config.endpoint.host.clone(),
                port: bound.map_or(self.config.endpoint.port, |addr| addr.port()),
                uptime,
                healthy: self.health(false).healthy(),
                last_error: stats.last_error,
            },
            connections: ConnectionsSection {
                total: stats.total_connections,
                active: stats.active_connections,
                rejected: stats.rejected_connections,
                last_client: stats.last_client.map(|peer| peer.to_string()),
            },
            commands: CommandsSection {
                total_processed: stats.commands_processed,
                timed_out: stats.commands_timed_out,
            },
            scheduler: SchedulerSection {
                state: self.scheduler.state(),
                pending: self.scheduler.pending(),
                batch_size: self.scheduler.batch_size(),
                tick_interval_ms: self.config.tick_interval_ms,
            },
        }
    }
}

impl StatusSource for ServerCore {
    fn status_json(&self) -> Value {
        serde_json::to_value(self.report())
            .unwrap_or_else(|error| json!({"error": format!("status unavailable: {error}")}))
    }
}

/// Command-execution bridge for host state `H`.
///
/// The host owns this value explicitly, starts and stops it, and calls
/// [`BridgeServer::tick`] from its own periodic callback on the main thread.
/// Clones share the same server, so a supervisor can hold one while the host
/// ticks another.
pub struct BridgeServer<H> {
    core: Arc<ServerCore>,
    table: Arc<DispatchTable<H>>,
    scheduler: Arc<MainThreadScheduler<H>>,
    reporter: Arc<dyn LifecycleReporter>,
}

impl<H> Clone for BridgeServer<H> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            table: Arc::clone(&self.table),
            scheduler: Arc::clone(&self.scheduler),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

impl<H: 'static> BridgeServer<H> {
    /// Builds a stopped server that logs lifecycle events with `tracing`.
    pub fn new(config: ServerConfig, table: DispatchTable<H>) -> Self {
        Self::with_reporter(config, table, Arc::new(StructuredLifecycleReporter::new()))
    }

    /// Builds a stopped server reporting lifecycle events to `reporter`.
    pub fn with_reporter(
        config: ServerConfig,
        mut table: DispatchTable<H>,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        let scheduler = Arc::new(MainThreadScheduler::new(config.batch_size));
        let view: Arc<dyn SchedulerView> = scheduler.clone();
        let core = Arc::new(ServerCore {
            health: Mutex::new(HealthCache::new(config.health_cache())),
            config,
            state: Mutex::new(ServerState::Stopped),
            bound: Mutex::new(None),
            listener: Mutex::new(None),
            stats: Arc::new(ServerStats::default()),
            scheduler: view,
        });
        let source: Arc<dyn StatusSource> = core.clone();
        table.set_status_source(source);
        Self {
            core,
            table: Arc::new(table),
            scheduler,
            reporter,
        }
    }

    /// Binds the endpoint, launches the acceptor and arms the scheduler.
    ///
    /// Succeeds without effect when already running. Statistics are reset on
    /// every successful transition out of `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] when the endpoint cannot be bound. The
    /// server stays stopped and the failure is recorded as `last_error`.
    pub fn start(&self) -> Result<(), BridgeError> {
        {
            let mut state = lock(&self.core.state);
            match *state {
                ServerState::Running | ServerState::Starting => {
                    debug!(target: SERVER_TARGET, state = %*state, "start ignored");
                    return Ok(());
                }
                ServerState::Stopping => return Err(BridgeError::Stopping),
                ServerState::Stopped => *state = ServerState::Starting,
            }
        }

        let endpoint = &self.core.config.endpoint;
        self.reporter.server_starting(endpoint);
        self.core.stats.reset();

        let listener = match BridgeListener::bind(endpoint) {
            Ok(listener) => listener,
            Err(source) => {
                return Err(self.fail_start(BridgeError::Bind {
                    endpoint: endpoint.clone(),
                    source,
                }));
            }
        };
        let addr = listener.local_addr();
        let handler = Arc::new(BridgeConnectionHandler::new(
            Arc::clone(&self.table),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.core.stats),
            self.limits(),
        ));

        self.scheduler.arm();
        let handle = match listener.start(handler) {
            Ok(handle) => handle,
            Err(source) => {
                self.scheduler.stop();
                return Err(self.fail_start(BridgeError::Listener {
                    endpoint: endpoint.clone(),
                    source,
                }));
            }
        };

        *lock(&self.core.listener) = Some(handle);
        *lock(&self.core.bound) = Some(addr);
        self.core.stats.mark_started(Instant::now());
        lock(&self.core.health).invalidate();
        self.core.set_state(ServerState::Running);
        self.reporter.server_started(addr);
        Ok(())
    }

    fn fail_start(&self, error: BridgeError) -> BridgeError {
        self.core.stats.record_error(error.to_string());
        self.core.set_state(ServerState::Stopped);
        self.reporter.server_start_failed(&error);
        error
    }

    fn limits(&self) -> ConnectionLimits {
        let config = &self.core.config;
        ConnectionLimits {
            read_timeout: config.read_timeout(),
            command_timeout: config.command_timeout(),
            max_connections: config.max_connections,
            max_frame: config.max_frame_bytes,
        }
    }

    /// Stops accepting, closes live connections and fails queued tasks.
    ///
    /// Idempotent: stopping a stopped server does nothing and the acceptor is
    /// joined at most once per run.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.core.state);
            if *state != ServerState::Running {
                debug!(target: SERVER_TARGET, state = %*state, "stop ignored");
                return;
            }
            *state = ServerState::Stopping;
        }
        self.reporter.server_stopping();

        let handle = lock(&self.core.listener).take();
        if let Some(handle) = handle {
            handle.shutdown();
            let timeout = self.core.config.stop_join_timeout();
            match handle.join_timeout(timeout) {
                JoinOutcome::Joined => {}
                JoinOutcome::TimedOut => warn!(
                    target: SERVER_TARGET,
                    timeout_ms = timeout.as_millis(),
                    "acceptor did not exit in time; detaching"
                ),
                JoinOutcome::Panicked => {
                    warn!(target: SERVER_TARGET, "acceptor thread panicked");
                }
            }
        }

        self.scheduler.stop();
        let closed = self.core.stats.close_all();
        if closed > 0 {
            debug!(target: SERVER_TARGET, closed, "closed live connections");
        }
        self.core.stats.mark_stopped();
        *lock(&self.core.bound) = None;
        lock(&self.core.health).invalidate();
        self.core.set_state(ServerState::Stopped);
        self.reporter.server_stopped();
    }

    /// Runs one scheduler batch on the calling (main) thread.
    ///
    /// Returns `None` while the server is stopped.
    pub fn tick(&self, host: &mut H) -> Option<TickReport> {
        self.scheduler.tick(host)
    }

    /// Returns the cached health verdict unless it expired or
    /// `force_refresh` is set.
    pub fn health(&self, force_refresh: bool) -> HealthVerdict {
        self.core.health(force_refresh)
    }

    /// Shorthand for `health(force_refresh).healthy()`.
    pub fn is_healthy(&self, force_refresh: bool) -> bool {
        self.health(force_refresh).healthy()
    }

    /// Builds the status report served to `get_status`.
    pub fn status(&self) -> StatusReport {
        self.core.report()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.core.state()
    }

    /// Returns true while running.
    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.core.bound)
    }

    /// Configured endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.core.config.endpoint
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.core.config
    }

    /// Most recent recorded error.
    pub fn last_error(&self) -> Option<String> {
        self.core.stats.snapshot().last_error
    }

    /// Tasks waiting for the main thread.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Dispatch table shared with connection threads.
    pub fn table(&self) -> &DispatchTable<H> {
        &self.table
    }
}

impl<H> fmt::Debug for BridgeServer<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BridgeServer")
            .field("endpoint", &self.core.config.endpoint)
            .field("state", &self.core.state())
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
