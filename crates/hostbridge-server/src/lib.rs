//! In-host command bridge.
//!
//! A [`BridgeServer`] accepts newline-delimited JSON commands over TCP and
//! answers each connection on its own thread. Built-in commands (heartbeat
//! and status) are answered immediately. Host commands are registered in a
//! [`DispatchTable`] and queued for the host's main thread, which drains the
//! queue in bounded batches each time it calls [`BridgeServer::tick`]. The
//! connection thread waits for the result up to the command timeout.
//!
//! ```no_run
//! use hostbridge_config::ServerConfig;
//! use hostbridge_server::{BridgeServer, DispatchTable, Params};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = DispatchTable::new().with_handler(
//!     "count_objects",
//!     |scene: &mut Vec<String>, _params: &Params| Ok(json!(scene.len())),
//! )?;
//! let server = BridgeServer::new(ServerConfig::default(), table);
//! server.start()?;
//!
//! let mut scene = vec!["Cube".to_owned()];
//! // Called from the host's periodic timer on the main thread.
//! std::thread::sleep(server.config().tick_interval());
//! server.tick(&mut scene);
//! server.stop();
//! # Ok(())
//! # }
//! ```
//!
//! A [`RestartSupervisor`] can watch the server's health and restart it
//! within a rolling budget. Lifecycle events are reported through a
//! [`LifecycleReporter`]; [`telemetry::initialise`] installs the `tracing`
//! subscriber.

mod dispatch;
mod lifecycle;
mod scheduler;
mod server;
mod supervisor;
pub mod telemetry;
mod transport;

pub use dispatch::{DispatchError, DispatchTable, HandlerError, HandlerResult, Params, Route, StatusSource};
pub use lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
pub use scheduler::{
    MainThreadScheduler, STOPPED_MESSAGE, ScheduleError, SchedulerState, TaskBody, TaskHandle,
    TickReport,
};
pub use server::{
    BridgeError, BridgeServer, CommandsSection, ConnectionsSection, HealthBasis, HealthVerdict,
    SchedulerSection, ServerSection, ServerState, StatusReport,
};
pub use supervisor::{
    Clock, ManagedServer, MonitorHandle, RestartBudget, RestartSupervisor, SupervisorAction,
    SupervisorStatus, SystemClock,
};
pub use transport::{ListenerError, TIMEOUT_MESSAGE};

#[cfg(test)]
mod tests;
