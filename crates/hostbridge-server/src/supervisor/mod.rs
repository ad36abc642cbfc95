//! Health monitoring and budgeted restarts of the bridge server.
//!
//! A [`RestartSupervisor`] owns one server instance created through a
//! factory. Each tick checks liveness and, when the server is unhealthy or
//! has stopped, restarts it while the rolling [`RestartBudget`] allows.
//! Ticks come either from the host's own timer or from a monitor thread
//! started with [`RestartSupervisor::spawn_monitor`].

mod budget;
mod clock;
mod monitor;
mod restart;

pub use self::budget::RestartBudget;
pub use self::clock::{Clock, SystemClock};
pub use self::monitor::MonitorHandle;
pub use self::restart::{ManagedServer, RestartSupervisor, SupervisorAction, SupervisorStatus};

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");
