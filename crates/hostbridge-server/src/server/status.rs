//! Serializable status report returned by `get_status`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulerState;

/// Server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Not bound.
    Stopped,
    /// Binding and launching the acceptor.
    Starting,
    /// Accepting connections.
    Running,
    /// Shutting the acceptor down.
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        formatter.write_str(label)
    }
}

/// Snapshot of server state and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Lifecycle and health.
    pub server: ServerSection,
    /// Connection counters.
    pub connections: ConnectionsSection,
    /// Command counters.
    pub commands: CommandsSection,
    /// Main-thread queue.
    pub scheduler: SchedulerSection,
}

/// Lifecycle and health section of [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// True while the acceptor is running.
    pub running: bool,
    /// Lifecycle state.
    pub state: ServerState,
    /// Configured bind host.
    pub host: String,
    /// Bound port, or the configured one when stopped.
    pub port: u16,
    /// Seconds since the current run started; zero when stopped.
    pub uptime: f64,
    /// Running with a live acceptor and no recorded error.
    pub healthy: bool,
    /// Most recent lifecycle or acceptor error.
    pub last_error: Option<String>,
}

/// Connection section of [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionsSection {
    /// Connections accepted since the server was created.
    pub total: u64,
    /// Connections currently being served.
    pub active: usize,
    /// Connections turned away at the cap.
    pub rejected: u64,
    /// Peer address of the latest accepted client.
    pub last_client: Option<String>,
}

/// Command section of [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandsSection {
    /// Requests answered, including errors.
    pub total_processed: u64,
    /// Main-thread commands that missed their deadline.
    pub timed_out: u64,
}

/// Scheduler section of [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Whether ticks are draining the queue.
    pub state: SchedulerState,
    /// Tasks waiting for the next tick.
    pub pending: usize,
    /// Tasks drained per tick.
    pub batch_size: usize,
    /// Host timer period the batch size was chosen for.
    pub tick_interval_ms: u64,
}
