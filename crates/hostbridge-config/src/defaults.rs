//! Default values shared by the bridge server, client, and supervisor.

/// Default bind and connect host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bridge TCP port.
pub const DEFAULT_PORT: u16 = 9876;

/// Idle read timeout applied to each accepted connection.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// How long a connection handler waits for a queued command to complete.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Number of queued tasks the main thread drains per tick.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Interval at which hosts are expected to call the scheduler tick.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Maximum number of concurrently served connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Largest accepted request frame, matching the protocol's own limit.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Upper bound on the wait for the acceptor thread when stopping.
pub const DEFAULT_STOP_JOIN_TIMEOUT_SECS: u64 = 2;

/// How long a server health verdict stays cached.
pub const DEFAULT_HEALTH_CACHE_SECS: u64 = 10;

/// Client activity within this window counts as recent.
pub const DEFAULT_ACTIVITY_WINDOW_SECS: u64 = 300;

/// Client connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Client wait for a response once a command has been written.
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 65;

/// Client connection attempts before giving up.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Delay between client connection attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Client heartbeat check timeout.
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 5;

/// Client cached health verdict lifetime.
pub const DEFAULT_CLIENT_HEALTH_CACHE_SECS: u64 = 10;

/// Number of round-trip samples the client keeps.
pub const DEFAULT_RESPONSE_HISTORY: usize = 50;

/// Delay before the first supervisor check.
pub const DEFAULT_SUPERVISOR_INITIAL_DELAY_SECS: u64 = 5;

/// Interval between supervisor checks.
pub const DEFAULT_SUPERVISOR_INTERVAL_SECS: u64 = 120;

/// Restarts permitted per budget window.
pub const DEFAULT_MAX_RESTARTS: u32 = 10;

/// Length of the restart budget window.
pub const DEFAULT_RESTART_WINDOW_SECS: u64 = 3_600;

/// Pause between stopping and restarting a server.
pub const DEFAULT_RESTART_SETTLE_MS: u64 = 2_000;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
