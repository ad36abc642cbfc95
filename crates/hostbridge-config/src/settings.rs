use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::*;
use crate::endpoint::Endpoint;
use crate::logging::LoggingConfig;

/// Settings for the in-host bridge server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub endpoint: Endpoint,
    /// Idle read timeout per connection, in seconds.
    pub read_timeout_secs: u64,
    /// Wait for a queued command's result, in seconds.
    pub command_timeout_secs: u64,
    /// Tasks executed per scheduler tick.
    pub batch_size: usize,
    /// Suggested host timer period for scheduler ticks, in milliseconds.
    pub tick_interval_ms: u64,
    /// Concurrent connection cap.
    pub max_connections: usize,
    /// Largest request frame in bytes; longer frames end the connection.
    pub max_frame_bytes: usize,
    /// Bound on the acceptor join during stop, in seconds.
    pub stop_join_timeout_secs: u64,
    /// Health verdict cache lifetime, in seconds.
    pub health_cache_secs: u64,
    /// Window in which client activity counts as recent, in seconds.
    pub activity_window_secs: u64,
}

impl ServerConfig {
    /// Builds the default configuration bound to `endpoint`.
    #[must_use]
    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Idle read timeout per connection.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Wait for a queued command's result.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Suggested host timer period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Bound on the acceptor join during stop.
    #[must_use]
    pub const fn stop_join_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_join_timeout_secs)
    }

    /// Health verdict cache lifetime.
    #[must_use]
    pub const fn health_cache(&self) -> Duration {
        Duration::from_secs(self.health_cache_secs)
    }

    /// Window in which client activity counts as recent.
    #[must_use]
    pub const fn activity_window(&self) -> Duration {
        Duration::from_secs(self.activity_window_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            stop_join_timeout_secs: DEFAULT_STOP_JOIN_TIMEOUT_SECS,
            health_cache_secs: DEFAULT_HEALTH_CACHE_SECS,
            activity_window_secs: DEFAULT_ACTIVITY_WINDOW_SECS,
        }
    }
}

/// Settings for the external control process's client.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address.
    pub endpoint: Endpoint,
    /// Connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Response wait once the request has been written, in seconds.
    pub response_timeout_secs: u64,
    /// Attempts made before a connect failure is reported.
    pub connect_attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Heartbeat check timeout, in seconds.
    pub check_timeout_secs: u64,
    /// Cached health verdict lifetime, in seconds.
    pub health_cache_secs: u64,
    /// Round-trip samples kept for statistics.
    pub response_history: usize,
}

impl ClientConfig {
    /// Builds the default configuration targeting `endpoint`.
    #[must_use]
    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Response wait once the request has been written.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Pause between connection attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Heartbeat check timeout.
    #[must_use]
    pub const fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    /// Cached health verdict lifetime.
    #[must_use]
    pub const fn health_cache(&self) -> Duration {
        Duration::from_secs(self.health_cache_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
            health_cache_secs: DEFAULT_CLIENT_HEALTH_CACHE_SECS,
            response_history: DEFAULT_RESPONSE_HISTORY,
        }
    }
}

/// Settings for the health monitor and restart supervisor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Delay before the first check, in seconds.
    pub initial_delay_secs: u64,
    /// Interval between checks, in seconds.
    pub interval_secs: u64,
    /// Restarts allowed per window.
    pub max_restarts: u32,
    /// Budget window length, in seconds.
    pub window_secs: u64,
    /// Pause between stop and start, in milliseconds.
    pub settle_ms: u64,
}

impl SupervisorConfig {
    /// Delay before the first check.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Interval between checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Budget window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Pause between stop and start.
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: DEFAULT_SUPERVISOR_INITIAL_DELAY_SECS,
            interval_secs: DEFAULT_SUPERVISOR_INTERVAL_SECS,
            max_restarts: DEFAULT_MAX_RESTARTS,
            window_secs: DEFAULT_RESTART_WINDOW_SECS,
            settle_ms: DEFAULT_RESTART_SETTLE_MS,
        }
    }
}

/// Aggregate configuration for a bridge deployment.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// In-host server settings.
    pub server: ServerConfig,
    /// Control-process client settings.
    pub client: ClientConfig,
    /// Supervisor settings.
    pub supervisor: SupervisorConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}
