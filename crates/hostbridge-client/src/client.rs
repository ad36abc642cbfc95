//! Blocking request/response client with connection monitoring.

use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use hostbridge_config::{ClientConfig, Endpoint};
use hostbridge_protocol::{
    Command, FrameReadError, FrameReader, Response, decode_response, encode,
};

use crate::errors::ClientError;
use crate::monitor::{ConnectionMonitor, MonitorSnapshot, Statistics, timestamp};
use crate::transport::{self, ConnectFailure};

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Outcome class of a heartbeat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// The bridge answered the heartbeat.
    Healthy,
    /// The bridge answered with an error.
    Error,
    /// The bridge could not be reached.
    Disconnected,
}

/// Result of [`BridgeClient::check_connection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// True when the heartbeat was answered successfully.
    pub connected: bool,
    /// Outcome class of the check.
    pub status: CheckState,
    /// Failure description when not connected.
    pub error: Option<String>,
    /// RFC 3339 time of the check.
    pub timestamp: String,
    /// Heartbeat reply, when one arrived.
    pub response: Option<Response>,
}

/// Endpoint details included in [`DetailedStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Configured bridge host.
    pub host: String,
    /// Configured bridge port.
    pub port: u16,
    /// RFC 3339 time the report was built.
    pub checked_at: String,
}

/// Combined health check, monitor and statistics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedStatus {
    /// Fresh heartbeat check.
    pub connection_check: ConnectionStatus,
    /// Monitor counters after the check.
    pub connection_monitor: MonitorSnapshot,
    /// Derived statistics after the check.
    pub statistics: Statistics,
    /// Endpoint details.
    pub server_info: ServerInfo,
}

struct CachedCheck {
    checked_at: Instant,
    status: ConnectionStatus,
}

/// Client for the bridge server.
///
/// Each call opens a fresh connection. Connection failures are retried with
/// a fixed delay; once the request has been written, failures are returned
/// as they are.
pub struct BridgeClient {
    config: ClientConfig,
    monitor: Mutex<ConnectionMonitor>,
    cached_check: Mutex<Option<CachedCheck>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BridgeClient {
    /// Builds a client for `config.endpoint`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let monitor = ConnectionMonitor::new(config.response_history);
        Self {
            config,
            monitor: Mutex::new(monitor),
            cached_check: Mutex::new(None),
        }
    }

    /// Target endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// Sends `command` and waits for its response.
    ///
    /// Error responses from the bridge are returned as `Ok`; only failures
    /// to exchange frames are errors.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the bridge cannot be reached, the
    /// exchange breaks, or the reply is not a valid response.
    pub fn send(&self, command: &Command) -> Result<Response, ClientError> {
        self.send_with_timeout(command, self.config.response_timeout())
    }

    fn send_with_timeout(
        &self,
        command: &Command,
        response_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let frame = encode(command).map_err(ClientError::Serialise)?;
        let result = self.connect_with_retry().and_then(|stream| {
            let started = Instant::now();
            exchange(&stream, &frame, response_timeout).map(|response| (response, started.elapsed()))
        });

        let mut monitor = lock(&self.monitor);
        match result {
            Ok((response, round_trip)) => {
                monitor.record_success(round_trip, OffsetDateTime::now_utc());
                Ok(response)
            }
            Err(error) => {
                warn!(
                    target: CLIENT_TARGET,
                    kind = %command.kind(),
                    error = %error,
                    "bridge exchange failed"
                );
                monitor.record_failure(error.to_string());
                Err(error)
            }
        }
    }

    fn connect_with_retry(&self) -> Result<TcpStream, ClientError> {
        let endpoint = &self.config.endpoint;
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            lock(&self.monitor).record_attempt();
            let failure = match transport::connect(endpoint, self.config.connect_timeout()) {
                Ok(stream) => return Ok(stream),
                Err(failure) => failure,
            };
            debug!(
                target: CLIENT_TARGET,
                endpoint = %endpoint,
                attempt,
                attempts,
                failure = ?failure,
                "connection attempt failed"
            );
            if attempt >= attempts {
                return Err(match failure {
                    ConnectFailure::Resolve(source) => ClientError::Resolve {
                        endpoint: endpoint.clone(),
                        source,
                    },
                    ConnectFailure::Connect(source) => ClientError::Connect {
                        endpoint: endpoint.clone(),
                        attempts,
                        source,
                    },
                });
            }
            attempt += 1;
            thread::sleep(self.config.retry_delay());
        }
    }

    /// Sends a heartbeat flagged as health-check traffic and reports whether the
    /// bridge answered.
    ///
    /// The result also refreshes the cached verdict used by
    /// [`BridgeClient::health`].
    pub fn check_connection(&self) -> ConnectionStatus {
        let sent_at = timestamp(OffsetDateTime::now_utc());
        let heartbeat = Command::heartbeat().as_health_check();
        let status = match self.send_with_timeout(&heartbeat, self.config.check_timeout()) {
            Ok(response) if response.is_success() => {
                lock(&self.monitor).record_heartbeat(OffsetDateTime::now_utc());
                ConnectionStatus {
                    connected: true,
                    status: CheckState::Healthy,
                    error: None,
                    timestamp: sent_at,
                    response: Some(response),
                }
            }
            Ok(response) => {
                let message = response.message().unwrap_or("Unknown error").to_owned();
                lock(&self.monitor).record_check_error(message.clone());
                ConnectionStatus {
                    connected: false,
                    status: CheckState::Error,
                    error: Some(message),
                    timestamp: sent_at,
                    response: Some(response),
                }
            }
            Err(error) => ConnectionStatus {
                connected: false,
                status: CheckState::Disconnected,
                error: Some(error.to_string()),
                timestamp: sent_at,
                response: None,
            },
        };
        *lock(&self.cached_check) = Some(CachedCheck {
            checked_at: Instant::now(),
            status: status.clone(),
        });
        status
    }

    /// Returns the cached check while younger than the configured cache
    /// lifetime, otherwise checks afresh.
    pub fn health(&self) -> ConnectionStatus {
        if let Some(cached) = lock(&self.cached_check).as_ref()
            && cached.checked_at.elapsed() < self.config.health_cache()
        {
            return cached.status.clone();
        }
        self.check_connection()
    }

    /// Current counters and link state.
    pub fn monitor(&self) -> MonitorSnapshot {
        lock(&self.monitor).snapshot()
    }

    /// Builds the statistics report.
    pub fn statistics(&self) -> Statistics {
        lock(&self.monitor).statistics(OffsetDateTime::now_utc())
    }

    /// Zeroes counters and the response-time history.
    pub fn reset_statistics(&self) {
        lock(&self.monitor).reset();
        debug!(target: CLIENT_TARGET, "connection statistics reset");
    }

    /// Checks the bridge and combines the result with the monitor snapshot,
    /// statistics and endpoint details.
    pub fn detailed_status(&self) -> DetailedStatus {
        let connection_check = self.check_connection();
        DetailedStatus {
            connection_check,
            connection_monitor: self.monitor(),
            statistics: self.statistics(),
            server_info: ServerInfo {
                host: self.config.endpoint.host.clone(),
                port: self.config.endpoint.port,
                checked_at: timestamp(OffsetDateTime::now_utc()),
            },
        }
    }
}

fn exchange(
    stream: &TcpStream,
    frame: &[u8],
    response_timeout: Duration,
) -> Result<Response, ClientError> {
    use std::io::Write;

    stream
        .set_read_timeout(Some(response_timeout))
        .map_err(ClientError::Send)?;
    stream
        .set_write_timeout(Some(response_timeout))
        .map_err(ClientError::Send)?;
    let mut writer = stream;
    writer.write_all(frame).map_err(ClientError::Send)?;
    writer.flush().map_err(ClientError::Send)?;

    match FrameReader::new(stream).next_frame() {
        Ok(Some(reply)) => decode_response(&reply).map_err(ClientError::InvalidResponse),
        Ok(None) => Err(ClientError::NoResponse),
        Err(FrameReadError::Transport(error)) if error.is_timeout() => Err(ClientError::Timeout {
            after: response_timeout,
        }),
        Err(FrameReadError::Transport(error)) => Err(ClientError::Receive(error)),
        Err(FrameReadError::Framing(error)) => Err(ClientError::InvalidResponse(error)),
    }
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BridgeClient")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}
