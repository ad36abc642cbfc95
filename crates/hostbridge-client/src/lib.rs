//! Client for the host command bridge.
//!
//! [`BridgeClient`] sends newline-delimited JSON commands to a running
//! bridge server and keeps connection statistics for operator display.
//! Connection failures are retried with a fixed delay; once a request has
//! been written it is never resent, so commands with side effects run at
//! most once per call.

mod client;
mod errors;
mod monitor;
mod transport;

pub use client::{BridgeClient, CheckState, ConnectionStatus, DetailedStatus, ServerInfo};
pub use errors::ClientError;
pub use monitor::{
    ConnectionStats, LinkStatus, MonitorSnapshot, Performance, Statistics,
};

#[cfg(test)]
mod tests;
