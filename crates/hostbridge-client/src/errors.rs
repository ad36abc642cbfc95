//! Error types for the bridge client.

use std::io;
use std::time::Duration;

use thiserror::Error;

use hostbridge_config::Endpoint;
use hostbridge_protocol::{FramingError, TransportError};

/// Failures reported by [`crate::BridgeClient::send`].
///
/// Only [`ClientError::Resolve`] and [`ClientError::Connect`] are produced
/// before any request bytes leave the client, so only those are retried.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint host did not resolve.
    #[error("failed to resolve bridge address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: Endpoint,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Every connection attempt failed.
    #[error("failed to connect to bridge at {endpoint} after {attempts} attempts: {source}")]
    Connect {
        /// Endpoint being dialled.
        endpoint: Endpoint,
        /// Attempts made, including the first.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: io::Error,
    },
    /// The command could not be encoded.
    #[error("failed to serialise command: {0}")]
    Serialise(#[source] serde_json::Error),
    /// Writing the request failed.
    #[error("failed to send command: {0}")]
    Send(#[source] io::Error),
    /// Reading the reply failed.
    #[error("failed to read response: {0}")]
    Receive(#[source] TransportError),
    /// No reply arrived before the deadline.
    #[error("no response within {}s", .after.as_secs())]
    Timeout {
        /// Deadline that elapsed.
        after: Duration,
    },
    /// The bridge closed the stream before replying.
    #[error("bridge closed the connection without responding")]
    NoResponse,
    /// The reply was not a valid response frame.
    #[error("invalid response from bridge: {0}")]
    InvalidResponse(#[source] FramingError),
}

impl ClientError {
    /// Returns true when the failure happened before the request was
    /// written.
    #[must_use]
    pub const fn is_pre_send(&self) -> bool {
        matches!(self, Self::Resolve { .. } | Self::Connect { .. })
    }

    /// Returns true when the bridge appears not to be listening.
    #[must_use]
    pub fn is_bridge_down(&self) -> bool {
        match self {
            Self::Connect { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::AddrNotAvailable
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn connect_error(kind: io::ErrorKind) -> ClientError {
        ClientError::Connect {
            endpoint: Endpoint::default(),
            attempts: 3,
            source: io::Error::from(kind),
        }
    }

    #[rstest]
    #[case::refused(io::ErrorKind::ConnectionRefused, true)]
    #[case::timed_out(io::ErrorKind::TimedOut, true)]
    #[case::permission(io::ErrorKind::PermissionDenied, false)]
    fn recognises_bridge_down(#[case] kind: io::ErrorKind, #[case] expected: bool) {
        assert_eq!(connect_error(kind).is_bridge_down(), expected);
    }

    #[test]
    fn only_connection_failures_are_pre_send() {
        assert!(connect_error(io::ErrorKind::ConnectionRefused).is_pre_send());
        assert!(!ClientError::NoResponse.is_pre_send());
        assert!(!ClientError::Send(io::Error::from(io::ErrorKind::BrokenPipe)).is_pre_send());
    }

    #[test]
    fn connect_message_names_endpoint_and_attempts() {
        let message = connect_error(io::ErrorKind::ConnectionRefused).to_string();
        assert!(message.contains("tcp://127.0.0.1:9876"), "{message}");
        assert!(message.contains("after 3 attempts"), "{message}");
    }
}
