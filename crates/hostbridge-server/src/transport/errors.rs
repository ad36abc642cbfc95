//! Errors raised while binding or running the acceptor.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use hostbridge_config::Endpoint;

/// Failures of the bridge acceptor.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The endpoint host did not resolve to a socket address.
    #[error("cannot resolve bridge endpoint {endpoint}: {source}")]
    Resolve {
        /// Endpoint as configured.
        endpoint: Endpoint,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The resolved address could not be bound.
    #[error("cannot bind {addr}: {source}")]
    BindTcp {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A socket option needed by the acceptor could not be applied.
    #[error("cannot prepare listening socket ({step}): {source}")]
    Prepare {
        /// Option being applied.
        step: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The acceptor thread could not be spawned.
    #[error("cannot spawn acceptor thread: {source}")]
    Spawn {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The acceptor thread panicked before it could be joined.
    #[error("acceptor thread panicked")]
    ThreadPanic,
}

impl ListenerError {
    /// Returns true when binding failed because another socket holds the
    /// address.
    pub fn is_address_in_use(&self) -> bool {
        matches!(
            self,
            Self::BindTcp { source, .. } if source.kind() == io::ErrorKind::AddrInUse
        )
    }
}
