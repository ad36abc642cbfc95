//! Error types for server lifecycle operations.

use thiserror::Error;

use hostbridge_config::Endpoint;

use crate::transport::ListenerError;

/// Errors returned by [`crate::BridgeServer::start`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The endpoint could not be bound.
    #[error("Port binding failed: {source}")]
    Bind {
        /// Endpoint the server was configured with.
        endpoint: Endpoint,
        /// Acceptor failure.
        #[source]
        source: ListenerError,
    },
    /// The acceptor could not be launched after binding.
    #[error("failed to start listener on {endpoint}: {source}")]
    Listener {
        /// Endpoint the server was configured with.
        endpoint: Endpoint,
        /// Acceptor failure.
        #[source]
        source: ListenerError,
    },
    /// A concurrent stop is still in progress.
    #[error("server is stopping")]
    Stopping,
}
