//! Socket acceptor and per-connection handling.
//!
//! The acceptor thread polls a non-blocking listener against a shutdown flag
//! and hands each accepted socket to its own handler thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::TIMEOUT_MESSAGE;
pub(crate) use self::handler::{BridgeConnectionHandler, ConnectionHandler, ConnectionLimits};
pub(crate) use self::listener::{BridgeListener, JoinOutcome, ListenerHandle};
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
