//! Shared configuration for the host bridge.
//!
//! The bridge server runs inside a single-threaded host application, the
//! client runs in an external control process, and the supervisor keeps the
//! server available. All three read their tunables from the structures in
//! this crate. Every structure deserialises with per-field defaults, so a
//! partial document only needs to name the values it overrides.

pub mod defaults;
mod endpoint;
mod logging;
mod settings;

pub use endpoint::{Endpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError, LoggingConfig};
pub use settings::{ClientConfig, Config, ServerConfig, SupervisorConfig};
