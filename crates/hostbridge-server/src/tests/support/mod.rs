//! Shared fixtures for the server test suites.

mod host;
mod reporter;
mod wire;

pub use host::{RecordingHost, recording_table};
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use wire::{exchange, exchange_raw};
