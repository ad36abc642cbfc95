//! Server lifecycle, statistics, health and status reporting.

mod bridge;
mod errors;
mod health;
pub(crate) mod stats;
mod status;

pub use self::bridge::BridgeServer;
pub use self::errors::BridgeError;
pub use self::health::{HealthBasis, HealthVerdict};
pub(crate) use self::stats::ServerStats;
pub use self::status::{
    CommandsSection, ConnectionsSection, SchedulerSection, ServerSection, ServerState,
    StatusReport,
};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");
