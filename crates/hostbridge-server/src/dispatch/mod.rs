//! Command dispatch.
//!
//! Commands are routed by type either inline on the connection thread or to a
//! host handler that runs on the main thread via the scheduler.

mod errors;
pub(crate) mod panic;
mod table;

pub use self::errors::{DispatchError, HandlerError};
pub use self::table::{DispatchTable, HandlerResult, Params, Route, StatusSource};
