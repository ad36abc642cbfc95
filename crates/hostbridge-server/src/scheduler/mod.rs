//! Marshals queued commands onto the host's main thread.

mod queue;
mod task;

pub(crate) use self::queue::SchedulerView;
pub use self::queue::{MainThreadScheduler, STOPPED_MESSAGE, ScheduleError, SchedulerState, TickReport};
pub use self::task::{TaskBody, TaskHandle};

const SCHEDULER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scheduler");
