//! Queued work and its single-use result slot.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use hostbridge_protocol::Response;

/// Work executed on the main thread against host state `H`.
pub type TaskBody<H> = Box<dyn FnOnce(&mut H) -> Response + Send + 'static>;

/// A queued unit of work.
pub(crate) struct ExecutionTask<H> {
    pub(crate) id: u64,
    pub(crate) kind: String,
    pub(crate) body: TaskBody<H>,
    pub(crate) slot: Arc<ResultSlot>,
    pub(crate) enqueued_at: Instant,
}

#[derive(Debug, Default)]
struct SlotState {
    completed: bool,
    abandoned: bool,
    response: Option<Response>,
}

/// One-writer, one-reader rendezvous between the main thread and the
/// connection thread waiting on a task.
#[derive(Debug, Default)]
pub(crate) struct ResultSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl ResultSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the result and wakes the waiter.
    ///
    /// Returns `false` when the waiter has already given up, in which case
    /// the response is dropped. A second completion is ignored.
    pub(crate) fn complete(&self, response: Response) -> bool {
        let mut state = self.lock();
        if state.completed {
            return false;
        }
        state.completed = true;
        if state.abandoned {
            return false;
        }
        state.response = Some(response);
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Waits up to `timeout` for the result.
    ///
    /// On timeout the slot is marked abandoned so a late completion is
    /// discarded.
    pub(crate) fn wait(&self, timeout: Duration) -> Option<Response> {
        let guard = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |state| !state.completed)
            .unwrap_or_else(PoisonError::into_inner);
        if state.completed {
            return state.response.take();
        }
        state.abandoned = true;
        None
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.lock().completed
    }
}

/// Waiter side of a scheduled task.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    kind: String,
    slot: Arc<ResultSlot>,
}

impl TaskHandle {
    pub(crate) const fn new(id: u64, kind: String, slot: Arc<ResultSlot>) -> Self {
        Self { id, kind, slot }
    }

    /// Sequence number assigned at enqueue time.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Command type of the task.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns true once the main thread has produced a result.
    pub fn is_completed(&self) -> bool {
        self.slot.is_completed()
    }

    /// Blocks until the result arrives or `timeout` elapses.
    ///
    /// Returns `None` on timeout. The task itself is not cancelled: it still
    /// runs when the main thread reaches it and its result is discarded.
    pub fn wait(self, timeout: Duration) -> Option<Response> {
        self.slot.wait(timeout)
    }
}
