//! FIFO execution queue drained by the host's own periodic callback.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use hostbridge_protocol::Response;

use super::SCHEDULER_TARGET;
use super::task::{ExecutionTask, ResultSlot, TaskBody, TaskHandle};
use crate::dispatch::panic::contain;

/// Message delivered to waiters whose tasks never ran.
pub const STOPPED_MESSAGE: &str = "Server stopped before command executed";

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Armed with an empty queue.
    Idle,
    /// Armed with tasks waiting for the next tick.
    Scheduled,
    /// A tick is executing a batch.
    Draining,
    /// Not armed; scheduling is refused.
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        formatter.write_str(label)
    }
}

/// Errors returned when queueing work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The scheduler is not armed.
    #[error("Server stopped before command executed")]
    Stopped,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks executed during this tick.
    pub executed: usize,
    /// Tasks still queued afterwards.
    pub pending: usize,
    /// Wall time spent executing the batch.
    pub elapsed: Duration,
}

/// Read-only view used by status reporting.
pub(crate) trait SchedulerView: Send + Sync {
    fn state(&self) -> SchedulerState;
    fn pending(&self) -> usize;
    fn batch_size(&self) -> usize;
}

struct QueueState<H> {
    tasks: VecDeque<ExecutionTask<H>>,
    state: SchedulerState,
    owner: Option<ThreadId>,
}

impl<H> QueueState<H> {
    fn resting_state(&self) -> SchedulerState {
        if self.tasks.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::Scheduled
        }
    }
}

/// Single-consumer queue whose tasks run only on the thread that ticks it.
///
/// Connection threads call [`MainThreadScheduler::schedule`]; the host calls
/// [`MainThreadScheduler::tick`] from its own timer with exclusive access to
/// its state. Each tick runs at most `batch_size` tasks in enqueue order, so
/// a long task delays the tasks behind it and the next tick.
pub struct MainThreadScheduler<H> {
    queue: Mutex<QueueState<H>>,
    batch_size: usize,
    next_id: AtomicU64,
}

impl<H> MainThreadScheduler<H> {
    /// Creates a disarmed scheduler. A zero batch size is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                state: SchedulerState::Stopped,
                owner: None,
            }),
            batch_size: batch_size.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<H>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the drain callback, replacing any earlier registration.
    ///
    /// The next tick binds the scheduler to the calling thread.
    pub fn arm(&self) {
        let mut queue = self.lock();
        if queue.state != SchedulerState::Stopped {
            debug!(target: SCHEDULER_TARGET, "re-arming scheduler");
        }
        queue.owner = None;
        queue.state = queue.resting_state();
        info!(
            target: SCHEDULER_TARGET,
            batch_size = self.batch_size,
            pending = queue.tasks.len(),
            "scheduler armed"
        );
    }

    /// Queues `body` for the main thread.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Stopped`] while disarmed.
    pub fn schedule(
        &self,
        kind: impl Into<String>,
        body: TaskBody<H>,
    ) -> Result<TaskHandle, ScheduleError> {
        let kind = kind.into();
        let mut queue = self.lock();
        if queue.state == SchedulerState::Stopped {
            return Err(ScheduleError::Stopped);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(ResultSlot::default());
        queue.tasks.push_back(ExecutionTask {
            id,
            kind: kind.clone(),
            body,
            slot: Arc::clone(&slot),
            enqueued_at: Instant::now(),
        });
        if queue.state == SchedulerState::Idle {
            queue.state = SchedulerState::Scheduled;
        }
        debug!(
            target: SCHEDULER_TARGET,
            task = id,
            kind = %kind,
            pending = queue.tasks.len(),
            "task queued"
        );
        Ok(TaskHandle::new(id, kind, slot))
    }

    /// Runs up to one batch of queued tasks on the calling thread.
    ///
    /// Returns `None` once the scheduler is disarmed, signalling the host to
    /// drop its timer. Ticks from a thread other than the one that first
    /// ticked this run are refused and execute nothing.
    pub fn tick(&self, host: &mut H) -> Option<TickReport> {
        let batch = {
            let mut queue = self.lock();
            if queue.state == SchedulerState::Stopped {
                return None;
            }
            let current = thread::current().id();
            match queue.owner {
                None => queue.owner = Some(current),
                Some(owner) if owner != current => {
                    warn!(
                        target: SCHEDULER_TARGET,
                        "tick refused: called off the main thread"
                    );
                    return Some(TickReport {
                        executed: 0,
                        pending: queue.tasks.len(),
                        elapsed: Duration::ZERO,
                    });
                }
                Some(_) => {}
            }
            let take = queue.tasks.len().min(self.batch_size);
            if take == 0 {
                return Some(TickReport {
                    executed: 0,
                    pending: 0,
                    elapsed: Duration::ZERO,
                });
            }
            queue.state = SchedulerState::Draining;
            queue.tasks.drain(..take).collect::<Vec<_>>()
        };

        let started = Instant::now();
        let executed = batch.len();
        for task in batch {
            run_task(task, host);
        }
        let elapsed = started.elapsed();

        let mut queue = self.lock();
        if queue.state == SchedulerState::Draining {
            queue.state = queue.resting_state();
        }
        Some(TickReport {
            executed,
            pending: queue.tasks.len(),
            elapsed,
        })
    }

    /// Disarms the scheduler and fails every task still queued.
    pub fn stop(&self) {
        let abandoned: Vec<ExecutionTask<H>> = {
            let mut queue = self.lock();
            queue.state = SchedulerState::Stopped;
            queue.owner = None;
            queue.tasks.drain(..).collect()
        };
        if !abandoned.is_empty() {
            info!(
                target: SCHEDULER_TARGET,
                failed = abandoned.len(),
                "failing queued tasks on stop"
            );
        }
        for task in abandoned {
            task.slot.complete(Response::error(STOPPED_MESSAGE));
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Maximum tasks executed per tick.
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<H> SchedulerView for MainThreadScheduler<H> {
    fn state(&self) -> SchedulerState {
        Self::state(self)
    }

    fn pending(&self) -> usize {
        Self::pending(self)
    }

    fn batch_size(&self) -> usize {
        Self::batch_size(self)
    }
}

impl<H> fmt::Debug for MainThreadScheduler<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MainThreadScheduler")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

fn run_task<H>(task: ExecutionTask<H>, host: &mut H) {
    let ExecutionTask {
        id,
        kind,
        body,
        slot,
        enqueued_at,
    } = task;
    let waited = enqueued_at.elapsed();
    let response = contain(|| body(host)).unwrap_or_else(|caught| {
        warn!(
            target: SCHEDULER_TARGET,
            task = id,
            kind = %kind,
            message = %caught.message,
            "task body panicked"
        );
        match caught.backtrace {
            Some(trace) => Response::error_with_traceback(
                format!("Task '{kind}' panicked: {}", caught.message),
                trace,
            ),
            None => Response::error(format!("Task '{kind}' panicked: {}", caught.message)),
        }
    });
    if !slot.complete(response) {
        info!(
            target: SCHEDULER_TARGET,
            task = id,
            kind = %kind,
            waited_ms = waited.as_millis(),
            "discarding result of abandoned task"
        );
    }
}
