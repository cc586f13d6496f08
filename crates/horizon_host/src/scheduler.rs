//! Tick-based task scheduling.
//!
//! The host advances time in discrete server ticks (20 per second on a
//! default configuration). Components never sleep; they register a repeating
//! or delayed task and keep the returned [`TimerHandle`] so they can cancel it.
//!
//! [`TickScheduler`] is the reference implementation. It is cooperative: a
//! callback runs to completion before the next one starts, and the scheduler
//! never holds its own lock while a callback runs, so callbacks are free to
//! schedule new tasks or cancel existing ones (including themselves).

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// Callback for a repeating task. Receives its own handle so it can self-cancel.
pub type RepeatingTask = Box<dyn FnMut(&TimerHandle) + Send>;

/// Callback for a task that runs once after a delay.
pub type OnceTask = Box<dyn FnOnce() + Send>;

/// Host scheduling facility.
///
/// Intervals and delays are expressed in ticks. A value of zero is treated as
/// one tick: nothing scheduled from inside a tick runs in that same tick.
pub trait Scheduler: Send + Sync {
    /// Runs `task` every `interval_ticks` ticks until the handle is cancelled.
    fn schedule_repeating(&self, interval_ticks: u64, task: RepeatingTask) -> TimerHandle;

    /// Runs `task` once, `delay_ticks` ticks from now.
    fn schedule_once(&self, delay_ticks: u64, task: OnceTask) -> TimerHandle;
}

/// Cancellation handle for a scheduled task.
///
/// Handles are cheap to clone; every clone controls the same task.
/// Cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Scheduler-unique id of the task.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancels the task.
    ///
    /// Returns `true` only for the call that actually performed the
    /// cancellation; any later call is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl PartialEq for TimerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TimerHandle {}

enum TaskKind {
    Once(OnceTask),
    Repeating { interval: u64, task: RepeatingTask },
}

struct ScheduledTask {
    handle: TimerHandle,
    next_run: u64,
    kind: TaskKind,
}

#[derive(Default)]
struct SchedulerState {
    current_tick: u64,
    tasks: Vec<ScheduledTask>,
}

/// Deterministic scheduler driven by explicit [`tick`](TickScheduler::tick) calls.
///
/// The host calls `tick()` once per server tick from its main loop. Tests
/// call [`advance`](TickScheduler::advance) to fast-forward.
pub struct TickScheduler {
    state: Mutex<SchedulerState>,
    next_id: AtomicU64,
}

impl TickScheduler {
    /// Creates a scheduler positioned at tick 0 with no tasks.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The number of ticks processed so far.
    pub fn current_tick(&self) -> u64 {
        self.state.lock().current_tick
    }

    /// Number of tasks still waiting to run (cancelled tasks are not counted).
    pub fn pending_tasks(&self) -> usize {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|task| !task.handle.is_cancelled())
            .count()
    }

    /// Advances one tick and runs every task that has come due.
    ///
    /// Returns the number of callbacks executed. Due tasks run in the order
    /// they were scheduled. A callback that panics is logged and, if
    /// repeating, cancelled; the remaining callbacks still run.
    pub fn tick(&self) -> usize {
        let (now, due) = {
            let mut state = self.state.lock();
            state.current_tick += 1;
            let now = state.current_tick;

            let mut due = Vec::new();
            let mut waiting = Vec::with_capacity(state.tasks.len());
            for task in state.tasks.drain(..) {
                if task.handle.is_cancelled() {
                    continue;
                }
                if task.next_run <= now {
                    due.push(task);
                } else {
                    waiting.push(task);
                }
            }
            state.tasks = waiting;
            (now, due)
        };

        let executed = due.len();
        let mut requeue = Vec::new();

        for task in due {
            let ScheduledTask { handle, kind, .. } = task;
            // Cancelled by an earlier callback in this same tick.
            if handle.is_cancelled() {
                continue;
            }

            match kind {
                TaskKind::Once(callback) => {
                    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                        error!("Scheduled task {} panicked at tick {}", handle.id(), now);
                    }
                    handle.cancel();
                }
                TaskKind::Repeating { interval, mut task } => {
                    let outcome = catch_unwind(AssertUnwindSafe(|| task(&handle)));
                    if outcome.is_err() {
                        error!(
                            "Repeating task {} panicked at tick {}, cancelling it",
                            handle.id(),
                            now
                        );
                        handle.cancel();
                    }
                    if !handle.is_cancelled() {
                        requeue.push(ScheduledTask {
                            handle,
                            next_run: now.saturating_add(interval),
                            kind: TaskKind::Repeating { interval, task },
                        });
                    }
                }
            }
        }

        if !requeue.is_empty() {
            let mut state = self.state.lock();
            state.tasks.extend(requeue);
            state.tasks.sort_by_key(|task| task.handle.id());
        }

        trace!("Tick {} executed {} task(s)", now, executed);
        executed
    }

    /// Runs `ticks` consecutive ticks, returning the total number of callbacks executed.
    pub fn advance(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }

    fn push(&self, delay: u64, kind: TaskKind) -> TimerHandle {
        let handle = TimerHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        let next_run = state.current_tick.saturating_add(delay.max(1));
        state.tasks.push(ScheduledTask {
            handle: handle.clone(),
            next_run,
            kind,
        });
        handle
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TickScheduler {
    fn schedule_repeating(&self, interval_ticks: u64, task: RepeatingTask) -> TimerHandle {
        let interval = interval_ticks.max(1);
        self.push(interval, TaskKind::Repeating { interval, task })
    }

    fn schedule_once(&self, delay_ticks: u64, task: OnceTask) -> TimerHandle {
        self.push(delay_ticks, TaskKind::Once(task))
    }
}
