use super::writes::WriteBuffer;
use crate::signal::Signal;
use crate::task::{Task, TaskHandle};
use crate::trigger::{Event, Trigger};
use crate::value::Value;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use log::{debug, trace};
use parking_lot::Mutex;

/// Queues trigger firings into a scheduler from outside its call stack.
///
/// Cloning a `Firer` allows multiple producers (events, boundary callbacks
/// arriving on another thread) to hand triggers back to the scheduler. The
/// scheduler delivers them when its current reaction unwinds, or when the
/// owner calls [`Scheduler::react_pending`](crate::Scheduler::react_pending).
#[derive(Clone)]
pub struct Firer {
    sender: Sender<Trigger>,
}

impl Firer {
    pub(crate) fn new(sender: Sender<Trigger>) -> Self {
        Self { sender }
    }

    /// Queues `trigger` as fired.
    pub fn fire(&self, trigger: Trigger) {
        if let Err(err) = self.sender.send(trigger) {
            debug!(
                target: "strobe::scheduler",
                "dropping firing of {}: scheduler is gone",
                err.0
            );
        }
    }
}

/// State shared between a scheduler and the tasks it resumes.
struct Shared {
    /// Writes waiting for the next write-enabled phase.
    writes: Mutex<WriteBuffer>,

    /// Set while a flush is scheduled and has not run yet.
    flush_scheduled: AtomicBool,

    /// Tasks forked since the scheduler last looked, in fork order.
    forks: Mutex<VecDeque<(TaskHandle, Box<dyn Task>)>>,

    firer: Firer,
}

/// A cloneable handle to a scheduler's shared state.
///
/// Tasks receive it through [`Cx`](crate::task::Cx); coroutine bodies reach
/// it implicitly through [`Signal::set`](crate::Signal::set) and
/// [`fork`](crate::task::fork). All mutation goes through mutexes, so a
/// handle may be used from a boundary callback that arrives off the
/// scheduler's own call path.
#[derive(Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl Handle {
    pub(crate) fn new(firer: Firer) -> Self {
        Self {
            shared: Arc::new(Shared {
                writes: Mutex::new(WriteBuffer::new()),
                flush_scheduled: AtomicBool::new(false),
                forks: Mutex::new(VecDeque::new()),
                firer,
            }),
        }
    }

    /// Buffers a write of `value` to `signal`.
    ///
    /// Replaces any write of the same signal still waiting for the next
    /// write-enabled phase.
    pub fn save_write(&self, signal: &Signal, value: Value) {
        trace!(target: "strobe::scheduler", "buffering {signal} <= {value}");
        self.shared.writes.lock().save(signal.clone(), value);
    }

    /// Number of signals with a buffered write.
    pub fn pending_writes(&self) -> usize {
        self.shared.writes.lock().len()
    }

    /// Returns `true` while a flush of the write buffer is scheduled.
    pub fn flush_scheduled(&self) -> bool {
        self.shared.flush_scheduled.load(Ordering::Acquire)
    }

    /// Queues a new top-level task.
    ///
    /// The scheduler starts it as soon as the task currently running
    /// suspends or finishes.
    pub fn fork(&self, task: impl Task + 'static) -> TaskHandle {
        self.fork_boxed(Box::new(task))
    }

    pub fn fork_boxed(&self, task: Box<dyn Task>) -> TaskHandle {
        let handle = TaskHandle::new(task.name());
        debug!(target: "strobe::scheduler", "forking {}", handle.name());

        self.shared.forks.lock().push_back((handle.clone(), task));
        handle
    }

    /// Creates an [`Event`] whose firings are delivered to this scheduler.
    pub fn event(&self, name: impl Into<String>) -> Event {
        Event::new(name, self.firer())
    }

    pub fn firer(&self) -> Firer {
        self.shared.firer.clone()
    }

    pub(crate) fn set_flush_scheduled(&self, scheduled: bool) {
        self.shared
            .flush_scheduled
            .store(scheduled, Ordering::Release);
    }

    /// Empties the write buffer in one step, returning its entries in the
    /// order their signals were first written.
    pub(crate) fn take_writes(&self) -> Vec<(Signal, Value)> {
        self.shared.writes.lock().take()
    }

    pub(crate) fn pop_fork(&self) -> Option<(TaskHandle, Box<dyn Task>)> {
        self.shared.forks.lock().pop_front()
    }
}
