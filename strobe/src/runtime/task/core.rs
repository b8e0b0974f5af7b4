use super::TaskHandle;
use crate::error::{TaskError, Verdict};
use crate::runtime::Handle;
use crate::signal::Signal;
use crate::trigger::{Event, Trigger};
use crate::value::Value;

use std::fmt;

/// A resumable unit of testbench behaviour.
///
/// A task is driven exclusively by its scheduler: it is started once, and
/// every later step happens in [`resume`](Task::resume) with the trigger
/// that woke it. Each step ends in a [`Resumption`] telling the scheduler
/// what to do next.
///
/// Most testbench code writes `async` blocks and wraps them in
/// [`Coroutine`](super::Coroutine) rather than implementing this trait.
pub trait Task: Send {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Runs the task up to its first suspension.
    fn start(&mut self, cx: &Cx<'_>) -> Resumption;

    /// Resumes the task with the trigger that fired.
    fn resume(&mut self, fired: Trigger, cx: &Cx<'_>) -> Resumption;

    /// Terminates the task before it finished.
    ///
    /// The scheduler calls this at most once per task and never after the
    /// task finished. The task will not be resumed afterwards.
    fn kill(&mut self) {}
}

/// What a suspending task waits on.
pub enum Awaitable {
    /// A single trigger.
    Single(Trigger),

    /// A task to run nested under the suspending one. The suspending task
    /// resumes with the nested task's join trigger once it finished.
    Join(Box<dyn Task>),

    /// Several triggers at once. The task resumes with whichever fires
    /// first.
    FanOut(Vec<Trigger>),
}

impl fmt::Debug for Awaitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Awaitable::Single(trigger) => write!(f, "Single({trigger})"),
            Awaitable::Join(task) => write!(f, "Join({})", task.name()),
            Awaitable::FanOut(triggers) => f.debug_list().entries(triggers).finish(),
        }
    }
}

/// Outcome of one task step.
#[derive(Debug)]
pub enum Resumption {
    /// The task suspended.
    Suspended(Awaitable),

    /// The task returned normally.
    Done(Completion),

    /// The task raised an error. This aborts the run.
    Failed(TaskError),

    /// The task decided the outcome of the whole run.
    RunFinished(Verdict),
}

impl Resumption {
    /// Suspends on a single trigger.
    pub fn wait(trigger: Trigger) -> Self {
        Resumption::Suspended(Awaitable::Single(trigger))
    }

    /// Completes with `value` and no callbacks.
    pub fn done(value: impl Into<Value>) -> Self {
        Resumption::Done(Completion::new(value))
    }
}

type Callback = Box<dyn FnOnce(&Value) + Send>;

/// The result of a task that returned normally.
///
/// Callbacks run in registration order once the task is retired, before any
/// task waiting on its completion is resumed.
pub struct Completion {
    value: Value,
    callbacks: Vec<Callback>,
}

impl Completion {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            callbacks: Vec::new(),
        }
    }

    /// Registers a callback that receives the task's result.
    pub fn on_complete(mut self, callback: impl FnOnce(&Value) + Send + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn into_parts(self) -> (Value, Vec<Callback>) {
        (self.value, self.callbacks)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("value", &self.value)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Context handed to a task for the duration of one step.
pub struct Cx<'a> {
    handle: &'a Handle,
    task: &'a TaskHandle,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(handle: &'a Handle, task: &'a TaskHandle) -> Self {
        Self { handle, task }
    }

    pub fn handle(&self) -> &Handle {
        self.handle
    }

    /// The task being stepped.
    pub fn task(&self) -> &TaskHandle {
        self.task
    }

    /// Buffers a write to `signal` until the next write-enabled phase.
    pub fn save_write(&self, signal: &Signal, value: impl Into<Value>) {
        self.handle.save_write(signal, value.into());
    }

    /// Queues a new top-level task, started once this step ends.
    pub fn fork(&self, task: impl Task + 'static) -> TaskHandle {
        self.handle.fork(task)
    }

    pub fn event(&self, name: impl Into<String>) -> Event {
        self.handle.event(name)
    }
}
