use super::state::{COMPLETED, CREATED, TaskState};
use crate::trigger::{Trigger, TriggerKind};
use crate::value::Value;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Unique identifier of a task.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TaskId(u64);

static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    fn fresh() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct TaskShared {
    id: TaskId,
    name: String,

    /// Current lifecycle state (CREATED, RUNNING, etc.).
    state: AtomicUsize,

    /// Value returned by the task, once it completed.
    result: Mutex<Option<Value>>,
}

/// An observer of a task owned by a scheduler.
///
/// A `TaskHandle` exposes the task's identity, its lifecycle state and, once
/// it completed, its result. Awaiting a handle from a coroutine suspends
/// until the task finishes and yields its result.
///
/// Dropping the handle does **not** affect the task.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskShared>,
}

impl TaskHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TaskShared {
                id: TaskId::fresh(),
                name: name.into(),
                state: AtomicUsize::new(CREATED),
                result: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_raw(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// The value the task returned. `None` until it completed.
    pub fn result(&self) -> Option<Value> {
        self.inner.result.lock().clone()
    }

    /// Returns a fresh trigger that fires when this task finishes.
    ///
    /// If the task already finished, the trigger fires as soon as it is
    /// waited on.
    pub fn join(&self) -> Trigger {
        Trigger::new(TriggerKind::Join(self.clone()))
    }

    pub(crate) fn set_state(&self, state: usize) {
        self.inner.state.store(state, Ordering::Release);
    }

    /// Stores the result, then publishes the completion.
    pub(crate) fn complete(&self, value: Value) {
        *self.inner.result.lock() = Some(value);
        self.set_state(COMPLETED);
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.inner.id.0)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
