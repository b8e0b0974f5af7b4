/// Task exists but has not been started yet.
///
/// Forked tasks sit in this state until the forking task suspends.
pub(crate) const CREATED: usize = 0;

/// Task is executing its current resumption.
///
/// At most one task per scheduler observes this state at a time, apart from
/// the tasks further up the stack of a nested start.
pub(crate) const RUNNING: usize = 1;

/// Task is parked in the waiting registry.
pub(crate) const SUSPENDED: usize = 2;

/// Task returned normally. Its result is available.
pub(crate) const COMPLETED: usize = 3;

/// Task reported an error.
pub(crate) const FAILED: usize = 4;

/// Task was terminated by the scheduler before it finished.
pub(crate) const KILLED: usize = 5;

/// Lifecycle state of a task, as observed through a
/// [`TaskHandle`](super::TaskHandle).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Suspended,
    Completed,
    Failed,
    Killed,
}

impl TaskState {
    pub(crate) fn from_raw(raw: usize) -> Self {
        match raw {
            CREATED => TaskState::Created,
            RUNNING => TaskState::Running,
            SUSPENDED => TaskState::Suspended,
            COMPLETED => TaskState::Completed,
            FAILED => TaskState::Failed,
            _ => TaskState::Killed,
        }
    }

    /// Returns `true` once the task can no longer be resumed.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Killed
        )
    }
}
