//! Error types for the scheduler and the tasks it drives.

use std::fmt;

use thiserror::Error;

/// Outcome of a whole run, produced when a task signals that the run is over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    /// Builds a failing verdict.
    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail(reason.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail(reason) => write!(f, "FAIL: {reason}"),
        }
    }
}

/// An error raised by a task while it was being resumed.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task suspended on something the scheduler cannot wait for.
    #[error("unschedulable: {0}")]
    Unschedulable(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Message(message.into())
    }
}

/// How a coroutine body leaves early.
///
/// `Finished` ends the whole run with a verdict, `Error` is an uncaught
/// failure that aborts it.
#[derive(Debug, Error)]
pub enum Exit {
    #[error("run finished: {0}")]
    Finished(Verdict),

    #[error(transparent)]
    Error(#[from] TaskError),
}

impl From<Verdict> for Exit {
    fn from(verdict: Verdict) -> Self {
        Exit::Finished(verdict)
    }
}

/// Fatal conditions that propagate out of the scheduler to the boundary.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task raised an uncaught error during resumption.
    #[error("task `{task}` failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: TaskError,
    },

    /// A task yielded a request the scheduler cannot register it on.
    #[error("task `{task}` is unschedulable: {reason}")]
    Unschedulable { task: String, reason: String },
}

impl SchedulerError {
    pub(crate) fn from_task(task: &str, error: TaskError) -> Self {
        match error {
            TaskError::Unschedulable(reason) => SchedulerError::Unschedulable {
                task: task.to_owned(),
                reason,
            },
            source => SchedulerError::TaskFailed {
                task: task.to_owned(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unschedulable_task_error_maps_to_unschedulable() {
        let err = SchedulerError::from_task("driver", TaskError::Unschedulable("pending".into()));

        assert!(matches!(err, SchedulerError::Unschedulable { .. }));
        assert!(err.to_string().contains("driver"));
    }

    #[test]
    fn other_errors_map_to_task_failed() {
        let err = SchedulerError::from_task("monitor", TaskError::msg("bad parity"));

        assert!(matches!(err, SchedulerError::TaskFailed { .. }));
        assert_eq!(err.to_string(), "task `monitor` failed: bad parity");
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(Verdict::fail("mismatch").to_string(), "FAIL: mismatch");
    }
}
