use super::Handle;
use crate::task::{Awaitable, TaskHandle};
use crate::trigger::Trigger;

use std::cell::RefCell;

/// Per-resumption state of the coroutine being polled.
pub(crate) struct Frame {
    pub(crate) handle: Handle,
    pub(crate) task: TaskHandle,

    /// Trigger that caused this resumption, until the awaiting future
    /// picks it up.
    delivered: Option<Trigger>,

    /// What the coroutine asked to suspend on.
    request: Option<Awaitable>,

    /// Set if more than one suspension was requested in a single poll.
    conflict: bool,
}

impl Frame {
    pub(crate) fn new(handle: Handle, task: TaskHandle, delivered: Option<Trigger>) -> Self {
        Self {
            handle,
            task,
            delivered,
            request: None,
            conflict: false,
        }
    }

    /// Returns the single suspension requested during the poll.
    ///
    /// `Err` carries a description of why the suspension is unusable.
    pub(crate) fn into_request(self) -> Result<Awaitable, &'static str> {
        if self.conflict {
            return Err("awaited more than one thing at once");
        }

        self.request
            .ok_or("suspended without awaiting a trigger or task")
    }
}

thread_local! {
    /// Frame of the coroutine currently being polled on this thread.
    ///
    /// Installed by the coroutine adapter around each poll so that
    /// `Signal::set`, `fork` and trigger futures can reach the scheduler
    /// without explicit parameter passing.
    static CURRENT_FRAME: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

/// Runs `f` with `frame` installed as the current frame.
///
/// Returns the result of `f` together with the frame as `f` left it. The
/// previous frame is restored afterwards, so nested scheduling from inside a
/// poll sees its own frame.
pub(crate) fn enter<R>(frame: Frame, f: impl FnOnce() -> R) -> (R, Option<Frame>) {
    let prev = CURRENT_FRAME.with(|c| c.replace(Some(frame)));

    let out = f();

    let frame = CURRENT_FRAME.with(|c| c.replace(prev));
    (out, frame)
}

/// Calls `f` with the handle of the scheduler resuming the current task.
///
/// # Panics
///
/// Panics if no task is being resumed on this thread.
pub(crate) fn with_handle<R>(f: impl FnOnce(&Handle) -> R) -> R {
    let handle = CURRENT_FRAME
        .with(|c| c.borrow().as_ref().map(|frame| frame.handle.clone()))
        .expect("must be called from a task resumed by a strobe scheduler");

    f(&handle)
}

pub(crate) fn current_task() -> Option<TaskHandle> {
    CURRENT_FRAME.with(|c| c.borrow().as_ref().map(|frame| frame.task.clone()))
}

/// Records what the current coroutine wants to suspend on.
///
/// # Panics
///
/// Panics if no task is being resumed on this thread.
pub(crate) fn request(awaitable: Awaitable) {
    CURRENT_FRAME.with(|c| {
        let mut current = c.borrow_mut();
        let frame = current
            .as_mut()
            .expect("strobe triggers can only be awaited inside a strobe task");

        if frame.request.is_some() {
            frame.conflict = true;
        } else {
            frame.request = Some(awaitable);
        }
    })
}

/// Takes the trigger that caused the current resumption.
pub(crate) fn take_delivered() -> Option<Trigger> {
    CURRENT_FRAME.with(|c| c.borrow_mut().as_mut().and_then(|frame| frame.delivered.take()))
}
