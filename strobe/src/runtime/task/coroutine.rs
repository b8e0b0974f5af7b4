use super::{Awaitable, Cx, Resumption, Task, TaskHandle};
use crate::error::{Exit, TaskError, Verdict};
use crate::runtime::context::{self, Frame};
use crate::trigger::Trigger;
use crate::value::Value;

use std::future::IntoFuture;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use log::trace;

/// What a coroutine body returns.
pub type TaskResult = Result<Value, Exit>;

type BoxFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Routine,
    Test,
}

/// Adapts an `async` block into a [`Task`].
///
/// The body may only await things the scheduler understands: a
/// [`Trigger`], [`first_of`], [`nested`], or a [`TaskHandle`]. The future
/// is polled once per resumption with a no-op waker; each await records
/// what the body suspends on, and the trigger that fired is handed back on
/// the next poll.
///
/// # Examples
///
/// ```rust,ignore
/// let driver = Coroutine::new("driver", async move {
///     clk.set(1);
///     Trigger::timer(10).await;
///     clk.set(0);
///     Ok(Value::None)
/// });
/// ```
pub struct Coroutine {
    name: String,
    future: Option<BoxFuture>,
    role: Role,
}

impl Coroutine {
    /// Wraps a routine. Its return value becomes the task's result.
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Some(Box::pin(future)),
            role: Role::Routine,
        }
    }

    /// Wraps a test body.
    ///
    /// Returning normally ends the whole run with a passing verdict.
    pub fn test<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            role: Role::Test,
            ..Self::new(name, future)
        }
    }

    fn step(&mut self, delivered: Option<Trigger>, cx: &Cx<'_>) -> Resumption {
        let Some(future) = self.future.as_mut() else {
            return Resumption::Failed(TaskError::msg(format!(
                "coroutine `{}` resumed after it finished",
                self.name
            )));
        };

        let frame = Frame::new(cx.handle().clone(), cx.task().clone(), delivered);

        let (poll, frame) = context::enter(frame, || {
            let mut poll_cx = Context::from_waker(Waker::noop());
            future.as_mut().poll(&mut poll_cx)
        });

        match poll {
            Poll::Ready(result) => {
                self.future = None;
                self.finish(result)
            }
            Poll::Pending => match frame.map(Frame::into_request) {
                Some(Ok(awaitable)) => {
                    trace!(target: "strobe::task", "{} suspends on {awaitable:?}", self.name);
                    Resumption::Suspended(awaitable)
                }
                Some(Err(reason)) => Resumption::Failed(TaskError::Unschedulable(reason.into())),
                None => Resumption::Failed(TaskError::msg("coroutine frame lost during poll")),
            },
        }
    }

    fn finish(&self, result: TaskResult) -> Resumption {
        match (result, self.role) {
            (Ok(_), Role::Test) => Resumption::RunFinished(Verdict::Pass),
            (Ok(value), Role::Routine) => Resumption::done(value),
            (Err(Exit::Finished(verdict)), _) => Resumption::RunFinished(verdict),
            (Err(Exit::Error(error)), _) => Resumption::Failed(error),
        }
    }
}

impl Task for Coroutine {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, cx: &Cx<'_>) -> Resumption {
        self.step(None, cx)
    }

    fn resume(&mut self, fired: Trigger, cx: &Cx<'_>) -> Resumption {
        self.step(Some(fired), cx)
    }

    fn kill(&mut self) {
        if self.future.take().is_some() {
            trace!(target: "strobe::task", "{} dropped before completion", self.name);
        }
    }
}

/// Future returned by awaiting a [`Trigger`] or [`first_of`].
///
/// Resolves to the trigger that fired.
#[must_use = "futures do nothing unless awaited"]
pub struct Wait {
    pending: Option<Awaitable>,
}

impl Wait {
    fn new(awaitable: Awaitable) -> Self {
        Self {
            pending: Some(awaitable),
        }
    }
}

impl Future for Wait {
    type Output = Trigger;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Trigger> {
        let this = self.get_mut();

        if let Some(awaitable) = this.pending.take() {
            context::request(awaitable);
            return Poll::Pending;
        }

        match context::take_delivered() {
            Some(trigger) => Poll::Ready(trigger),
            None => Poll::Pending,
        }
    }
}

impl IntoFuture for Trigger {
    type Output = Trigger;
    type IntoFuture = Wait;

    fn into_future(self) -> Wait {
        Wait::new(Awaitable::Single(self))
    }
}

/// Suspends on several triggers at once and resolves to the first to fire.
pub fn first_of(triggers: impl IntoIterator<Item = Trigger>) -> Wait {
    Wait::new(Awaitable::FanOut(triggers.into_iter().collect()))
}

/// Future resolving to the result of a task once it finished.
#[must_use = "futures do nothing unless awaited"]
pub struct Joined {
    wait: Wait,
}

impl Future for Joined {
    type Output = Value;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Value> {
        Pin::new(&mut self.wait).poll(cx).map(|fired| {
            fired
                .joined_task()
                .and_then(TaskHandle::result)
                .unwrap_or_default()
        })
    }
}

/// Runs `task` nested under the current coroutine.
///
/// The task starts immediately, before the awaiting coroutine is resumed
/// again, and the await resolves to its result. A task that was killed or
/// failed yields [`Value::None`].
pub fn nested(task: impl Task + 'static) -> Joined {
    Joined {
        wait: Wait::new(Awaitable::Join(Box::new(task))),
    }
}

impl IntoFuture for TaskHandle {
    type Output = Value;
    type IntoFuture = Joined;

    fn into_future(self) -> Joined {
        Joined {
            wait: Wait::new(Awaitable::Single(self.join())),
        }
    }
}

/// Starts `task` as a new top-level task.
///
/// The task starts as soon as the current coroutine suspends.
///
/// # Panics
///
/// Panics if called outside of a task resumed by a scheduler.
pub fn fork(task: impl Task + 'static) -> TaskHandle {
    context::with_handle(|handle| handle.fork(task))
}

/// The task currently being resumed on this thread.
pub fn current() -> Option<TaskHandle> {
    context::current_task()
}

/// Ends the run with a passing verdict.
///
/// ```rust,ignore
/// return Err(pass());
/// ```
pub fn pass() -> Exit {
    Exit::Finished(Verdict::Pass)
}

/// Ends the run with a failing verdict.
pub fn fail(reason: impl Into<String>) -> Exit {
    Exit::Finished(Verdict::fail(reason))
}
