use super::builder::{FanOutPolicy, SchedulerBuilder};
use super::handle::{Firer, Handle};
use super::registry::WaitingRegistry;
use super::writes::PhaseMover;
use crate::error::{SchedulerError, TaskError, Verdict};
use crate::signal::Signal;
use crate::task::state::{FAILED, KILLED, RUNNING, SUSPENDED};
use crate::task::{Awaitable, Cx, Resumption, Task, TaskHandle};
use crate::trigger::{Boundary, Trigger};
use crate::utils::{Key, Slab};
use crate::value::Value;

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use log::{Level, debug, error, info, log_enabled, warn};

/// A task owned by the scheduler.
struct Entry {
    handle: TaskHandle,

    /// `None` while the task is being resumed further up the stack.
    body: Option<Box<dyn Task>>,

    started: bool,

    /// Triggers the task is registered on, in registration order.
    waiting_on: Vec<Trigger>,
}

/// The coroutine scheduler.
///
/// `Scheduler` is responsible for:
/// - registering suspended tasks on the triggers they wait for,
/// - resuming every waiter of a trigger when the boundary fires it,
/// - buffering signal writes and applying them in the write-enabled phase,
/// - tearing the run down once a task reports its verdict.
///
/// It is driven entirely from the outside: the boundary calls
/// [`react`](Self::react) once per firing, and every resumption happens on
/// that call's stack.
pub struct Scheduler {
    /// Simulator side of the trigger contract.
    boundary: Arc<dyn Boundary>,

    /// State shared with running tasks.
    handle: Handle,

    /// Firings queued from outside the current call stack.
    fired: Receiver<Trigger>,

    tasks: Slab<Entry>,
    registry: WaitingRegistry,
    config: SchedulerBuilder,

    /// Fired to wake the phase mover when writes are left behind.
    flush_request: Trigger,
    phase_mover: TaskHandle,

    /// Number of reactions currently on the stack.
    depth: usize,

    /// Set while the firing queue is being drained.
    draining: bool,

    verdict: Option<Verdict>,
}

impl Scheduler {
    /// Creates a scheduler with the default configuration.
    ///
    /// The phase mover is created and parked right away.
    pub fn new(boundary: Arc<dyn Boundary>) -> Self {
        SchedulerBuilder::new().build(boundary)
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn with_config(boundary: Arc<dyn Boundary>, config: SchedulerBuilder) -> Self {
        let (sender, fired) = mpsc::channel();
        let flush_request = Trigger::internal("flush-request");
        let phase_mover = TaskHandle::new("phase-mover");

        let mut scheduler = Self {
            boundary,
            handle: Handle::new(Firer::new(sender)),
            fired,
            tasks: Slab::new(64),
            registry: WaitingRegistry::new(),
            config,
            flush_request: flush_request.clone(),
            phase_mover: phase_mover.clone(),
            depth: 0,
            draining: false,
            verdict: None,
        };

        let key = scheduler.insert(phase_mover, Box::new(PhaseMover::new(flush_request)));
        if let Err(err) = scheduler.schedule(key, None) {
            error!(target: "strobe::scheduler", "phase mover failed to start: {err}");
        }

        scheduler
    }

    /// Inserts `task` and starts it immediately.
    ///
    /// The task runs up to its first suspension before this returns. Adding
    /// a task to a finished scheduler kills it without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the task, or anything it started, failed.
    pub fn add(&mut self, task: impl Task + 'static) -> Result<TaskHandle, SchedulerError> {
        self.add_boxed(Box::new(task))
    }

    pub fn add_boxed(&mut self, mut task: Box<dyn Task>) -> Result<TaskHandle, SchedulerError> {
        let handle = TaskHandle::new(task.name());

        if let Some(verdict) = &self.verdict {
            warn!(
                target: "strobe::scheduler",
                "not starting {}: the run already finished ({verdict})",
                handle.name()
            );
            task.kill();
            handle.set_state(KILLED);
            return Ok(handle);
        }

        debug!(target: "strobe::scheduler", "Queuing new task {}", handle.name());

        let key = self.insert(handle.clone(), task);
        self.reaction(|this| {
            this.schedule(key, None)?;
            this.request_flush()
        })?;

        Ok(handle)
    }

    /// Resumes every task waiting on `trigger`.
    ///
    /// Called by the boundary once per firing. The waiting list is detached
    /// before anyone is resumed, so tasks that wait on the same trigger
    /// again are parked for its next firing. A trigger nobody waits on is
    /// logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a resumed task failed or suspended on something
    /// the scheduler cannot wait for. The run is torn down with a failing
    /// verdict before the error is returned.
    pub fn react(&mut self, trigger: &Trigger) -> Result<(), SchedulerError> {
        self.reaction(|this| this.react_inner(trigger))
    }

    /// Delivers firings queued through a [`Firer`].
    ///
    /// [`react`](Self::react) does this itself when it returns to the
    /// boundary; call it directly after queuing firings from another thread.
    pub fn react_pending(&mut self) -> Result<(), SchedulerError> {
        if self.draining {
            return Ok(());
        }

        self.draining = true;

        let mut result = Ok(());
        while let Ok(trigger) = self.fired.try_recv() {
            result = self.react(&trigger);

            if result.is_err() {
                break;
            }
        }

        self.draining = false;
        result
    }

    /// Buffers a write of `value` to `signal`.
    ///
    /// Equivalent to [`Signal::set`] from inside a task. Writes buffered
    /// from outside a reaction are picked up by the next one.
    pub fn save_write(&self, signal: &Signal, value: impl Into<Value>) {
        self.handle.save_write(signal, value.into());
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Returns a queue into this scheduler, for firings that happen off its
    /// call stack.
    pub fn firer(&self) -> Firer {
        self.handle.firer()
    }

    /// Returns `true` if at least one task waits on `trigger`.
    pub fn is_waiting(&self, trigger: &Trigger) -> bool {
        self.registry.contains(trigger)
    }

    /// Tasks waiting on `trigger`, in the order they will be resumed.
    pub fn waiters(&self, trigger: &Trigger) -> Vec<TaskHandle> {
        self.registry
            .waiters(trigger)
            .iter()
            .filter_map(|key| self.tasks.get(*key))
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Every trigger currently waited on.
    pub fn waiting_triggers(&self) -> Vec<Trigger> {
        self.registry.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn pending_writes(&self) -> usize {
        self.handle.pending_writes()
    }

    pub fn flush_scheduled(&self) -> bool {
        self.handle.flush_scheduled()
    }

    /// The verdict of the run, once a task reported it.
    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.verdict.is_some()
    }

    /// Number of tasks the scheduler owns, the phase mover included.
    pub fn live_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn phase_mover(&self) -> &TaskHandle {
        &self.phase_mover
    }

    /// Ends the run from the boundary side with `verdict`.
    ///
    /// Used when the boundary gives up on a run no task concluded, such as
    /// a time limit. Tears everything down exactly like a task reporting the
    /// verdict would. No-op if the run already finished.
    pub fn finish(&mut self, verdict: Verdict) {
        if self.is_finished() {
            return;
        }

        self.teardown(verdict);
    }

    /// Runs `f` as one reaction.
    ///
    /// Once the outermost reaction unwinds, forked tasks are started and
    /// queued firings are delivered. A fatal error tears the run down.
    fn reaction<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, SchedulerError>,
    ) -> Result<R, SchedulerError> {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                if !self.is_finished() {
                    self.teardown(Verdict::fail(err.to_string()));
                }
                return Err(err);
            }
        };

        if self.depth == 0 {
            self.start_forked()?;
            self.react_pending()?;
        }

        Ok(value)
    }

    fn react_inner(&mut self, trigger: &Trigger) -> Result<(), SchedulerError> {
        trigger.consume();

        if let Some(verdict) = &self.verdict {
            warn!(
                target: "strobe::scheduler",
                "{trigger} fired after the run finished ({verdict}); ignoring"
            );
            return Ok(());
        }

        debug!(target: "strobe::scheduler", "Trigger fired: {trigger}");

        let Some(waiting) = self.registry.detach(trigger) else {
            debug!(target: "strobe::scheduler", "Not waiting on trigger that fired: {trigger}");
            return Ok(());
        };

        debug!(
            target: "strobe::scheduler",
            "{} pending task(s) for {trigger}",
            waiting.len()
        );

        let mut waiting = waiting.into_iter();
        while let Some(key) = waiting.next() {
            self.schedule(key, Some(trigger))?;

            if self.is_finished() {
                for key in waiting.by_ref() {
                    self.kill(key);
                }
            }
        }

        if self.config.trace_waiting {
            self.dump_waiting();
        }

        self.request_flush()
    }

    /// Runs one step of the task stored under `key`.
    ///
    /// A task that has not started yet is started; any other task is
    /// resumed with `fired`. The step's [`Resumption`] decides what happens
    /// next.
    fn schedule(&mut self, key: Key, fired: Option<&Trigger>) -> Result<(), SchedulerError> {
        let Some(entry) = self.tasks.get_mut(key) else {
            debug!(target: "strobe::task", "task retired before it could be resumed");
            return Ok(());
        };

        let Some(mut body) = entry.body.take() else {
            warn!(
                target: "strobe::task",
                "{} is already running; dropping its resumption",
                entry.handle.name()
            );
            return Ok(());
        };

        let handle = entry.handle.clone();
        let started = std::mem::replace(&mut entry.started, true);
        let siblings = std::mem::take(&mut entry.waiting_on);

        match self.config.fan_out {
            FanOutPolicy::CancelSiblings => self.cancel_siblings(key, fired, siblings),
            FanOutPolicy::Replicate => {
                // Siblings stay registered, so they must stay listed too or a
                // repeated wait would register the task on them twice.
                let kept = siblings
                    .into_iter()
                    .filter(|trigger| fired != Some(trigger))
                    .collect();

                if let Some(entry) = self.tasks.get_mut(key) {
                    entry.waiting_on = kept;
                }
            }
        }

        match fired {
            Some(trigger) => debug!(target: "strobe::task", "Scheduling {} on {trigger}", handle.name()),
            None => debug!(target: "strobe::task", "Starting {}", handle.name()),
        }

        handle.set_state(RUNNING);

        let resumption = {
            let cx = Cx::new(&self.handle, &handle);

            match (started, fired) {
                (false, _) => body.start(&cx),
                (true, Some(trigger)) => body.resume(trigger.clone(), &cx),
                (true, None) => Resumption::Failed(TaskError::msg("resumed without a trigger")),
            }
        };

        match resumption {
            Resumption::Suspended(awaitable) => {
                if let Some(entry) = self.tasks.get_mut(key) {
                    entry.body = Some(body);
                }
                handle.set_state(SUSPENDED);

                if self.is_finished() {
                    self.kill(key);
                } else {
                    self.suspend(key, &handle, awaitable)?;
                }
            }
            Resumption::Done(completion) => {
                self.tasks.remove(key);

                let (value, callbacks) = completion.into_parts();
                debug!(target: "strobe::task", "{} completed with {value}", handle.name());

                handle.complete(value.clone());
                for callback in callbacks {
                    callback(&value);
                }

                self.wake_joiners(&handle)?;
            }
            Resumption::RunFinished(verdict) => {
                self.tasks.remove(key);
                handle.complete(Value::None);

                debug!(target: "strobe::task", "{} finished the run", handle.name());
                self.teardown(verdict);
            }
            Resumption::Failed(err) => {
                self.tasks.remove(key);
                handle.set_state(FAILED);

                error!(target: "strobe::task", "{} failed: {err}", handle.name());
                return Err(SchedulerError::from_task(handle.name(), err));
            }
        }

        self.start_forked()?;
        Ok(())
    }

    /// Parks a task that just suspended.
    fn suspend(
        &mut self,
        key: Key,
        handle: &TaskHandle,
        awaitable: Awaitable,
    ) -> Result<(), SchedulerError> {
        match awaitable {
            Awaitable::Single(trigger) => self.register(key, trigger),
            Awaitable::FanOut(triggers) if triggers.is_empty() => {
                self.tasks.remove(key);
                handle.set_state(FAILED);

                return Err(SchedulerError::Unschedulable {
                    task: handle.name().to_owned(),
                    reason: "waited on an empty set of triggers".into(),
                });
            }
            Awaitable::FanOut(triggers) => {
                for trigger in triggers {
                    self.register(key, trigger);
                }
            }
            Awaitable::Join(task) => {
                let nested = TaskHandle::new(task.name());
                debug!(
                    target: "strobe::task",
                    "{} starts nested task {}",
                    handle.name(),
                    nested.name()
                );

                let nested_key = self.insert(nested.clone(), task);
                self.register(key, nested.join());
                self.schedule(nested_key, None)?;
            }
        }

        Ok(())
    }

    /// Appends the task to the waiting list of `trigger` and arms it.
    fn register(&mut self, key: Key, trigger: Trigger) {
        let Some(entry) = self.tasks.get_mut(key) else {
            return;
        };

        if entry.waiting_on.contains(&trigger) {
            return;
        }

        entry.waiting_on.push(trigger.clone());
        self.registry.add(trigger.clone(), key);

        if trigger.prime(self.boundary.as_ref())
            && trigger.joined_task().is_some_and(TaskHandle::is_finished)
        {
            self.handle.firer().fire(trigger);
        }
    }

    /// Removes the task from every trigger in `siblings` except `fired`.
    fn cancel_siblings(&mut self, key: Key, fired: Option<&Trigger>, siblings: Vec<Trigger>) {
        for trigger in siblings {
            if fired == Some(&trigger) {
                continue;
            }

            if self.registry.remove_waiter(&trigger, key) {
                trigger.unprime(self.boundary.as_ref());
            }
        }
    }

    /// Fires the join triggers of a task that just completed.
    fn wake_joiners(&mut self, task: &TaskHandle) -> Result<(), SchedulerError> {
        let joins: Vec<Trigger> = self
            .registry
            .iter()
            .map(|(trigger, _)| trigger)
            .filter(|trigger| trigger.joins(task.id()))
            .cloned()
            .collect();

        for join in joins {
            self.react(&join)?;
        }

        Ok(())
    }

    /// Wakes the phase mover if the last reaction left writes behind.
    fn request_flush(&mut self) -> Result<(), SchedulerError> {
        if self.is_finished() || self.handle.flush_scheduled() {
            return Ok(());
        }

        let pending = self.handle.pending_writes();
        if pending == 0 {
            return Ok(());
        }

        if !self.registry.contains(&self.flush_request) {
            warn!(
                target: "strobe::scheduler",
                "{pending} write(s) pending but the phase mover is not idle"
            );
            return Ok(());
        }

        debug!(
            target: "strobe::scheduler",
            "{pending} write(s) pending, moving to the write-enabled phase"
        );

        self.handle.set_flush_scheduled(true);

        let request = self.flush_request.clone();
        self.react(&request)
    }

    /// Starts tasks forked since the last step, in fork order.
    fn start_forked(&mut self) -> Result<(), SchedulerError> {
        while let Some((handle, mut task)) = self.handle.pop_fork() {
            if self.is_finished() {
                task.kill();
                handle.set_state(KILLED);
                continue;
            }

            let key = self.insert(handle, task);
            self.schedule(key, None)?;
        }

        Ok(())
    }

    /// Ends the run.
    ///
    /// Every armed trigger is disarmed and every task still owned by the
    /// scheduler is killed, except those on the current call stack, which
    /// are killed as soon as they suspend.
    fn teardown(&mut self, verdict: Verdict) {
        info!(target: "strobe::scheduler", "Test completed: {verdict}");
        self.verdict = Some(verdict);

        for (trigger, keys) in self.registry.drain() {
            trigger.unprime(self.boundary.as_ref());

            for key in keys {
                self.kill(key);
            }
        }

        for key in self.tasks.keys() {
            self.kill(key);
        }

        while let Some((handle, mut task)) = self.handle.pop_fork() {
            task.kill();
            handle.set_state(KILLED);
        }

        let discarded = self.handle.take_writes().len();
        if discarded > 0 {
            debug!(target: "strobe::scheduler", "discarding {discarded} buffered write(s)");
        }
        self.handle.set_flush_scheduled(false);

        while self.fired.try_recv().is_ok() {}
    }

    /// Forcibly terminates the task stored under `key`.
    ///
    /// No-op for a task that already finished or is on the call stack.
    fn kill(&mut self, key: Key) {
        let Some(entry) = self.tasks.get_mut(key) else {
            return;
        };

        let Some(mut body) = entry.body.take() else {
            return;
        };

        let handle = entry.handle.clone();
        let waiting_on = std::mem::take(&mut entry.waiting_on);

        self.tasks.remove(key);
        self.cancel_siblings(key, None, waiting_on);

        debug!(target: "strobe::task", "Killing {}", handle.name());

        body.kill();
        handle.set_state(KILLED);
    }

    fn insert(&mut self, handle: TaskHandle, task: Box<dyn Task>) -> Key {
        self.tasks.insert(Entry {
            handle,
            body: Some(task),
            started: false,
            waiting_on: Vec::new(),
        })
    }

    fn dump_waiting(&self) {
        if !log_enabled!(target: "strobe::scheduler", Level::Debug) {
            return;
        }

        debug!(target: "strobe::scheduler", "Completed scheduling loop, still waiting on:");

        for (trigger, keys) in self.registry.iter() {
            let names: Vec<&str> = keys
                .iter()
                .filter_map(|key| self.tasks.get(*key))
                .map(|entry| entry.handle.name())
                .collect();

            debug!(
                target: "strobe::scheduler",
                "\t{trigger} ({}): {}",
                if trigger.is_primed() { "primed" } else { "unprimed" },
                names.join(", ")
            );
        }
    }
}
