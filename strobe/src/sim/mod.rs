//! A deterministic in-process simulation boundary.
//!
//! [`Simulator`] implements the phase model a [`Scheduler`] consumes
//! without simulating any hardware: integer time, a timer queue, signal
//! edges, and the write-enabled and read-only phases of each time step.
//! It backs the crate's own tests and `#[strobe::test]`.
//!
//! Each time step runs in this order:
//! 1. due timers fire, in deadline then arming order,
//! 2. delta cycles: edge triggers of signals that changed, then
//!    write-enabled (`ReadWrite`) triggers, until neither is pending,
//! 3. read-only (`ReadOnly`) triggers,
//! 4. time advances to the next timer deadline and `NextTimeStep`
//!    triggers fire.
//!
//! The run stops once a task reports the verdict, nothing is armed any
//! more, or the configured time limit is exceeded.

mod signal;
mod timer;

use crate::error::{SchedulerError, Verdict};
use crate::runtime::SchedulerBuilder;
use crate::signal::Signal;
use crate::task::{Coroutine, Cx, Resumption, Task, TaskResult};
use crate::trigger::{Boundary, Trigger, TriggerKind};
use crate::value::Value;
use crate::Scheduler;

use signal::SimSignal;
use timer::TimerEntry;

use std::collections::BinaryHeap;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;

/// Delta cycles allowed within one time step before the simulator gives up
/// on it.
const DELTA_LIMIT: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Timers,
    Delta,
    ReadWrite,
    ReadOnly,
    NextStep,
}

struct SimState {
    time: u64,

    /// Arming counter, orders timers with equal deadlines.
    seq: u64,

    phase: Phase,
    timers: BinaryHeap<TimerEntry>,
    read_write: Vec<Trigger>,
    read_only: Vec<Trigger>,
    next_step: Vec<Trigger>,

    /// Armed edge triggers with the value their signal had when last seen.
    watchers: Vec<(Trigger, Value)>,

    illegal_writes: usize,
}

impl SimState {
    fn has_pending_step(&self) -> bool {
        !self.read_write.is_empty() || !self.read_only.is_empty() || !self.next_step.is_empty()
    }
}

pub(crate) struct SimCore {
    state: Mutex<SimState>,
    max_time: Option<u64>,
}

impl SimCore {
    /// Returns whether a direct write is legal right now, counting it if
    /// it is not.
    pub(crate) fn accept_write(&self) -> bool {
        let mut state = self.state.lock();

        if state.phase == Phase::ReadWrite {
            return true;
        }

        state.illegal_writes += 1;
        false
    }
}

/// Builder for configuring and creating a simulator.
///
/// # Examples
///
/// ```rust,ignore
/// let sim = SimBuilder::new()
///     .max_time(1_000_000)
///     .build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct SimBuilder {
    max_time: Option<u64>,
}

impl SimBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the run once time would advance past `limit`.
    ///
    /// A run stopped this way without a verdict fails.
    pub fn max_time(mut self, limit: u64) -> Self {
        self.max_time = Some(limit);
        self
    }

    pub fn build(self) -> Simulator {
        Simulator {
            core: Arc::new(SimCore {
                state: Mutex::new(SimState {
                    time: 0,
                    seq: 0,
                    phase: Phase::Idle,
                    timers: BinaryHeap::new(),
                    read_write: Vec::new(),
                    read_only: Vec::new(),
                    next_step: Vec::new(),
                    watchers: Vec::new(),
                    illegal_writes: 0,
                }),
                max_time: self.max_time,
            }),
        }
    }
}

/// Outcome of a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub verdict: Verdict,

    /// Simulation time when the run stopped.
    pub sim_time: u64,

    /// Direct writes rejected because they happened outside the
    /// write-enabled phase.
    pub illegal_writes: usize,
}

impl RunReport {
    /// Panics unless the run passed without any illegal write.
    pub fn assert_passed(&self) {
        if let Verdict::Fail(reason) = &self.verdict {
            panic!("test failed at time {}: {reason}", self.sim_time);
        }

        assert_eq!(
            self.illegal_writes, 0,
            "{} write(s) were applied outside the write-enabled phase",
            self.illegal_writes
        );
    }
}

enum Advance {
    /// Time moved forward.
    Stepped,
    /// More work is due at the current time.
    Stayed,
    /// Nothing is armed.
    Quiet,
    /// The time limit would be exceeded.
    Limit(u64),
}

/// A deterministic in-process simulator.
///
/// Cloning a `Simulator` yields another handle to the same simulation.
#[derive(Clone)]
pub struct Simulator {
    core: Arc<SimCore>,
}

impl Simulator {
    pub fn new() -> Self {
        SimBuilder::new().build()
    }

    pub fn builder() -> SimBuilder {
        SimBuilder::new()
    }

    /// Creates a signal with an initial value.
    pub fn signal(&self, name: impl Into<String>, initial: impl Into<Value>) -> Signal {
        Signal::new(SimSignal {
            name: name.into(),
            value: Mutex::new(initial.into()),
            core: Arc::downgrade(&self.core),
        })
    }

    /// Current simulation time.
    pub fn time(&self) -> u64 {
        self.core.state.lock().time
    }

    pub fn illegal_writes(&self) -> usize {
        self.core.state.lock().illegal_writes
    }

    /// Creates a scheduler that arms its triggers in this simulator.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler_with(SchedulerBuilder::new())
    }

    pub fn scheduler_with(&self, builder: SchedulerBuilder) -> Scheduler {
        builder.build(Arc::new(self.clone()))
    }

    /// Returns a task that toggles `signal` every `half_period` time units,
    /// starting high.
    ///
    /// # Panics
    ///
    /// Panics if `half_period == 0`.
    pub fn clock(&self, signal: &Signal, half_period: u64) -> Clock {
        assert!(half_period > 0, "clock half period must be > 0");

        Clock {
            name: format!("clock({signal})"),
            signal: signal.clone(),
            half_period,
            level: false,
        }
    }

    /// Drives `scheduler` until the run concludes.
    ///
    /// # Errors
    ///
    /// Returns the fatal error of a task that failed during the run.
    pub fn run(&self, scheduler: &mut Scheduler) -> Result<RunReport, SchedulerError> {
        info!(target: "strobe::sim", "simulation starting at {}", self.time());

        scheduler.react_pending()?;

        let mut limit_hit = None;

        while !scheduler.is_finished() {
            self.run_timers(scheduler)?;
            self.run_deltas(scheduler)?;
            self.run_read_only(scheduler)?;

            if scheduler.is_finished() {
                break;
            }

            match self.advance() {
                Advance::Stepped => self.run_next_step(scheduler)?,
                Advance::Stayed => {}
                Advance::Quiet => {
                    debug!(target: "strobe::sim", "nothing armed at {}", self.time());
                    break;
                }
                Advance::Limit(limit) => {
                    limit_hit = Some(limit);
                    break;
                }
            }
        }

        self.set_phase(Phase::Idle);

        if !scheduler.is_finished() {
            scheduler.finish(match limit_hit {
                Some(limit) => Verdict::fail(format!("no verdict by time limit {limit}")),
                None => Verdict::fail("simulation ran out of events before the test finished"),
            });
        }

        let verdict = scheduler
            .verdict()
            .cloned()
            .unwrap_or_else(|| Verdict::fail("run ended without a verdict"));

        let report = RunReport {
            verdict,
            sim_time: self.time(),
            illegal_writes: self.illegal_writes(),
        };

        info!(
            target: "strobe::sim",
            "simulation stopped at {}: {}",
            report.sim_time,
            report.verdict
        );

        Ok(report)
    }

    /// Runs `body` as the test task of a fresh scheduler and drives it to
    /// completion.
    ///
    /// A fatal task error is turned into a failing report.
    pub fn run_test<F, Fut>(self, name: &str, body: F) -> RunReport
    where
        F: FnOnce(Simulator) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let mut scheduler = self.scheduler();
        let future = body(self.clone());

        let result = scheduler
            .add(Coroutine::test(name, future))
            .and_then(|_| self.run(&mut scheduler));

        result.unwrap_or_else(|err| {
            error!(target: "strobe::sim", "{name} aborted: {err}");

            RunReport {
                verdict: Verdict::fail(err.to_string()),
                sim_time: self.time(),
                illegal_writes: self.illegal_writes(),
            }
        })
    }

    fn set_phase(&self, phase: Phase) {
        self.core.state.lock().phase = phase;
    }

    /// Hands every still-primed trigger to the scheduler, one at a time.
    ///
    /// The simulator's lock is never held across a reaction.
    fn fire_all(
        &self,
        scheduler: &mut Scheduler,
        triggers: Vec<Trigger>,
    ) -> Result<(), SchedulerError> {
        for trigger in triggers {
            if scheduler.is_finished() {
                break;
            }

            if !trigger.is_primed() {
                trace!(target: "strobe::sim", "skipping cancelled {trigger}");
                continue;
            }

            scheduler.react(&trigger)?;
        }

        Ok(())
    }

    fn run_timers(&self, scheduler: &mut Scheduler) -> Result<(), SchedulerError> {
        let due = {
            let mut state = self.core.state.lock();
            state.phase = Phase::Timers;

            let now = state.time;
            let mut due = Vec::new();

            while state.timers.peek().is_some_and(|entry| entry.deadline <= now) {
                if let Some(entry) = state.timers.pop() {
                    due.push(entry.trigger);
                }
            }

            due
        };

        self.fire_all(scheduler, due)
    }

    fn run_deltas(&self, scheduler: &mut Scheduler) -> Result<(), SchedulerError> {
        for _ in 0..DELTA_LIMIT {
            let edges = self.changed_edges();
            let writes = std::mem::take(&mut self.core.state.lock().read_write);

            if edges.is_empty() && writes.is_empty() {
                return Ok(());
            }

            self.set_phase(Phase::Delta);
            self.fire_all(scheduler, edges)?;

            self.set_phase(Phase::ReadWrite);
            self.fire_all(scheduler, writes)?;
        }

        warn!(
            target: "strobe::sim",
            "time {} did not settle within {DELTA_LIMIT} delta cycles",
            self.time()
        );

        Ok(())
    }

    fn run_read_only(&self, scheduler: &mut Scheduler) -> Result<(), SchedulerError> {
        let read_only = {
            let mut state = self.core.state.lock();
            state.phase = Phase::ReadOnly;
            std::mem::take(&mut state.read_only)
        };

        self.fire_all(scheduler, read_only)
    }

    fn run_next_step(&self, scheduler: &mut Scheduler) -> Result<(), SchedulerError> {
        let next_step = {
            let mut state = self.core.state.lock();
            state.phase = Phase::NextStep;
            std::mem::take(&mut state.next_step)
        };

        self.fire_all(scheduler, next_step)
    }

    /// Collects edge triggers whose signal changed in the matching
    /// direction since they were last looked at.
    fn changed_edges(&self) -> Vec<Trigger> {
        let mut state = self.core.state.lock();
        let mut fired = Vec::new();

        state.watchers.retain_mut(|(trigger, last)| {
            let (signal, hit): (&Signal, fn(&Value, &Value) -> bool) = match trigger.kind() {
                TriggerKind::RisingEdge(signal) => (signal, |old, new| !old.is_high() && new.is_high()),
                TriggerKind::FallingEdge(signal) => (signal, |old, new| old.is_high() && !new.is_high()),
                TriggerKind::Edge(signal) => (signal, |_, _| true),
                _ => return false,
            };

            let now = signal.value();
            if now == *last {
                return true;
            }

            let matched = hit(last, &now);
            *last = now;

            if matched {
                fired.push(trigger.clone());
            }

            !matched
        });

        fired
    }

    fn advance(&self) -> Advance {
        let mut state = self.core.state.lock();

        while state.timers.peek().is_some_and(|entry| !entry.trigger.is_primed()) {
            state.timers.pop();
        }

        let next = match state.timers.peek() {
            Some(entry) if entry.deadline <= state.time => return Advance::Stayed,
            Some(entry) => entry.deadline,
            None if state.has_pending_step() => state.time.saturating_add(1),
            None => return Advance::Quiet,
        };

        if let Some(limit) = self.core.max_time.filter(|limit| next > *limit) {
            return Advance::Limit(limit);
        }

        trace!(target: "strobe::sim", "advancing from {} to {next}", state.time);

        state.time = next;
        state.phase = Phase::Idle;
        Advance::Stepped
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Boundary for Simulator {
    fn arm(&self, trigger: &Trigger) {
        let mut state = self.core.state.lock();

        match trigger.kind() {
            TriggerKind::Timer { delay } => {
                let deadline = state.time.saturating_add(*delay);
                let seq = state.seq;
                state.seq += 1;

                state.timers.push(TimerEntry {
                    deadline,
                    seq,
                    trigger: trigger.clone(),
                });
            }
            TriggerKind::RisingEdge(signal)
            | TriggerKind::FallingEdge(signal)
            | TriggerKind::Edge(signal) => {
                let current = signal.value();
                state.watchers.push((trigger.clone(), current));
            }
            TriggerKind::ReadWrite => state.read_write.push(trigger.clone()),
            TriggerKind::ReadOnly => state.read_only.push(trigger.clone()),
            TriggerKind::NextTimeStep => state.next_step.push(trigger.clone()),
            kind => {
                warn!(target: "strobe::sim", "cannot arm {kind}");
                return;
            }
        }

        trace!(target: "strobe::sim", "armed {trigger} at {}", state.time);
    }

    fn disarm(&self, trigger: &Trigger) {
        let mut state = self.core.state.lock();

        state.read_write.retain(|t| t != trigger);
        state.read_only.retain(|t| t != trigger);
        state.next_step.retain(|t| t != trigger);
        state.watchers.retain(|(t, _)| t != trigger);

        trace!(target: "strobe::sim", "disarmed {trigger} at {}", state.time);
    }
}

/// A free-running clock, as returned by [`Simulator::clock`].
pub struct Clock {
    name: String,
    signal: Signal,
    half_period: u64,
    level: bool,
}

impl Clock {
    fn toggle(&mut self, cx: &Cx<'_>) -> Resumption {
        self.level = !self.level;
        cx.save_write(&self.signal, self.level);

        Resumption::wait(Trigger::timer(self.half_period))
    }
}

impl Task for Clock {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, cx: &Cx<'_>) -> Resumption {
        self.toggle(cx)
    }

    fn resume(&mut self, _fired: Trigger, cx: &Cx<'_>) -> Resumption {
        self.toggle(cx)
    }
}
