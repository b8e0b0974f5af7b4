//! Awaitable conditions.
//!
//! A [`Trigger`] is an identity-bearing condition a task can suspend on:
//! elapsed time, a signal edge, a phase boundary of the current time step,
//! the completion of another task, or a software [`Event`].
//!
//! Boundary-backed triggers are armed and disarmed through the
//! [`Boundary`] trait, which the simulator side implements. Once an armed
//! condition occurs, the boundary hands the trigger back to
//! [`Scheduler::react`](crate::Scheduler::react) exactly once.
//!
//! Join, event and internal triggers never reach the boundary: the scheduler
//! and [`Event`] fire them from inside the crate.

mod event;

pub use event::Event;

use crate::signal::Signal;
use crate::task::{TaskHandle, TaskId};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The simulator side of the trigger contract.
///
/// `arm` must cause the trigger to be handed to the scheduler once, the next
/// time its condition occurs. The scheduler arms each trigger at most once
/// until it fires or is disarmed. `disarm` cancels a pending arm; a boundary
/// must also skip any trigger whose [`is_primed`](Trigger::is_primed) turned
/// `false` before it could fire.
pub trait Boundary: Send + Sync {
    fn arm(&self, trigger: &Trigger);

    fn disarm(&self, trigger: &Trigger);
}

/// Unique identifier of a [`Trigger`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TriggerId(u64);

static TRIGGER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl TriggerId {
    fn fresh() -> Self {
        TriggerId(TRIGGER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a trigger waits for.
#[derive(Clone)]
pub enum TriggerKind {
    /// Elapsed simulation time, in simulator time units.
    Timer { delay: u64 },
    RisingEdge(Signal),
    FallingEdge(Signal),
    /// Any value change.
    Edge(Signal),
    /// The read-only phase of the current time step.
    ReadOnly,
    /// The write-enabled phase of the current time step.
    ReadWrite,
    /// The start of the next time step.
    NextTimeStep,
    /// Completion of a task.
    Join(TaskHandle),
    Event(Event),
    /// Scheduler-owned condition.
    Internal(&'static str),
}

impl TriggerKind {
    /// Returns `true` if arming this kind goes through the [`Boundary`].
    pub fn is_boundary(&self) -> bool {
        !matches!(
            self,
            TriggerKind::Join(_) | TriggerKind::Event(_) | TriggerKind::Internal(_)
        )
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Timer { delay } => write!(f, "Timer({delay})"),
            TriggerKind::RisingEdge(signal) => write!(f, "RisingEdge({signal})"),
            TriggerKind::FallingEdge(signal) => write!(f, "FallingEdge({signal})"),
            TriggerKind::Edge(signal) => write!(f, "Edge({signal})"),
            TriggerKind::ReadOnly => write!(f, "ReadOnly"),
            TriggerKind::ReadWrite => write!(f, "ReadWrite"),
            TriggerKind::NextTimeStep => write!(f, "NextTimeStep"),
            TriggerKind::Join(task) => write!(f, "Join({})", task.name()),
            TriggerKind::Event(event) => write!(f, "Event({})", event.name()),
            TriggerKind::Internal(name) => write!(f, "Internal({name})"),
        }
    }
}

struct Inner {
    id: TriggerId,
    kind: TriggerKind,
    /// Set while armed and waiting to fire.
    primed: AtomicBool,
}

/// An awaitable condition.
///
/// Cloning a trigger yields the same condition: clones compare equal and
/// share their primed state. Every constructor call creates a new,
/// distinct condition.
#[derive(Clone)]
pub struct Trigger {
    inner: Arc<Inner>,
}

impl Trigger {
    pub(crate) fn new(kind: TriggerKind) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: TriggerId::fresh(),
                kind,
                primed: AtomicBool::new(false),
            }),
        }
    }

    /// Fires after `delay` simulator time units.
    pub fn timer(delay: u64) -> Self {
        Self::new(TriggerKind::Timer { delay })
    }

    pub fn rising_edge(signal: &Signal) -> Self {
        Self::new(TriggerKind::RisingEdge(signal.clone()))
    }

    pub fn falling_edge(signal: &Signal) -> Self {
        Self::new(TriggerKind::FallingEdge(signal.clone()))
    }

    pub fn edge(signal: &Signal) -> Self {
        Self::new(TriggerKind::Edge(signal.clone()))
    }

    pub fn read_only() -> Self {
        Self::new(TriggerKind::ReadOnly)
    }

    pub fn read_write() -> Self {
        Self::new(TriggerKind::ReadWrite)
    }

    pub fn next_time_step() -> Self {
        Self::new(TriggerKind::NextTimeStep)
    }

    pub(crate) fn internal(name: &'static str) -> Self {
        Self::new(TriggerKind::Internal(name))
    }

    pub fn id(&self) -> TriggerId {
        self.inner.id
    }

    pub fn kind(&self) -> &TriggerKind {
        &self.inner.kind
    }

    /// Returns `true` while the trigger is armed and has not fired.
    pub fn is_primed(&self) -> bool {
        self.inner.primed.load(Ordering::Acquire)
    }

    /// The task this trigger waits for, if it is a join trigger.
    pub fn joined_task(&self) -> Option<&TaskHandle> {
        match &self.inner.kind {
            TriggerKind::Join(task) => Some(task),
            _ => None,
        }
    }

    pub(crate) fn joins(&self, task: TaskId) -> bool {
        self.joined_task().is_some_and(|t| t.id() == task)
    }

    /// Arms the condition.
    ///
    /// Returns `false` without touching the boundary if the trigger is
    /// already primed.
    pub(crate) fn prime(&self, boundary: &dyn Boundary) -> bool {
        if self.inner.primed.swap(true, Ordering::AcqRel) {
            return false;
        }

        match &self.inner.kind {
            TriggerKind::Event(event) => event.arm(self),
            kind if kind.is_boundary() => boundary.arm(self),
            _ => {}
        }

        true
    }

    /// Disarms the condition. No-op if it is not primed.
    pub(crate) fn unprime(&self, boundary: &dyn Boundary) {
        if !self.inner.primed.swap(false, Ordering::AcqRel) {
            return;
        }

        match &self.inner.kind {
            TriggerKind::Event(event) => event.disarm(self),
            kind if kind.is_boundary() => boundary.disarm(self),
            _ => {}
        }
    }

    /// Marks the trigger as fired. Returns whether it was primed.
    pub(crate) fn consume(&self) -> bool {
        self.inner.primed.swap(false, Ordering::AcqRel)
    }
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Trigger {}

impl Hash for Trigger {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.kind.fmt(f)
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.inner.id.0)
            .field("kind", &format_args!("{}", self.inner.kind))
            .field("primed", &self.is_primed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        armed: Mutex<Vec<TriggerId>>,
        disarmed: Mutex<Vec<TriggerId>>,
    }

    impl Boundary for Recorder {
        fn arm(&self, trigger: &Trigger) {
            self.armed.lock().push(trigger.id());
        }

        fn disarm(&self, trigger: &Trigger) {
            self.disarmed.lock().push(trigger.id());
        }
    }

    #[test]
    fn priming_is_deduplicated() {
        let boundary = Recorder::default();
        let trigger = Trigger::timer(10);

        assert!(trigger.prime(&boundary));
        assert!(!trigger.prime(&boundary));
        assert!(trigger.is_primed());
        assert_eq!(boundary.armed.lock().len(), 1);
    }

    #[test]
    fn unprime_only_disarms_primed_triggers() {
        let boundary = Recorder::default();
        let trigger = Trigger::read_only();

        trigger.unprime(&boundary);
        assert!(boundary.disarmed.lock().is_empty());

        trigger.prime(&boundary);
        trigger.unprime(&boundary);
        trigger.unprime(&boundary);
        assert_eq!(boundary.disarmed.lock().as_slice(), &[trigger.id()]);
        assert!(!trigger.is_primed());
    }

    #[test]
    fn internal_triggers_never_reach_the_boundary() {
        let boundary = Recorder::default();
        let trigger = Trigger::internal("flush");

        assert!(trigger.prime(&boundary));
        trigger.unprime(&boundary);

        assert!(boundary.armed.lock().is_empty());
        assert!(boundary.disarmed.lock().is_empty());
    }

    #[test]
    fn identity_is_per_construction() {
        let a = Trigger::timer(5000);
        let b = Trigger::timer(5000);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_string(), "Timer(5000)");
    }

    #[test]
    fn consume_clears_primed() {
        let boundary = Recorder::default();
        let trigger = Trigger::next_time_step();

        assert!(!trigger.consume());
        trigger.prime(&boundary);
        assert!(trigger.consume());
        assert!(!trigger.is_primed());
    }
}
