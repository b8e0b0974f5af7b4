#![allow(dead_code)]

use strobe::task::{Cx, Resumption, Task};
use strobe::{Boundary, Signal, SignalHandle, Trigger, TriggerKind, Value};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Boundary that only records what the scheduler arms and disarms.
#[derive(Default)]
pub struct MockBoundary {
    pub armed: Mutex<Vec<Trigger>>,
    pub disarmed: Mutex<Vec<Trigger>>,
}

impl MockBoundary {
    pub fn arm_count(&self, trigger: &Trigger) -> usize {
        self.armed.lock().iter().filter(|t| *t == trigger).count()
    }

    pub fn was_disarmed(&self, trigger: &Trigger) -> bool {
        self.disarmed.lock().contains(trigger)
    }

    /// The most recently armed write-enabled phase trigger.
    pub fn read_write(&self) -> Option<Trigger> {
        self.armed
            .lock()
            .iter()
            .rev()
            .find(|t| matches!(t.kind(), TriggerKind::ReadWrite))
            .cloned()
    }
}

impl Boundary for MockBoundary {
    fn arm(&self, trigger: &Trigger) {
        self.armed.lock().push(trigger.clone());
    }

    fn disarm(&self, trigger: &Trigger) {
        self.disarmed.lock().push(trigger.clone());
    }
}

/// Shared, ordered record of what tasks did.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

type Step = Box<dyn FnMut(Option<Trigger>, &Cx<'_>) -> Resumption + Send>;

/// Hand-written state machine task driven by a closure.
///
/// The closure receives `None` on start and the fired trigger afterwards.
pub struct Scripted {
    name: String,
    step: Step,
    pub kills: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(
        name: &str,
        step: impl FnMut(Option<Trigger>, &Cx<'_>) -> Resumption + Send + 'static,
    ) -> Self {
        Self {
            name: name.to_owned(),
            step: Box::new(step),
            kills: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Task that waits on `trigger` forever, journaling every resumption.
    pub fn waiter(name: &str, trigger: Trigger, journal: Journal) -> Self {
        let label = name.to_owned();

        Self::new(name, move |fired, _| {
            if fired.is_some() {
                journal.push(label.clone());
            }
            Resumption::wait(trigger.clone())
        })
    }

    /// Task that waits on `trigger` once, then completes with `value`.
    pub fn once(name: &str, trigger: Trigger, value: i64) -> Self {
        Self::new(name, move |fired, _| match fired {
            None => Resumption::wait(trigger.clone()),
            Some(_) => Resumption::done(value),
        })
    }
}

impl Task for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, cx: &Cx<'_>) -> Resumption {
        (self.step)(None, cx)
    }

    fn resume(&mut self, fired: Trigger, cx: &Cx<'_>) -> Resumption {
        (self.step)(Some(fired), cx)
    }

    fn kill(&mut self) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }
}

/// Signal handle that records every applied value.
#[derive(Clone)]
pub struct Probe {
    name: String,
    pub value: Arc<Mutex<Value>>,
    pub applied: Arc<Mutex<Vec<Value>>>,
}

impl Probe {
    pub fn new(name: &str, initial: impl Into<Value>) -> Self {
        Self {
            name: name.to_owned(),
            value: Arc::new(Mutex::new(initial.into())),
            applied: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wraps a clone of this probe in a [`Signal`].
    pub fn signal(&self) -> Signal {
        Signal::new(self.clone())
    }
}

impl SignalHandle for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        self.value.lock().clone()
    }

    fn set_immediate_value(&self, value: Value) {
        self.applied.lock().push(value.clone());
        *self.value.lock() = value;
    }
}
