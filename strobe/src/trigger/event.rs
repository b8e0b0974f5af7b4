use super::Trigger;
use crate::runtime::Firer;

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

/// A software condition set by testbench code.
///
/// Any number of tasks may wait on an event; each [`wait`](Self::wait)
/// creates a fresh trigger. [`set`](Self::set) fires every trigger that is
/// armed at that moment. Setting an event nobody waits on does nothing.
///
/// Events are created through [`Cx::event`](crate::task::Cx::event) or
/// [`Handle::event`](crate::runtime::Handle::event).
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

struct EventInner {
    name: String,

    /// Triggers armed on this event, in arming order.
    armed: Mutex<Vec<Trigger>>,

    /// Queue into the owning scheduler.
    firer: Firer,
}

impl Event {
    pub(crate) fn new(name: impl Into<String>, firer: Firer) -> Self {
        Self {
            inner: Arc::new(EventInner {
                name: name.into(),
                armed: Mutex::new(Vec::new()),
                firer,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns a trigger that fires on the next [`set`](Self::set).
    pub fn wait(&self) -> Trigger {
        Trigger::new(super::TriggerKind::Event(self.clone()))
    }

    /// Fires every armed trigger of this event.
    ///
    /// The firings are queued into the scheduler and delivered once the
    /// current reaction unwinds, in arming order.
    pub fn set(&self) {
        let armed = std::mem::take(&mut *self.inner.armed.lock());

        debug!(
            target: "strobe::trigger",
            "event {} set with {} armed trigger(s)",
            self.inner.name,
            armed.len()
        );

        for trigger in armed {
            self.inner.firer.fire(trigger);
        }
    }

    /// Number of triggers currently armed on this event.
    pub fn armed(&self) -> usize {
        self.inner.armed.lock().len()
    }

    pub(super) fn arm(&self, trigger: &Trigger) {
        self.inner.armed.lock().push(trigger.clone());
    }

    pub(super) fn disarm(&self, trigger: &Trigger) {
        self.inner.armed.lock().retain(|t| t != trigger);
    }
}
