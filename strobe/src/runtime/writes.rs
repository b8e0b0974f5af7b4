use crate::signal::Signal;
use crate::task::{Awaitable, Cx, Resumption, Task};
use crate::trigger::Trigger;
use crate::value::Value;

use indexmap::IndexMap;
use log::{debug, trace};

/// Writes requested by tasks, waiting for the next write-enabled phase.
///
/// At most one value is kept per signal: a second write before the flush
/// replaces the first but keeps the signal's original position.
pub(crate) struct WriteBuffer {
    pending: IndexMap<Signal, Value>,
}

impl WriteBuffer {
    pub(crate) fn new() -> Self {
        Self {
            pending: IndexMap::new(),
        }
    }

    pub(crate) fn save(&mut self, signal: Signal, value: Value) {
        self.pending.insert(signal, value);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn take(&mut self) -> Vec<(Signal, Value)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

/// Applies every buffered write to its signal.
///
/// The buffer is emptied before any value is applied, so writes buffered by
/// whatever the application wakes up wait for the next flush.
pub(crate) fn flush(cx: &Cx<'_>) -> usize {
    let writes = cx.handle().take_writes();

    for (signal, value) in &writes {
        trace!(target: "strobe::scheduler", "applying {signal} <= {value}");
        signal.apply(value.clone());
    }

    writes.len()
}

/// Built-in task that moves buffered writes into the write-enabled phase.
///
/// It idles on an internal flush request. The scheduler fires that request
/// when a reaction leaves writes behind; the mover then waits for the
/// boundary's write-enabled phase, flushes, and goes back to idling.
pub(crate) struct PhaseMover {
    flush_request: Trigger,
    read_write: Trigger,
}

impl PhaseMover {
    pub(crate) fn new(flush_request: Trigger) -> Self {
        Self {
            flush_request,
            read_write: Trigger::read_write(),
        }
    }

    fn idle(&self) -> Resumption {
        Resumption::Suspended(Awaitable::Single(self.flush_request.clone()))
    }
}

impl Task for PhaseMover {
    fn name(&self) -> &str {
        "phase-mover"
    }

    fn start(&mut self, _cx: &Cx<'_>) -> Resumption {
        self.idle()
    }

    fn resume(&mut self, fired: Trigger, cx: &Cx<'_>) -> Resumption {
        if fired == self.flush_request {
            return Resumption::Suspended(Awaitable::Single(self.read_write.clone()));
        }

        cx.handle().set_flush_scheduled(false);
        let applied = flush(cx);
        debug!(target: "strobe::scheduler", "flushed {applied} write(s)");

        self.idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalHandle;

    use std::sync::Arc;

    use parking_lot::Mutex;

    struct Probe {
        name: &'static str,
        value: Arc<Mutex<Value>>,
    }

    impl SignalHandle for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn value(&self) -> Value {
            self.value.lock().clone()
        }

        fn set_immediate_value(&self, value: Value) {
            *self.value.lock() = value;
        }
    }

    fn probe(name: &'static str) -> Signal {
        Signal::new(Probe {
            name,
            value: Arc::new(Mutex::new(Value::None)),
        })
    }

    #[test]
    fn last_write_wins_and_keeps_first_position() {
        let a = probe("a");
        let b = probe("b");
        let mut buffer = WriteBuffer::new();

        buffer.save(a.clone(), Value::Int(1));
        buffer.save(b.clone(), Value::Int(2));
        buffer.save(a.clone(), Value::Int(3));

        assert_eq!(buffer.len(), 2);
        let writes = buffer.take();
        assert_eq!(writes, vec![(a, Value::Int(3)), (b, Value::Int(2))]);
        assert_eq!(buffer.len(), 0);
    }
}
