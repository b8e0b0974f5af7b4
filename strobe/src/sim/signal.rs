use super::SimCore;
use crate::signal::SignalHandle;
use crate::value::Value;

use std::sync::Weak;

use log::warn;
use parking_lot::Mutex;

/// A signal living inside the in-process simulator.
///
/// Writes are only accepted while the simulator is in its write-enabled
/// phase. Anything else is rejected, logged and counted.
pub(crate) struct SimSignal {
    pub(crate) name: String,
    pub(crate) value: Mutex<Value>,
    pub(crate) core: Weak<SimCore>,
}

impl SignalHandle for SimSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        self.value.lock().clone()
    }

    fn set_immediate_value(&self, value: Value) {
        let accepted = self.core.upgrade().is_none_or(|core| core.accept_write());

        if !accepted {
            warn!(
                target: "strobe::sim",
                "rejected write {} <= {value} outside the write-enabled phase",
                self.name
            );
            return;
        }

        *self.value.lock() = value;
    }
}
