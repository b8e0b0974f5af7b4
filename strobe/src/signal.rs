//! Handles to simulated objects.
//!
//! The simulator exposes its signals through the [`SignalHandle`] contract.
//! Testbench code holds [`Signal`]s, which add a stable identity used to key
//! the scheduler's write buffer and edge triggers.

use crate::runtime::context;
use crate::value::Value;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A simulated object as exposed by the simulation boundary.
pub trait SignalHandle: Send + Sync {
    /// Hierarchical name, used for diagnostics.
    fn name(&self) -> &str;

    /// Current value of the object.
    fn value(&self) -> Value;

    /// Applies `value` to the object.
    ///
    /// Only legal during the write-enabled phase of a time step. The
    /// scheduler guarantees it only calls this from its phase flush.
    fn set_immediate_value(&self, value: Value);
}

/// Unique identifier of a [`Signal`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SignalId(u64);

static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SignalId {
    fn fresh() -> Self {
        SignalId(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A cloneable, identity-bearing handle to a simulated object.
///
/// Clones share the same identity. Two `Signal`s wrapping the same object
/// but created separately are distinct keys.
#[derive(Clone)]
pub struct Signal {
    id: SignalId,
    handle: Arc<dyn SignalHandle>,
}

impl Signal {
    /// Wraps a boundary object.
    pub fn new(handle: impl SignalHandle + 'static) -> Self {
        Self {
            id: SignalId::fresh(),
            handle: Arc::new(handle),
        }
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Reads the current value. Reads are always legal.
    pub fn value(&self) -> Value {
        self.handle.value()
    }

    /// Requests a write from inside a running coroutine.
    ///
    /// The write is buffered by the scheduler and applied at the next
    /// write-enabled phase. A later `set` of the same signal before that
    /// phase replaces this one.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a task resumed by a scheduler.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        context::with_handle(|handle| handle.save_write(self, value));
    }

    /// Applies a value immediately, bypassing the write buffer.
    pub(crate) fn apply(&self, value: Value) {
        self.handle.set_immediate_value(value);
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id.0)
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
