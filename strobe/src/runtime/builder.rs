use super::Scheduler;
use crate::trigger::Boundary;

use std::sync::Arc;

/// What happens to the other triggers of a fan-out wait once one fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FanOutPolicy {
    /// The task is removed from every sibling's waiting list, and siblings
    /// left without waiters are disarmed. The task resumes once, on the
    /// first trigger to fire.
    #[default]
    CancelSiblings,

    /// The task stays registered on its siblings and is resumed again by
    /// each one that fires later.
    Replicate,
}

/// Builder for configuring and creating a scheduler.
///
/// # Examples
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new()
///     .fan_out(FanOutPolicy::Replicate)
///     .trace_waiting(true)
///     .build(boundary);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SchedulerBuilder {
    pub(crate) fan_out: FanOutPolicy,

    /// Dump the waiting registry at debug level after every reaction.
    pub(crate) trace_waiting: bool,
}

impl SchedulerBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how fan-out waits are resolved.
    pub fn fan_out(mut self, policy: FanOutPolicy) -> Self {
        self.fan_out = policy;
        self
    }

    /// Logs every trigger still waited on after each reaction.
    ///
    /// Only has an effect when debug logging is enabled for
    /// `strobe::scheduler`.
    pub fn trace_waiting(mut self, enabled: bool) -> Self {
        self.trace_waiting = enabled;
        self
    }

    /// Builds a scheduler that arms its triggers through `boundary`.
    pub fn build(self, boundary: Arc<dyn Boundary>) -> Scheduler {
        Scheduler::with_config(boundary, self)
    }
}
