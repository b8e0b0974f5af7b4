//! Core scheduler components.
//!
//! This module contains the cooperative runtime that drives testbench tasks
//! against the simulator's event model.
//!
//! It is responsible for:
//! - tracking which suspended task waits on which trigger,
//! - resuming tasks when the boundary fires a trigger,
//! - deferring signal writes to the write-enabled phase of a time step,
//! - tearing everything down once a task reports the verdict of the run.
//!
//! Most users interact with [`Scheduler`] through the [`sim`](crate::sim)
//! boundary or `#[strobe::test]` rather than driving it by hand.

mod core;
mod handle;
mod registry;
mod writes;

pub(crate) mod builder;
pub(crate) mod context;

pub mod task;

pub use self::core::Scheduler;
pub use builder::{FanOutPolicy, SchedulerBuilder};
pub use handle::{Firer, Handle};
