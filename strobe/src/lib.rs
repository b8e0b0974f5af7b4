//! # Strobe
//!
//! **Strobe** is a coroutine scheduler for hardware-simulation testbenches.
//!
//! Testbench code runs as cooperative tasks that suspend on simulator
//! conditions (elapsed time, signal edges, phases of a time step, the
//! completion of another task). The simulator fires those conditions back
//! into the scheduler, which resumes every waiting task in registration
//! order. Signal writes requested by tasks are buffered and only applied in
//! the write-enabled phase of a time step, so reads and writes within one
//! step never race.
//!
//! Strobe is built around a small set of pieces:
//!
//! - A **scheduler** that owns every task and reacts to fired triggers
//! - **Triggers** for timers, edges, phases, joins and software events
//! - A **coroutine adapter** that turns `async` blocks into tasks
//! - A **write buffer** flushed by a built-in phase mover task
//! - An in-process **simulation boundary** for tests and demos
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strobe::sim::Simulator;
//! use strobe::task::TaskResult;
//! use strobe::{Trigger, Value};
//!
//! #[strobe::test]
//! async fn counts_edges(sim: Simulator) -> TaskResult {
//!     let clk = sim.signal("clk", 0);
//!     strobe::task::fork(sim.clock(&clk, 10));
//!
//!     for _ in 0..4 {
//!         Trigger::rising_edge(&clk).await;
//!     }
//!
//!     Ok(Value::None)
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`]: the task contract, coroutine adapter and lifecycle handles
//! - [`trigger`]: awaitable conditions and the boundary contract
//! - [`sim`]: a deterministic in-process simulation boundary

mod error;
mod runtime;
mod signal;
mod utils;
mod value;

pub mod sim;
pub mod trigger;

pub use error::{Exit, SchedulerError, TaskError, Verdict};
pub use runtime::task;
pub use runtime::{FanOutPolicy, Firer, Handle, Scheduler, SchedulerBuilder};
pub use signal::{Signal, SignalHandle, SignalId};
pub use trigger::{Boundary, Event, Trigger, TriggerKind};
pub use value::Value;

pub use strobe_macros::test;
