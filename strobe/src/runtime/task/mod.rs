//! Task primitives.
//!
//! This module defines what the scheduler drives and how testbench code
//! observes it.
//!
//! It includes:
//! - the [`Task`] contract and the [`Resumption`] each step ends in,
//! - task handles and lifecycle states,
//! - the [`Coroutine`] adapter that turns `async` blocks into tasks,
//! - the free functions coroutine bodies use to fork, nest and finish.
//!
//! Most users will write coroutines and only meet the lower-level pieces
//! when implementing a hand-written state machine.

mod coroutine;
mod handle;

pub(crate) mod state;

pub mod core;

pub use self::core::{Awaitable, Completion, Cx, Resumption, Task};
pub use coroutine::{
    Coroutine, Joined, TaskResult, Wait, current, fail, first_of, fork, nested, pass,
};
pub use handle::{TaskHandle, TaskId};
pub use state::TaskState;
