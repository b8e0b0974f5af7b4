//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the scheduler.
//! In particular, it exposes a generational [`Slab`] used to store tasks and
//! hand out keys that stay safe to hold after the task is gone.

mod slab;

pub(crate) use slab::{Key, Slab};
