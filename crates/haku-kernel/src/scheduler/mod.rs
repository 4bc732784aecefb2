//! Scheduler module for haku: in-flight task tracking.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TaskRegistry                           │
//! │  tasks: VecDeque<(TaskInfo, CancellationToken)>             │
//! │  - register(identity, command) → TaskGuard                  │
//! │  - list() → Vec<TaskInfo>          (registration order)     │
//! │  - cancel(index | last) → TaskInfo                          │
//! │  - cancel_command(name) → Vec<TaskInfo>                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The task list sits behind one lock that is only held for the mutation
//! itself. Cancellation is cooperative: the cancel handle fires, and the run
//! unwinds at its next suspension point.

mod task;

pub use task::{TaskError, TaskGuard, TaskRegistry};
