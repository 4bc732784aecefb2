//! Interpreter module for haku script.
//!
//! # Architecture
//!
//! The interpreter is built in layers:
//!
//! - **Value**: runtime values with `repr`, display form, and JSON projection
//! - **Scope**: session bindings plus one-shot injected names
//! - **Evaluator**: async tree walker that suspends at `sleep` and `yield`
//! - **Builtins**: the native function table
//!
//! The evaluator never owns a session scope directly. The executor seeds it
//! with a copy of the scope's bindings and writes them back when the run
//! ends, which keeps the scope lock out of every await.

mod builtins;
mod control_flow;
mod error;
mod eval;
mod scope;
mod value;

pub use builtins::{lookup as lookup_builtin, BUILTINS};
pub use control_flow::ControlFlow;
pub use error::{ErrorKind, EvalError, EvalResult, TraceFrame};
pub use eval::{binary_op, Evaluator, Globals, MAX_RECURSION_DEPTH, MODULE_FRAME};
pub use scope::{Scope, ScopeHandle};
pub use value::{format_float, Builtin, Value};
