//! haku-kernel (核): the evaluation session engine.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes haku script using logos
//! - **Parser**: Builds the AST with a hand-written recursive descent parser
//! - **AST**: Type definitions for the abstract syntax tree
//! - **Interpreter**: The async tree-walking evaluator, values, and scopes
//! - **Executor**: Turns a snippet into a lazy stream of produced values
//! - **Inspect**: Ordered, failable probes that describe a value
//! - **Paginator**: Navigable, live-updating paged output
//! - **Scheduler**: The registry of in-flight tasks
//! - **Reactor**: Lifecycle indicators, failure rendering, secret redaction
//! - **Surface**: The outbound display, alert, and private channel traits
//! - **Kernel**: Wires all of the above for one host

pub mod ast;
pub mod executor;
pub mod inspect;
pub mod interpreter;
pub mod kernel;
pub mod lexer;
pub mod paginator;
pub mod parser;
pub mod reactor;
pub mod scheduler;
pub mod surface;

pub use executor::{run, ExecutionUnit, ResultStream};
pub use inspect::inspect;
pub use interpreter::{ErrorKind, EvalError, Scope, ScopeHandle, Value};
pub use kernel::{Invocation, Kernel, KernelConfig};
pub use paginator::{
    InteractionRouter, Layout, NavOutcome, PageBuffer, PaginatorConfig, PaginatorInterface,
    RouteOutcome,
};
pub use parser::{parse, CompileError};
pub use reactor::{Reactor, Redactor, SessionError, REDACTION_MARKER};
pub use scheduler::{TaskError, TaskGuard, TaskRegistry};
pub use surface::{
    AlertChannel, DisplayError, DisplayResult, DisplaySurface, MemorySurface, PrivateChannel,
    SurfaceEvent,
};
