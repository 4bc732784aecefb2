//! Runtime errors raised while evaluating haku script.

use std::fmt;

use thiserror::Error;

/// What went wrong, by category. The names match what a traceback prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Name,
    Attribute,
    ZeroDivision,
    Type,
    Index,
    Key,
    Value,
    Recursion,
    /// Raised by a user `raise` statement.
    Raised,
    /// The run was cancelled or timed out while suspended.
    Cancelled,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Name => "NameError",
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::ZeroDivision => "ZeroDivisionError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Index => "IndexError",
            ErrorKind::Key => "KeyError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Recursion => "RecursionError",
            ErrorKind::Raised => "Exception",
            ErrorKind::Cancelled => "CancelledError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One frame of a traceback: the function and the line executing in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub function: String,
    pub line: usize,
}

/// A runtime error with the call stack captured where it was raised.
///
/// `trace` is outermost-first, the order a traceback prints it in.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "the operation was cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Line of the innermost frame, if the trace has been captured.
    pub fn line(&self) -> Option<usize> {
        self.trace.last().map(|f| f.line)
    }
}

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Shorthand constructors used throughout the evaluator.
pub(crate) fn type_error(message: impl Into<String>) -> EvalError {
    EvalError::new(ErrorKind::Type, message)
}

pub(crate) fn value_error(message: impl Into<String>) -> EvalError {
    EvalError::new(ErrorKind::Value, message)
}
