//! The error an invocation can end with, and how the reactor classifies it.

use std::time::Duration;

use thiserror::Error;

use crate::interpreter::{ErrorKind, EvalError};
use crate::parser::CompileError;
use crate::surface::DisplayError;

/// Everything that can end an invocation unsuccessfully.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("SyntaxError: {0}")]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("TimeoutError: execution exceeded {:.3}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("DisplayError: {0}")]
    Display(#[from] DisplayError),

    #[error("InternalError: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// How loudly a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// A mistake in the user's snippet. Rendered compactly inline.
    UserCode,
    /// Syntax, timeout or cancellation. A short traceback inline.
    Brief,
    /// Anything else. A deep traceback goes to the private channel.
    Internal,
}

impl SessionError {
    pub fn class(&self) -> FailureClass {
        match self {
            SessionError::Eval(err) => match err.kind {
                ErrorKind::Name | ErrorKind::Attribute | ErrorKind::ZeroDivision => {
                    FailureClass::UserCode
                }
                ErrorKind::Cancelled => FailureClass::Brief,
                _ => FailureClass::Internal,
            },
            SessionError::Display(_) => FailureClass::UserCode,
            SessionError::Compile(_) | SessionError::Timeout(_) => FailureClass::Brief,
            SessionError::Internal(_) => FailureClass::Internal,
        }
    }

    /// The error's type name as a traceback prints it.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SessionError::Compile(_) => "SyntaxError",
            SessionError::Eval(err) => err.kind.name(),
            SessionError::Timeout(_) => "TimeoutError",
            SessionError::Display(_) => "DisplayError",
            SessionError::Internal(_) => "InternalError",
        }
    }

    /// The message without the type name.
    pub fn message(&self) -> String {
        match self {
            SessionError::Compile(err) => err.to_string(),
            SessionError::Eval(err) => err.message.clone(),
            SessionError::Timeout(limit) => {
                format!("execution exceeded {:.3}s", limit.as_secs_f64())
            }
            SessionError::Display(err) => err.to_string(),
            SessionError::Internal(err) => format!("{err:#}"),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Eval(err) if err.is_cancelled())
    }
}
