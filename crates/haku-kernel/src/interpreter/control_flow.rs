//! Non-local control flow between statements.

use super::value::Value;

/// How a statement finished.
///
/// `Break` and `Continue` never escape a loop body and `Return` never
/// escapes a function call; the parser rejects programs where they could.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl ControlFlow {
    pub fn is_normal(&self) -> bool {
        matches!(self, ControlFlow::Normal)
    }
}
