//! Abstract syntax tree for haku script.
//!
//! The parser produces a [`Program`]; the interpreter walks it. Every
//! statement records the source line it starts on so runtime errors can
//! build a traceback.

mod types;

pub use types::*;
