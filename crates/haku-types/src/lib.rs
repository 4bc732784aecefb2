//! Pure data types for haku: display payloads, task records and inspection reports.
//!
//! This crate is a leaf dependency with no async runtime, no parser, no I/O.
//! It exists so that hosts embedding the kernel (chat bots, terminals, test
//! harnesses) can speak the display and task vocabulary without pulling in
//! haku-kernel's runtime.

pub mod display;
pub mod report;
pub mod task;

// Flat re-exports for convenience
pub use display::*;
pub use report::*;
pub use task::*;
