//! Paginated, navigable, live-updating output.
//!
//! # Architecture
//!
//! ```text
//! text / lines ──▶ PageBuffer ──▶ PaginatorInterface ──▶ DisplaySurface
//!                                        ▲
//!                 InteractionRouter ─────┘  (navigation by message id)
//! ```

mod buffer;
mod interface;
mod router;

pub use buffer::PageBuffer;
pub use interface::{
    escape_fences, CloseReason, Layout, NavOutcome, PaginatorConfig, PaginatorInterface,
};
pub use router::{InteractionRouter, RouteOutcome};
