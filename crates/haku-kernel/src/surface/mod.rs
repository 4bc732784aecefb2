//! Outbound interfaces the kernel renders through.
//!
//! The kernel never talks to a platform directly. Hosts implement three
//! traits:
//!
//! - [`DisplaySurface`]: send and edit messages, attach navigation controls,
//!   upload files, and mark the invoking message with a lifecycle indicator
//! - [`AlertChannel`]: one call per leaked-secret render
//! - [`PrivateChannel`]: escalated diagnostics for the operator
//!
//! # Architecture
//!
//! ```text
//! Kernel / Reactor / Paginator
//!     ↓
//! Arc<dyn DisplaySurface>, Arc<dyn AlertChannel>, Arc<dyn PrivateChannel>
//!     ↓
//! ┌──────────────────────────────────────────────┐
//! │  MemorySurface (tests)  │  host surfaces     │
//! │  - records every call   │  - chat platform   │
//! │  - scriptable failures  │  - terminal (repl) │
//! └──────────────────────────────────────────────┘
//! ```

mod memory;

pub use memory::{MemorySurface, SurfaceEvent};

use async_trait::async_trait;
use haku_types::{Indicator, MessageId, Navigation, Rendered};
use thiserror::Error;

/// Result type for surface operations.
pub type DisplayResult<T> = Result<T, DisplayError>;

/// Display surface request errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("message not found: {0}")]
    NotFound(MessageId),
    #[error("payload too large: {size} > {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

/// Where results are shown.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Send a new message.
    async fn send(&self, payload: Rendered) -> DisplayResult<MessageId>;

    /// Replace the content of an existing message.
    async fn edit(&self, id: MessageId, payload: Rendered) -> DisplayResult<()>;

    /// Offer navigation controls on a message.
    async fn attach_controls(&self, id: MessageId, controls: &[Navigation]) -> DisplayResult<()>;

    /// Remove navigation controls from a message.
    async fn detach_controls(&self, id: MessageId) -> DisplayResult<()>;

    /// Upload content as a file attachment.
    async fn send_file(&self, filename: &str, content: Vec<u8>) -> DisplayResult<MessageId>;

    /// Mark the invoking message with a lifecycle indicator.
    async fn indicate(&self, target: MessageId, indicator: Indicator) -> DisplayResult<()>;
}

/// Receives security alerts.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn alert(&self, identity: &str, description: &str);
}

/// Receives escalated diagnostics.
#[async_trait]
pub trait PrivateChannel: Send + Sync {
    async fn send_private(&self, text: String) -> DisplayResult<()>;
}
