//! A display surface backed by the terminal.
//!
//! Messages are kept by id so that paginator edits replace what was sent.
//! Nothing is printed from inside the kernel: sends and edits queue the
//! message, and the REPL drains the queue after each line. A message edited
//! several times before a drain is shown once, with its latest content.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use haku_kernel::{AlertChannel, DisplayError, DisplayResult, DisplaySurface, PrivateChannel};
use haku_types::{Indicator, MessageId, Navigation, Rendered};

use crate::format::{render, strip_markup, Style};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Message(MessageId),
    Note { label: &'static str, text: String },
}

#[derive(Debug, Default)]
struct TerminalState {
    messages: HashMap<MessageId, Rendered>,
    queue: Vec<Entry>,
    controls: Option<MessageId>,
    indicators: HashMap<MessageId, Indicator>,
}

/// Terminal display, alert, and private channel in one.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    next_id: AtomicU64,
    state: Mutex<TerminalState>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocate the id an input line is known by.
    pub fn record_input(&self) -> MessageId {
        self.allocate()
    }

    /// The message currently offering navigation controls.
    pub fn active_controls(&self) -> Option<MessageId> {
        self.state().controls
    }

    /// The latest lifecycle indicator on an input line.
    pub fn indicator(&self, target: MessageId) -> Option<Indicator> {
        self.state().indicators.get(&target).copied()
    }

    /// Current content of a message.
    pub fn message(&self, id: MessageId) -> Option<Rendered> {
        self.state().messages.get(&id).cloned()
    }

    /// Render and clear everything queued since the last drain.
    pub fn drain(&self, style: Style) -> Vec<String> {
        let mut state = self.state();
        let queue = std::mem::take(&mut state.queue);
        queue
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Message(id) => state.messages.get(&id).map(|m| render(m, style)),
                Entry::Note { label, text } => Some(format!("[{label}] {}", strip_markup(&text))),
            })
            .filter(|text| !text.is_empty())
            .collect()
    }

    fn note(&self, label: &'static str, text: String) {
        self.state().queue.push(Entry::Note { label, text });
    }
}

#[async_trait]
impl DisplaySurface for TerminalSurface {
    async fn send(&self, payload: Rendered) -> DisplayResult<MessageId> {
        let id = self.allocate();
        let mut state = self.state();
        state.messages.insert(id, payload);
        state.queue.push(Entry::Message(id));
        Ok(id)
    }

    async fn edit(&self, id: MessageId, payload: Rendered) -> DisplayResult<()> {
        let mut state = self.state();
        match state.messages.get_mut(&id) {
            Some(message) => *message = payload,
            None => return Err(DisplayError::NotFound(id)),
        }
        if !state.queue.contains(&Entry::Message(id)) {
            state.queue.push(Entry::Message(id));
        }
        Ok(())
    }

    async fn attach_controls(&self, id: MessageId, _controls: &[Navigation]) -> DisplayResult<()> {
        if !self.state().messages.contains_key(&id) {
            return Err(DisplayError::NotFound(id));
        }
        self.state().controls = Some(id);
        self.note("pages", "/first /prev /next /last /close".to_string());
        Ok(())
    }

    async fn detach_controls(&self, id: MessageId) -> DisplayResult<()> {
        let mut state = self.state();
        if state.controls == Some(id) {
            state.controls = None;
        }
        Ok(())
    }

    async fn send_file(&self, filename: &str, content: Vec<u8>) -> DisplayResult<MessageId> {
        let id = self.allocate();
        let text = String::from_utf8_lossy(&content).into_owned();
        self.state().messages.insert(id, Rendered::text(text.clone()));
        self.note("file", format!("{filename} ({} bytes)\n{text}", content.len()));
        Ok(id)
    }

    async fn indicate(&self, target: MessageId, indicator: Indicator) -> DisplayResult<()> {
        tracing::trace!(%target, ?indicator, "indicator");
        self.state().indicators.insert(target, indicator);
        Ok(())
    }
}

#[async_trait]
impl AlertChannel for TerminalSurface {
    async fn alert(&self, identity: &str, description: &str) {
        tracing::warn!(identity, description, "security alert");
        self.note("alert", format!("{identity}: {description}"));
    }
}

#[async_trait]
impl PrivateChannel for TerminalSurface {
    async fn send_private(&self, text: String) -> DisplayResult<()> {
        self.note("private", text);
        Ok(())
    }
}
