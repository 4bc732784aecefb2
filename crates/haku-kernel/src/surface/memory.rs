//! In-memory surface that records every call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use haku_types::{Indicator, MessageId, Navigation, Rendered};

use super::{AlertChannel, DisplayError, DisplayResult, DisplaySurface, PrivateChannel};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Sent { id: MessageId, payload: Rendered },
    Edited { id: MessageId, payload: Rendered },
    ControlsAttached { id: MessageId, controls: Vec<Navigation> },
    ControlsDetached { id: MessageId },
    FileSent { id: MessageId, filename: String, content: Vec<u8> },
    Indicated { target: MessageId, indicator: Indicator },
    Alert { identity: String, description: String },
    Private { text: String },
}

#[derive(Default)]
struct State {
    events: Vec<SurfaceEvent>,
    messages: HashMap<MessageId, Rendered>,
    controls: HashSet<MessageId>,
}

/// Records every call made through the surface traits.
///
/// Message ids start at 1 and increase by one per sent message or file.
/// Setting [`MemorySurface::fail_requests`] makes every display request
/// fail with [`DisplayError::Rejected`], for exercising error paths.
pub struct MemorySurface {
    next_id: AtomicU64,
    failing: AtomicBool,
    state: Mutex<State>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> DisplayResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DisplayError::Rejected("surface configured to fail".to_string()))
        } else {
            Ok(())
        }
    }

    /// Make subsequent display requests fail (or succeed again).
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every recorded call, in order.
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.state().events.clone()
    }

    /// Current content of a message.
    pub fn message(&self, id: MessageId) -> Option<Rendered> {
        self.state().messages.get(&id).cloned()
    }

    /// Ids of every message sent, in order.
    pub fn sent_ids(&self) -> Vec<MessageId> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Sent { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Current content of the most recently sent message.
    pub fn last_message(&self) -> Option<Rendered> {
        self.sent_ids().last().and_then(|id| self.message(*id))
    }

    /// Whether a message currently carries navigation controls.
    pub fn has_controls(&self, id: MessageId) -> bool {
        self.state().controls.contains(&id)
    }

    /// Indicators placed on a target message, in order.
    pub fn indicators(&self, target: MessageId) -> Vec<Indicator> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Indicated { target: t, indicator } if *t == target => Some(*indicator),
                _ => None,
            })
            .collect()
    }

    /// Recorded security alerts as `(identity, description)`.
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Alert { identity, description } => {
                    Some((identity.clone(), description.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Texts sent to the private channel.
    pub fn private_messages(&self) -> Vec<String> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Private { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Files uploaded, as `(filename, content)`.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::FileSent { filename, content, .. } => {
                    Some((filename.clone(), content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of edits made to a message.
    pub fn edit_count(&self, id: MessageId) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Edited { id: i, .. } if *i == id))
            .count()
    }
}

#[async_trait]
impl DisplaySurface for MemorySurface {
    async fn send(&self, payload: Rendered) -> DisplayResult<MessageId> {
        self.check()?;
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state();
        state.messages.insert(id, payload.clone());
        state.events.push(SurfaceEvent::Sent { id, payload });
        Ok(id)
    }

    async fn edit(&self, id: MessageId, payload: Rendered) -> DisplayResult<()> {
        self.check()?;
        let mut state = self.state();
        match state.messages.get_mut(&id) {
            Some(slot) => *slot = payload.clone(),
            None => return Err(DisplayError::NotFound(id)),
        }
        state.events.push(SurfaceEvent::Edited { id, payload });
        Ok(())
    }

    async fn attach_controls(&self, id: MessageId, controls: &[Navigation]) -> DisplayResult<()> {
        self.check()?;
        let mut state = self.state();
        state.controls.insert(id);
        state.events.push(SurfaceEvent::ControlsAttached {
            id,
            controls: controls.to_vec(),
        });
        Ok(())
    }

    async fn detach_controls(&self, id: MessageId) -> DisplayResult<()> {
        self.check()?;
        let mut state = self.state();
        state.controls.remove(&id);
        state.events.push(SurfaceEvent::ControlsDetached { id });
        Ok(())
    }

    async fn send_file(&self, filename: &str, content: Vec<u8>) -> DisplayResult<MessageId> {
        self.check()?;
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.state().events.push(SurfaceEvent::FileSent {
            id,
            filename: filename.to_string(),
            content,
        });
        Ok(id)
    }

    async fn indicate(&self, target: MessageId, indicator: Indicator) -> DisplayResult<()> {
        self.check()?;
        self.state()
            .events
            .push(SurfaceEvent::Indicated { target, indicator });
        Ok(())
    }
}

#[async_trait]
impl AlertChannel for MemorySurface {
    async fn alert(&self, identity: &str, description: &str) {
        self.state().events.push(SurfaceEvent::Alert {
            identity: identity.to_string(),
            description: description.to_string(),
        });
    }
}

#[async_trait]
impl PrivateChannel for MemorySurface {
    async fn send_private(&self, text: String) -> DisplayResult<()> {
        self.state().events.push(SurfaceEvent::Private { text });
        Ok(())
    }
}
