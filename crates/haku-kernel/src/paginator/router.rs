//! Routes navigation interactions to live paginator sessions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use haku_types::{MessageId, Navigation};

use super::interface::{NavOutcome, PaginatorInterface};

/// What happened to a routed interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The session applied the navigation.
    Handled(NavOutcome),
    /// The sender does not own the session. Nothing changed.
    NotOwner,
    /// No session was ever displayed on that message.
    UnknownSession,
}

/// Maps displayed messages to their paginator sessions.
///
/// A session is keyed by the message it is displayed on, so an interaction
/// on one message can never reach another session. Closed sessions are
/// dropped on the next dispatch or registration; their ids are remembered
/// so late interactions still report [`NavOutcome::AlreadyClosed`].
#[derive(Default)]
pub struct InteractionRouter {
    sessions: Mutex<Sessions>,
}

#[derive(Default)]
struct Sessions {
    live: HashMap<MessageId, Arc<PaginatorInterface>>,
    closed: HashSet<MessageId>,
}

impl Sessions {
    fn prune(&mut self) {
        let closed = &mut self.closed;
        self.live.retain(|id, session| {
            let open = !session.is_closed();
            if !open {
                closed.insert(*id);
            }
            open
        });
    }
}

impl InteractionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a displayed session. Sessions that never got a message (or
    /// closed right away, e.g. oversized content) are ignored.
    pub fn register(&self, session: &Arc<PaginatorInterface>) -> Option<MessageId> {
        let id = session.message_id()?;
        let mut sessions = self.sessions();
        sessions.prune();
        if session.is_closed() {
            return None;
        }
        sessions.closed.remove(&id);
        sessions.live.insert(id, Arc::clone(session));
        Some(id)
    }

    /// Deliver a navigation request from `identity` on message `id`.
    pub async fn dispatch(&self, id: MessageId, identity: &str, nav: Navigation) -> RouteOutcome {
        let session = {
            let sessions = self.sessions();
            match sessions.live.get(&id) {
                Some(session) => Arc::clone(session),
                None if sessions.closed.contains(&id) => {
                    return RouteOutcome::Handled(NavOutcome::AlreadyClosed);
                }
                None => return RouteOutcome::UnknownSession,
            }
        };
        if !session.accepts(identity) {
            tracing::debug!(%id, identity, "ignoring navigation from non-owner");
            return RouteOutcome::NotOwner;
        }
        let outcome = session.navigate(nav).await;
        if session.is_closed() {
            let mut sessions = self.sessions();
            sessions.live.remove(&id);
            sessions.closed.insert(id);
        }
        RouteOutcome::Handled(outcome)
    }

    pub fn get(&self, id: MessageId) -> Option<Arc<PaginatorInterface>> {
        self.sessions().live.get(&id).cloned()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let mut sessions = self.sessions();
        sessions.prune();
        sessions.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
