//! Session store
//!
//! Sharded concurrent map from session id to session. Each session carries its
//! own lock, so work on one session never waits on another. Map guards are
//! never held across an `.await`.

use super::session::{Session, SessionId, SessionSummary};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Concurrency-safe session map. Clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Returns false, leaving the existing entry untouched, if the id is taken.
    pub fn insert(&self, session: Arc<Session>) -> bool {
        match self.sessions.entry(session.id()) {
            Entry::Occupied(_) => {
                warn!(session_id = session.id(), "Session id already registered (pid reuse?)");
                false
            }
            Entry::Vacant(slot) => {
                debug!(session_id = session.id(), "Session registered");
                slot.insert(session);
                true
            }
        }
    }

    /// Look a session up
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session and cancel its timers. `None` if it was not present.
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;
        session.removed().cancel();
        Some(session)
    }

    /// Remove `session` only if it is still the entry registered under its id.
    pub(crate) fn remove_exact(&self, session: &Arc<Session>) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.id(), |_, current| Arc::ptr_eq(current, session))
            .is_some();
        if removed {
            session.removed().cancel();
        }
        removed
    }

    /// Handles to every session currently registered.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Summaries of every session, sorted by id. Buffers are not touched.
    pub async fn snapshot_all(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::new();
        for session in self.sessions() {
            summaries.push(session.summary().await);
        }
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Number of sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
