//! Force termination of sessions

use super::kill::kill_process_tree;
use super::session::{Session, SessionId};
use super::store::SessionStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a session is being terminated (for logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminationReason {
    Requested,
    Deadline,
    Stale,
    Shutdown,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Deadline => "deadline",
            Self::Stale => "stale",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Remove the session registered under `id` and kill its process group.
///
/// The group is signalled even after the shell itself exited, as long as a
/// descendant still holds the output pipes.
///
/// Returns false if no session was registered, or if the signal could not be
/// delivered. The session leaves the store either way.
pub(crate) async fn terminate(
    store: &SessionStore,
    id: SessionId,
    reason: TerminationReason,
) -> bool {
    match store.remove(id) {
        Some(session) => finish(session, reason).await,
        None => {
            debug!(session_id = id, %reason, "No session to terminate");
            false
        }
    }
}

/// Like [`terminate`], but only if `session` is still the registered entry.
/// Timers use this so a reused pid never takes down an unrelated session.
///
/// Returns whether the session was removed; signal failures are only logged.
pub(crate) async fn terminate_exact(
    store: &SessionStore,
    session: &Arc<Session>,
    reason: TerminationReason,
) -> bool {
    if !store.remove_exact(session) {
        debug!(session_id = session.id(), %reason, "Session already gone");
        return false;
    }
    finish(Arc::clone(session), reason).await;
    true
}

async fn finish(session: Arc<Session>, reason: TerminationReason) -> bool {
    let id = session.id();

    // A descendant can outlive the shell and keep the group (and the pipes)
    // alive. Only a complete session is past signalling.
    if session.is_complete().await {
        info!(session_id = id, %reason, "Removed finished session");
        return true;
    }

    match kill_process_tree(id).await {
        Ok(()) => {
            info!(session_id = id, command = %session.command_line(), %reason, "Session force-terminated");
            true
        }
        Err(e) => {
            error!(session_id = id, %reason, error = %e, "Failed to signal process group");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::session::ExitState;

    #[tokio::test]
    async fn test_unknown_id_is_noop() {
        let store = SessionStore::new();
        assert!(!terminate(&store, 4242, TerminationReason::Requested).await);
    }

    #[tokio::test]
    async fn test_finished_session_removed_without_signal() {
        let store = SessionStore::new();
        // pid 1 would be a terrible target; the exited flag keeps it safe.
        let session = Arc::new(Session::new(1, "echo done", 0));
        session.mark_exited(ExitState::Code(0)).await;
        store.insert(Arc::clone(&session));

        assert!(terminate(&store, 1, TerminationReason::Requested).await);
        assert!(store.is_empty());
        assert!(session.removed().is_cancelled());
        assert!(!terminate(&store, 1, TerminationReason::Requested).await);
    }

    #[tokio::test]
    async fn test_exact_skips_replaced_session() {
        let store = SessionStore::new();
        let stale = Arc::new(Session::new(1, "echo a", 0));
        stale.mark_exited(ExitState::Code(0)).await;
        let current = Arc::new(Session::new(1, "echo b", 0));
        current.mark_exited(ExitState::Code(0)).await;
        store.insert(Arc::clone(&current));

        assert!(!terminate_exact(&store, &stale, TerminationReason::Deadline).await);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(TerminationReason::Deadline.to_string(), "deadline");
        assert_eq!(TerminationReason::Shutdown.to_string(), "shutdown");
    }
}
