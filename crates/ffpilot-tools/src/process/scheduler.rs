//! Session deadlines and the staleness sweep

use super::config::StalenessPolicy;
use super::session::{Session, SessionId};
use super::store::SessionStore;
use super::terminate::{terminate_exact, TerminationReason};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Force-terminate `session` once `timeout` elapses, unless it leaves the
/// store first. Exiting does not cancel the deadline: an exited shell can
/// leave descendants running.
pub(crate) fn arm_deadline(
    store: SessionStore,
    session: &Arc<Session>,
    timeout: Duration,
) -> JoinHandle<()> {
    let id = session.id();
    let removed = session.removed().clone();
    let target: Weak<Session> = Arc::downgrade(session);

    tokio::spawn(async move {
        tokio::select! {
            _ = removed.cancelled() => {
                debug!(session_id = id, "Deadline cancelled: session removed");
            }
            _ = tokio::time::sleep(timeout) => {
                let Some(session) = target.upgrade() else { return };
                warn!(
                    session_id = id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Session deadline reached"
                );
                terminate_exact(&store, &session, TerminationReason::Deadline).await;
            }
        }
    })
}

/// Terminate every session that is stale at `now`. Returns the reclaimed ids.
pub(crate) async fn sweep_once(
    store: &SessionStore,
    policy: StalenessPolicy,
    now: Instant,
) -> Vec<SessionId> {
    let mut reclaimed = Vec::new();
    for session in store.sessions() {
        if !session.is_stale(now, policy).await {
            continue;
        }
        if terminate_exact(store, &session, TerminationReason::Stale).await {
            reclaimed.push(session.id());
        }
    }
    reclaimed
}

/// Run the periodic sweep until `shutdown` is cancelled.
pub(crate) async fn run_sweeper(
    store: SessionStore,
    policy: StalenessPolicy,
    interval: Duration,
    shutdown: CancellationToken,
) {
    debug!(interval_secs = interval.as_secs(), "Session sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let reclaimed = sweep_once(&store, policy, Instant::now()).await;
                if !reclaimed.is_empty() {
                    info!(count = reclaimed.len(), ids = ?reclaimed, "Reclaimed stale sessions");
                }
            }
            _ = shutdown.cancelled() => {
                debug!("Session sweeper stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::session::ExitState;

    fn finished(id: SessionId) -> Arc<Session> {
        Arc::new(Session::new(id, "echo done", 0))
    }

    #[tokio::test]
    async fn test_sweep_reclaims_idle_sessions() {
        let store = SessionStore::new();
        let first = finished(100);
        let second = finished(200);
        for s in [&first, &second] {
            s.mark_exited(ExitState::Code(0)).await;
            store.insert(Arc::clone(s));
        }

        let policy = StalenessPolicy {
            idle_timeout: Duration::from_secs(60),
            max_age: Duration::from_secs(3600),
        };
        // Nothing is stale yet.
        assert!(sweep_once(&store, policy, Instant::now()).await.is_empty());

        // Two minutes later both have been idle past the threshold.
        let later = Instant::now() + Duration::from_secs(120);
        let mut reclaimed = sweep_once(&store, policy, later).await;
        reclaimed.sort_unstable();
        assert_eq!(reclaimed, vec![100, 200]);
        assert!(store.is_empty());
        assert!(second.removed().is_cancelled());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_empty_store() {
        let store = SessionStore::new();
        let policy = StalenessPolicy {
            idle_timeout: Duration::ZERO,
            max_age: Duration::ZERO,
        };
        assert!(sweep_once(&store, policy, Instant::now()).await.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cancelled_by_removal() {
        let store = SessionStore::new();
        let session = finished(300);
        store.insert(Arc::clone(&session));

        let handle = arm_deadline(store.clone(), &session, Duration::from_secs(3600));
        store.remove(300);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("deadline task should end once the session is removed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_deadline_removes_exited_session() {
        let store = SessionStore::new();
        let session = finished(400);
        session.mark_exited(ExitState::Code(0)).await;
        store.insert(Arc::clone(&session));

        // Exit does not disarm the deadline; the unread session goes at T.
        let handle = arm_deadline(store.clone(), &session, Duration::from_millis(50));
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("deadline task should fire")
            .unwrap();
        assert!(store.get(400).is_none());
        assert!(session.removed().is_cancelled());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let policy = StalenessPolicy {
            idle_timeout: Duration::from_secs(60),
            max_age: Duration::from_secs(60),
        };
        let handle = tokio::spawn(run_sweeper(
            SessionStore::new(),
            policy,
            Duration::from_secs(3600),
            shutdown.clone(),
        ));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
