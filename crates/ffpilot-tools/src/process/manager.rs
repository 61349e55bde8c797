//! Session operations: start, read, terminate, list

use super::authorizer::CommandAuthorizer;
use super::config::ProcessConfig;
use super::scheduler::run_sweeper;
use super::session::{SessionId, SessionSummary};
use super::spawner::{Spawner, StartedSession};
use super::store::SessionStore;
use super::terminate::{terminate, TerminationReason};
use crate::error::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of draining a session's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Output produced since the previous read
    Output(String),
    /// The session exists but nothing new was produced
    NoNewOutput,
    /// No session is registered under the id
    NotFound,
}

/// Owns the session store, the spawner and the background sweep.
///
/// Must be created inside a tokio runtime for the sweep to run. Dropping the
/// manager stops the sweep but leaves running processes alone; call
/// [`ProcessManager::shutdown`] to kill them.
#[derive(Debug)]
pub struct ProcessManager {
    config: ProcessConfig,
    authorizer: CommandAuthorizer,
    store: SessionStore,
    spawner: Spawner,
    sweeper: CancellationToken,
}

impl ProcessManager {
    /// Create a manager with its own empty store
    #[must_use]
    pub fn new(config: ProcessConfig) -> Self {
        Self::with_store(config, SessionStore::new())
    }

    /// Create a manager over an existing store
    #[must_use]
    pub fn with_store(config: ProcessConfig, store: SessionStore) -> Self {
        let authorizer = CommandAuthorizer::new(&config.allowed_commands);
        let spawner = Spawner::new(
            store.clone(),
            config.default_shell.clone(),
            config.settle_window(),
        );
        let sweeper = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_sweeper(
                    store.clone(),
                    config.staleness(),
                    config.cleanup_interval(),
                    sweeper.clone(),
                ));
            }
            Err(_) => warn!("No tokio runtime; stale session sweep disabled"),
        }

        Self {
            config,
            authorizer,
            store,
            spawner,
            sweeper,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Command allow-list
    #[must_use]
    pub fn authorizer(&self) -> &CommandAuthorizer {
        &self.authorizer
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Authorize and launch a command.
    ///
    /// `timeout_ms` of `None` applies the configured default; `Some(0)` disables the deadline.
    pub async fn start_session(
        &self,
        command: &str,
        timeout_ms: Option<u64>,
        shell: Option<&str>,
    ) -> Result<StartedSession> {
        let Some(token) = CommandAuthorizer::leading_token(command) else {
            return Err(Error::InvalidInput("command must not be empty".to_string()));
        };
        if !self.authorizer.is_allowed(command) {
            return Err(Error::PermissionDenied(format!(
                "command '{}' is not allowed. Allowed commands: {}",
                token,
                self.authorizer.allowed_commands().join(", ")
            )));
        }

        let timeout_ms = timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        self.spawner.start(command, timeout, shell).await
    }

    /// Drain new output. A finished session is reaped once nothing is left to read.
    pub async fn read_output(&self, id: SessionId) -> ReadOutcome {
        let Some(session) = self.store.get(id) else {
            return ReadOutcome::NotFound;
        };

        let drained = session.drain().await;
        if drained.complete && self.store.remove_exact(&session) {
            debug!(session_id = id, "Reaped completed session");
        }

        if drained.text.is_empty() {
            ReadOutcome::NoNewOutput
        } else {
            ReadOutcome::Output(drained.text)
        }
    }

    /// Force-terminate a session. False if it was already gone.
    pub async fn terminate_session(&self, id: SessionId) -> bool {
        terminate(&self.store, id, TerminationReason::Requested).await
    }

    /// Snapshot of every tracked session, sorted by id
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.snapshot_all().await
    }

    /// Stop the sweep and kill every tracked session. Returns how many were removed.
    pub async fn shutdown(&self) -> usize {
        self.sweeper.cancel();
        let ids: Vec<SessionId> = self.store.sessions().iter().map(|s| s.id()).collect();
        let store = &self.store;
        futures::future::join_all(
            ids.iter()
                .map(|id| terminate(store, *id, TerminationReason::Shutdown)),
        )
        .await;
        if !ids.is_empty() {
            info!(count = ids.len(), "Terminated sessions on shutdown");
        }
        ids.len()
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        self.sweeper.cancel();
    }
}
