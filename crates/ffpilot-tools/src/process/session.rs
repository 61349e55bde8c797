//! Session state for one spawned process

use super::config::StalenessPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Session identifier: the OS process id of the spawned shell.
pub type SessionId = u32;

/// How a session's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitState {
    /// Exited normally with a status code
    Code(i32),
    /// Killed by a signal (unix)
    Signal(i32),
    /// Exit status could not be determined
    Unknown,
}

impl ExitState {
    pub(crate) fn from_status(status: &std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }
        Self::Unknown
    }

    /// Marker line appended to the buffer when the process ends.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("\n[{}]\n", self)
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "process exited with code {}", code),
            Self::Signal(signal) => write!(f, "process terminated by signal {}", signal),
            Self::Unknown => write!(f, "process exited with unknown status"),
        }
    }
}

/// Point-in-time view of a session used for listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session id (process id)
    pub id: SessionId,
    /// Command line as given by the caller
    pub command_line: String,
    /// Whether the process is still executing
    pub running: bool,
    /// Exit state once known
    pub exit: Option<ExitState>,
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,
    /// Seconds since the session was created
    pub runtime_secs: u64,
    /// Seconds since the last read (or creation)
    pub idle_secs: u64,
}

/// Output drained from a session by a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Drained {
    pub text: String,
    /// Exit recorded and both pipes closed; nothing more will ever arrive.
    pub complete: bool,
}

#[derive(Debug)]
struct SessionState {
    buffer: String,
    running: bool,
    exit: Option<ExitState>,
    open_streams: u8,
    last_read_at: Instant,
}

/// Tracked state for one spawned process.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    command_line: String,
    created_at: Instant,
    started_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    removed: CancellationToken,
    exited: CancellationToken,
}

impl Session {
    pub(crate) fn new(id: SessionId, command_line: impl Into<String>, open_streams: u8) -> Self {
        let now = Instant::now();
        Self {
            id,
            command_line: command_line.into(),
            created_at: now,
            started_at: Utc::now(),
            state: Mutex::new(SessionState {
                buffer: String::new(),
                running: true,
                exit: None,
                open_streams,
                last_read_at: now,
            }),
            removed: CancellationToken::new(),
            exited: CancellationToken::new(),
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Command line that was executed
    #[must_use]
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Cancelled once the session leaves the store.
    pub(crate) fn removed(&self) -> &CancellationToken {
        &self.removed
    }

    /// Cancelled once the exit observer has recorded the exit.
    pub(crate) fn exited(&self) -> &CancellationToken {
        &self.exited
    }

    pub(crate) async fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.state.lock().await.buffer.push_str(text);
    }

    /// A capture stream reached EOF.
    pub(crate) async fn close_stream(&self) {
        let mut state = self.state.lock().await;
        state.open_streams = state.open_streams.saturating_sub(1);
    }

    /// Record the exit. Appends the marker and flips `running` only the first time.
    pub(crate) async fn mark_exited(&self, exit: ExitState) -> bool {
        let flipped = {
            let mut state = self.state.lock().await;
            if state.running {
                state.running = false;
                state.exit = Some(exit);
                state.buffer.push_str(&exit.marker());
                true
            } else {
                false
            }
        };
        self.exited.cancel();
        flipped
    }

    /// Take everything buffered so far and stamp the read time.
    pub(crate) async fn drain(&self) -> Drained {
        let mut state = self.state.lock().await;
        state.last_read_at = Instant::now();
        Drained {
            text: std::mem::take(&mut state.buffer),
            complete: !state.running && state.open_streams == 0,
        }
    }

    /// Copy of the buffer without draining it.
    pub(crate) async fn peek(&self) -> String {
        self.state.lock().await.buffer.clone()
    }

    /// Whether the process is still executing.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Exit recorded and both pipes closed. Nothing in the process group can
    /// still be writing, so the pgid may already be free for reuse.
    pub(crate) async fn is_complete(&self) -> bool {
        let state = self.state.lock().await;
        !state.running && state.open_streams == 0
    }

    /// Exit state, once recorded.
    pub async fn exit(&self) -> Option<ExitState> {
        self.state.lock().await.exit
    }

    /// Summary for listing; does not touch the buffer.
    pub async fn summary(&self) -> SessionSummary {
        let state = self.state.lock().await;
        SessionSummary {
            id: self.id,
            command_line: self.command_line.clone(),
            running: state.running,
            exit: state.exit,
            started_at: self.started_at,
            runtime_secs: self.created_at.elapsed().as_secs(),
            idle_secs: state.last_read_at.elapsed().as_secs(),
        }
    }

    /// Whether the sweep should reclaim this session at `now`.
    pub(crate) async fn is_stale(&self, now: Instant, policy: StalenessPolicy) -> bool {
        let last_read_at = self.state.lock().await.last_read_at;
        elapsed_since(now, last_read_at) > policy.idle_timeout
            || elapsed_since(now, self.created_at) > policy.max_age
    }
}

fn elapsed_since(now: Instant, then: Instant) -> Duration {
    now.saturating_duration_since(then)
}
