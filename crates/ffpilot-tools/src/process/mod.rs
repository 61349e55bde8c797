//! Process session manager
//!
//! Runs external commands (mostly `ffmpeg`) in the background under a shell,
//! buffers their combined stdout/stderr, and hands the output back on demand.
//!
//! ```text
//! start_session ──> CommandAuthorizer ──> Spawner ──> SessionStore
//!                                           │  ├─ capture tasks (stdout, stderr)
//!                                           │  ├─ exit observer
//!                                           │  └─ deadline (scheduler)
//! read_output / terminate_session / list_sessions ──> SessionStore
//! sweeper (every cleanup_interval) ──> stale sessions ──> kill_process_tree
//! ```
//!
//! Each session is keyed by the pid of its shell, which also leads the
//! session's process group, so termination reaches every descendant.

mod authorizer;
mod config;
mod constants;
mod decode;
mod kill;
mod manager;
mod scheduler;
mod session;
mod spawner;
mod store;
mod terminate;


pub use authorizer::CommandAuthorizer;
pub use config::{ProcessConfig, StalenessPolicy};
pub use constants::{NO_ACTIVE_SESSIONS, NO_NEW_OUTPUT};
pub use kill::kill_process_tree;
pub use manager::{ProcessManager, ReadOutcome};
pub use session::{ExitState, Session, SessionId, SessionSummary};
pub use spawner::{ShellCommand, StartedSession};
pub use store::SessionStore;
