//! Constants for the process session manager

// ── Time Constants ─────────────────────────────────────────────────────────

pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_SETTLE_WINDOW_MS: u64 = 1_000;
pub const SESSION_CLEANUP_INTERVAL_SECS: u64 = 60;
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 1800; // 30 minutes
pub const SESSION_MAX_AGE_SECS: u64 = 1800; // 30 minutes

/// How long the exit observer waits for the pipes to drain after the shell exits.
/// Grandchildren that inherited the pipes can keep them open indefinitely.
pub const EXIT_DRAIN_GRACE_MS: u64 = 250;

// ── Capture ────────────────────────────────────────────────────────────────

pub const READ_CHUNK_BYTES: usize = 8 * 1024;

// ── Caller-facing text ─────────────────────────────────────────────────────

pub const NO_NEW_OUTPUT: &str = "No new output";
pub const NO_ACTIVE_SESSIONS: &str = "No active sessions";

// ── Allow-list ─────────────────────────────────────────────────────────────

/// Leading tokens permitted by default: the converter plus a few inspection commands.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "ffmpeg", "ffprobe", "echo", "ls", "dir", "pwd", "which", "where", "cat", "type", "file",
];
