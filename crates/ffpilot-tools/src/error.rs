//! Error types for ffpilot-tools

use thiserror::Error;

/// Tool and session error type
#[derive(Debug, Error)]
pub enum Error {
    /// Tool not found
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Permission denied (including commands outside the allow-list)
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The process could not be launched
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
