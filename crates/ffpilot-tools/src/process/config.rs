//! Process session manager configuration

use super::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the process session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Leading command tokens that may be started.
    pub allowed_commands: Vec<String>,
    /// Shell used when the caller gives none. `None` picks the platform default.
    pub default_shell: Option<String>,
    /// Deadline applied when the caller omits `timeout_ms`.
    pub default_timeout_ms: u64,
    /// How long `start` collects output before returning.
    pub settle_window_ms: u64,
    /// Period of the staleness sweep.
    pub cleanup_interval_secs: u64,
    /// Sessions not read for this long are reclaimed.
    pub idle_timeout_secs: u64,
    /// Sessions older than this are reclaimed regardless of reads.
    pub max_age_secs: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            default_shell: None,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_window_ms: DEFAULT_SETTLE_WINDOW_MS,
            cleanup_interval_secs: SESSION_CLEANUP_INTERVAL_SECS,
            idle_timeout_secs: SESSION_IDLE_TIMEOUT_SECS,
            max_age_secs: SESSION_MAX_AGE_SECS,
        }
    }
}

impl ProcessConfig {
    /// Settling window as a `Duration`.
    #[must_use]
    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }

    /// Sweep period as a `Duration`.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Staleness thresholds used by the sweep.
    #[must_use]
    pub fn staleness(&self) -> StalenessPolicy {
        StalenessPolicy {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            max_age: Duration::from_secs(self.max_age_secs),
        }
    }

    /// Reject settings that would make the manager unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_commands.iter().all(|c| c.trim().is_empty()) {
            return Err("process.allowed_commands must name at least one command".to_string());
        }
        if self.settle_window_ms == 0 {
            return Err("process.settle_window_ms must be greater than zero".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            return Err("process.cleanup_interval_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Thresholds after which the sweep reclaims a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Maximum time since the last read.
    pub idle_timeout: Duration,
    /// Maximum time since creation.
    pub max_age: Duration,
}
