//! Server configuration types

use anyhow::{bail, Result};
use ffpilot_tools::{MediaConfig, ProcessConfig};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "ffpilot=info,ffpilot_tools=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Tool exposure configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools registered but hidden from clients
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl AppConfig {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if let Err(reason) = self.process.validate() {
            bail!("Invalid configuration: {}", reason);
        }
        if self.media.ffmpeg_path.trim().is_empty() {
            bail!("Invalid configuration: media.ffmpeg_path must not be empty");
        }
        if self.media.max_input_bytes == 0 {
            bail!("Invalid configuration: media.max_input_bytes must be greater than zero");
        }
        Ok(())
    }
}
