//! Builtins - Tools exposed over MCP
//!
//! - Session tools: start_session, read_output, terminate_session, list_sessions
//! - Media tool: convert_media (builds an ffmpeg command and starts a session)

mod convert_media;
mod list_sessions;
mod read_output;
mod start_session;
mod terminate_session;

pub use convert_media::{ConvertMediaTool, MediaConfig};
pub use list_sessions::ListSessionsTool;
pub use read_output::ReadOutputTool;
pub use start_session::StartSessionTool;
pub use terminate_session::TerminateSessionTool;

use crate::process::ProcessManager;
use crate::registry::ToolRegistry;
use std::sync::Arc;

/// Configuration for built-in tools
#[derive(Debug, Clone, Default)]
pub struct BuiltinsConfig {
    /// Settings for `convert_media`
    pub media: MediaConfig,
}

/// Register all built-in tools with default configuration
pub fn register_builtins(registry: &mut ToolRegistry, manager: Arc<ProcessManager>) {
    register_builtins_with_config(registry, manager, &BuiltinsConfig::default());
}

/// Register all built-in tools over a shared session manager
pub fn register_builtins_with_config(
    registry: &mut ToolRegistry,
    manager: Arc<ProcessManager>,
    config: &BuiltinsConfig,
) {
    registry.register(Arc::new(StartSessionTool::new(Arc::clone(&manager))));
    registry.register(Arc::new(ReadOutputTool::new(Arc::clone(&manager))));
    registry.register(Arc::new(TerminateSessionTool::new(Arc::clone(&manager))));
    registry.register(Arc::new(ListSessionsTool::new(Arc::clone(&manager))));
    registry.register(Arc::new(ConvertMediaTool::new(
        manager,
        config.media.clone(),
    )));
}

/// Parse tool arguments into `T`, reporting problems as invalid input.
pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(input: serde_json::Value) -> crate::Result<T> {
    serde_json::from_value(input)
        .map_err(|e| crate::Error::InvalidInput(format!("Invalid arguments: {}", e)))
}
