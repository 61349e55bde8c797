//! Server module for ffpilot
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment

pub mod config;
mod loader;

pub use loader::load_config;

use crate::mcp::McpBridge;
use anyhow::Result;
use self::config::AppConfig;
use ffpilot_tools::{
    register_builtins_with_config, BuiltinsConfig, ProcessManager, RunnerConfig, ToolRegistry,
    ToolRunner,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Register the built-in tools and apply the `[tools]` section.
pub fn build_registry(config: &AppConfig, manager: Arc<ProcessManager>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let builtins = BuiltinsConfig {
        media: config.media.clone(),
    };
    register_builtins_with_config(&mut registry, manager, &builtins);

    for name in &config.tools.disabled {
        if !registry.disable(name) {
            warn!(tool = %name, "Cannot disable unknown tool");
        }
    }
    registry
}

/// Serve MCP over stdio until the client disconnects or Ctrl-C.
pub async fn run(config: AppConfig) -> Result<()> {
    info!(
        "Starting ffpilot MCP server v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        allowed = ?config.process.allowed_commands,
        default_timeout_ms = config.process.default_timeout_ms,
        "Process sessions configured"
    );

    let manager = Arc::new(ProcessManager::new(config.process.clone()));
    let registry = build_registry(&config, Arc::clone(&manager));
    let runner = ToolRunner::new(Arc::new(registry), RunnerConfig::default());
    let bridge = McpBridge::new(runner, Arc::clone(&manager));

    tokio::select! {
        result = bridge.run_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, terminating sessions");
            manager.shutdown().await;
            Ok(())
        }
    }
}

/// Print the registered tool definitions as JSON.
pub async fn print_tools(config: AppConfig) -> Result<()> {
    let manager = Arc::new(ProcessManager::new(config.process.clone()));
    let registry = build_registry(&config, manager);
    let definitions = registry.list_enabled();
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_tools_are_hidden() {
        let mut config = AppConfig::default();
        config.tools.disabled = vec!["convert_media".to_string(), "bogus".to_string()];
        let manager = Arc::new(ProcessManager::new(config.process.clone()));

        let registry = build_registry(&config, manager);
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.list_enabled().len(), 4);
        assert!(registry
            .list_enabled()
            .iter()
            .all(|d| d.name != "convert_media"));
    }
}
