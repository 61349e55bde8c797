//! ffpilot Tools - Process sessions and the tools that drive them
//!
//! This crate provides:
//! - Process: background session manager (spawn, buffer, deadlines, sweep, kill)
//! - Registry: Tool registration and discovery
//! - Runner: Tool execution engine with timeouts
//! - Builtins: the session tools plus `convert_media`

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod process;
pub mod registry;
pub mod runner;

pub use builtins::{register_builtins, register_builtins_with_config, BuiltinsConfig, MediaConfig};
pub use error::{Error, Result};
pub use process::{ProcessConfig, ProcessManager, ReadOutcome, SessionId, SessionSummary};
pub use registry::{RiskLevel, Tool, ToolCategory, ToolDefinition, ToolRegistry, ToolResult};
pub use runner::{ExecutionOptions, ExecutionResult, RunnerConfig, ToolRunner};
