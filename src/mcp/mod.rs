//! MCP (Model Context Protocol) server over stdio
//!
//! Exposes the registered tools to MCP clients with JSON-RPC 2.0, one message
//! per line.

mod bridge;
pub mod protocol;

pub use bridge::McpBridge;
