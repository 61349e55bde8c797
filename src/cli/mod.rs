//! CLI module for ffpilot
//!
//! - `serve`: run the MCP server on stdio (default)
//! - `tools`: print the tool definitions

use crate::server::{self, config::AppConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ffpilot MCP server
#[derive(Parser, Debug)]
#[command(name = "ffpilot")]
#[command(about = "Run and supervise ffmpeg sessions over MCP")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON (logs always go to stderr)
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Serve MCP over stdio (default)
    Serve,
    /// Print registered tool definitions as JSON
    Tools,
}

/// Run the CLI command
pub async fn run(command: Option<Commands>, config: AppConfig) -> anyhow::Result<()> {
    match command.unwrap_or(Commands::Serve) {
        Commands::Serve => server::run(config).await,
        Commands::Tools => server::print_tools(config).await,
    }
}
