//! start_session - launch an allowed command in the background

use super::parse_input;
use crate::error::Result;
use crate::process::{ProcessManager, StartedSession};
use crate::registry::{RiskLevel, Tool, ToolCategory, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StartSessionInput {
    command: String,
    #[serde(default, alias = "timeoutMs")]
    timeout_ms: Option<u64>,
    #[serde(default)]
    shell: Option<String>,
}

/// Caller-facing summary of a freshly started session.
pub(crate) fn describe_start(started: &StartedSession) -> String {
    let mut text = format!("Process started with PID {}\n", started.id);
    if started.initial_output.is_empty() {
        text.push_str("No initial output.\n");
    } else {
        text.push_str("Initial output:\n");
        text.push_str(&started.initial_output);
        if !started.initial_output.ends_with('\n') {
            text.push('\n');
        }
    }
    if started.running {
        text.push_str("\nCommand is still running. Use read_output to get more output.");
    }
    text
}

/// Tool that starts a background process session
pub struct StartSessionTool {
    definition: ToolDefinition,
    manager: Arc<ProcessManager>,
}

impl StartSessionTool {
    /// Create the tool over a shared manager
    #[must_use]
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        let allowed = manager.authorizer().allowed_commands().join(", ");
        let definition = ToolDefinition::new(
            "start_session",
            format!(
                "Start a command in the background and return its PID with the first \
                 second of output. Only these leading commands are allowed: {}. \
                 Send a single command; chained commands are not checked. \
                 Use read_output to poll and terminate_session to stop it.",
                allowed
            ),
        )
        .with_category(ToolCategory::Process)
        .with_risk_level(RiskLevel::High)
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command line to run, e.g. 'ffmpeg -i in.mov out.mp4'"
                },
                "timeout_ms": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Kill the process after this many milliseconds (0 disables)",
                    "default": manager.config().default_timeout_ms
                },
                "shell": {
                    "type": "string",
                    "description": "Shell to run the command under (defaults to the platform shell)"
                }
            },
            "required": ["command"]
        }));

        Self {
            definition,
            manager,
        }
    }
}

#[async_trait]
impl Tool for StartSessionTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let params: StartSessionInput = parse_input(input)?;
        let start = std::time::Instant::now();

        let started = self
            .manager
            .start_session(&params.command, params.timeout_ms, params.shell.as_deref())
            .await?;

        Ok(ToolResult::success(
            json!({
                "id": started.id,
                "running": started.running,
                "text": describe_start(&started),
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}
