//! terminate_session - kill a session's process group

use super::parse_input;
use crate::error::Result;
use crate::process::{ProcessManager, SessionId};
use crate::registry::{RiskLevel, Tool, ToolCategory, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TerminateSessionInput {
    id: SessionId,
}

/// Tool that force-terminates a session
pub struct TerminateSessionTool {
    definition: ToolDefinition,
    manager: Arc<ProcessManager>,
}

impl TerminateSessionTool {
    /// Create the tool over a shared manager
    #[must_use]
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        let definition = ToolDefinition::new(
            "terminate_session",
            "Forcefully stop a session and every process it started. Unread output is discarded.",
        )
        .with_category(ToolCategory::Process)
        .with_risk_level(RiskLevel::Medium)
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "PID returned by start_session"
                }
            },
            "required": ["id"]
        }));

        Self {
            definition,
            manager,
        }
    }
}

#[async_trait]
impl Tool for TerminateSessionTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let params: TerminateSessionInput = parse_input(input)?;
        let start = std::time::Instant::now();

        let terminated = self.manager.terminate_session(params.id).await;
        let text = if terminated {
            format!("Successfully terminated session {}", params.id)
        } else {
            format!("No active session found for PID {}", params.id)
        };

        Ok(ToolResult::success(
            json!({
                "id": params.id,
                "terminated": terminated,
                "text": text,
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}
