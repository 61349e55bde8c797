//! read_output - drain new output from a session

use super::parse_input;
use crate::error::Result;
use crate::process::{ProcessManager, ReadOutcome, SessionId, NO_NEW_OUTPUT};
use crate::registry::{RiskLevel, Tool, ToolCategory, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadOutputInput {
    id: SessionId,
}

/// Tool that returns output produced since the previous read
pub struct ReadOutputTool {
    definition: ToolDefinition,
    manager: Arc<ProcessManager>,
}

impl ReadOutputTool {
    /// Create the tool over a shared manager
    #[must_use]
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        let definition = ToolDefinition::new(
            "read_output",
            "Read new output from a session started with start_session. Each call returns \
             only what was produced since the previous read. A finished session is removed \
             once its final output has been read.",
        )
        .with_category(ToolCategory::Process)
        .with_risk_level(RiskLevel::Low)
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
impl Tool for ReadOutputTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let params: ReadOutputInput = parse_input(input)?;
        let start = std::time::Instant::now();

        let (found, text) = match self.manager.read_output(params.id).await {
            ReadOutcome::Output(text) => (true, text),
            ReadOutcome::NoNewOutput => (true, NO_NEW_OUTPUT.to_string()),
            ReadOutcome::NotFound => (false, format!("No session found for PID {}", params.id)),
        };

        Ok(ToolResult::success(
            json!({
                "id": params.id,
                "found": found,
                "text": text,
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}
