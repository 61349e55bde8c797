//! list_sessions - enumerate tracked sessions

use crate::error::Result;
use crate::process::{ProcessManager, SessionSummary, NO_ACTIVE_SESSIONS};
use crate::registry::{RiskLevel, Tool, ToolCategory, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// One line per session: `PID: 123, Running: yes, Runtime: 4s`
pub(crate) fn format_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return NO_ACTIVE_SESSIONS.to_string();
    }
    sessions
        .iter()
        .map(|s| {
            format!(
                "PID: {}, Running: {}, Runtime: {}s",
                s.id,
                if s.running { "yes" } else { "no" },
                s.runtime_secs
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool that lists every tracked session
pub struct ListSessionsTool {
    definition: ToolDefinition,
    manager: Arc<ProcessManager>,
}

impl ListSessionsTool {
    /// Create the tool over a shared manager
    #[must_use]
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        let definition = ToolDefinition::new(
            "list_sessions",
            "List tracked sessions with their PID, whether they are still running, and runtime.",
        )
        .with_category(ToolCategory::Process)
        .with_risk_level(RiskLevel::Low);

        Self {
            definition,
            manager,
        }
    }
}

#[async_trait]
impl Tool for ListSessionsTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult> {
        let start = std::time::Instant::now();
        let sessions = self.manager.list_sessions().await;

        Ok(ToolResult::success(
            json!({
                "count": sessions.len(),
                "text": format_sessions(&sessions),
                "sessions": sessions,
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessConfig;

    fn summary(id: u32, running: bool, runtime_secs: u64) -> SessionSummary {
        SessionSummary {
            id,
            command_line: "ffmpeg -i a.mov b.mp4".to_string(),
            running,
            exit: None,
            started_at: chrono::Utc::now(),
            runtime_secs,
            idle_secs: 0,
        }
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_sessions(&[]), "No active sessions");
    }

    #[test]
    fn test_format_lines() {
        let text = format_sessions(&[summary(10, true, 3), summary(20, false, 61)]);
        assert_eq!(
            text,
            "PID: 10, Running: yes, Runtime: 3s\nPID: 20, Running: no, Runtime: 61s"
        );
    }

    #[tokio::test]
    async fn test_empty_manager() {
        let tool = ListSessionsTool::new(Arc::new(ProcessManager::new(ProcessConfig::default())));
        let result = tool.execute(json!({})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output["count"], 0);
        assert_eq!(result.text(), "No active sessions");
    }
}
