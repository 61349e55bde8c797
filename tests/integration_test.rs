//! Integration tests for ffpilot
//!
//! These tests drive the public surface of ffpilot-tools the way the MCP
//! server does:
//! - Tool registry: builtins and their schemas
//! - Tool runner: argument validation and error mapping
//! - Process sessions: start, read, list, terminate through the tools

use std::sync::Arc;
use std::time::Duration;

use ffpilot_tools::{
    register_builtins, register_builtins_with_config, BuiltinsConfig, Error, MediaConfig,
    ProcessConfig, ProcessManager, ReadOutcome, RunnerConfig, ToolRegistry, ToolRunner,
};
use serde_json::json;

fn unix_config() -> ProcessConfig {
    ProcessConfig {
        allowed_commands: ["echo", "sleep"].iter().map(|s| s.to_string()).collect(),
        default_shell: Some("/bin/sh".to_string()),
        default_timeout_ms: 10_000,
        settle_window_ms: 300,
        ..Default::default()
    }
}

fn runner_with(config: ProcessConfig, media: MediaConfig) -> (ToolRunner, Arc<ProcessManager>) {
    let manager = Arc::new(ProcessManager::new(config));
    let mut registry = ToolRegistry::new();
    register_builtins_with_config(&mut registry, Arc::clone(&manager), &BuiltinsConfig { media });
    let runner = ToolRunner::new(
        Arc::new(registry),
        RunnerConfig::new(Duration::from_secs(10)),
    );
    (runner, manager)
}

// ============================================================================
// Tool Registry Integration Tests
// ============================================================================

#[tokio::test]
async fn test_tool_registry_with_builtins() {
    let manager = Arc::new(ProcessManager::new(ProcessConfig::default()));
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, manager);

    let expected_tools = [
        "start_session",
        "read_output",
        "terminate_session",
        "list_sessions",
        "convert_media",
    ];
    for tool_name in expected_tools {
        assert!(
            registry.has(tool_name),
            "Tool '{}' should be registered",
            tool_name
        );
    }
    assert_eq!(registry.len(), expected_tools.len());
}

#[tokio::test]
async fn test_tool_definitions_have_schemas() {
    let manager = Arc::new(ProcessManager::new(ProcessConfig::default()));
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry, manager);

    for def in registry.list_enabled() {
        assert!(!def.description.is_empty(), "Tool '{}' should have description", def.name);
        assert_eq!(def.parameters["type"], "object", "Tool '{}' schema", def.name);
    }
}

// ============================================================================
// Runner Integration Tests
// ============================================================================

#[tokio::test]
async fn test_invalid_arguments_become_failures() {
    let (runner, _manager) = runner_with(unix_config(), MediaConfig::default());

    let exec = runner
        .execute("read_output", json!({"id": "abc"}))
        .await
        .unwrap();
    assert!(!exec.result.success);
    assert!(exec.result.text().contains("Invalid arguments"));

    let exec = runner.execute("start_session", json!([])).await.unwrap();
    assert!(!exec.result.success);
}

#[tokio::test]
async fn test_unknown_session_messages() {
    let (runner, _manager) = runner_with(unix_config(), MediaConfig::default());

    let exec = runner.execute("read_output", json!({"id": 4242424})).await.unwrap();
    assert_eq!(exec.result.text(), "No session found for PID 4242424");

    let exec = runner
        .execute("terminate_session", json!({"id": 4242424}))
        .await
        .unwrap();
    assert_eq!(exec.result.text(), "No active session found for PID 4242424");

    let exec = runner.execute("list_sessions", json!({})).await.unwrap();
    assert_eq!(exec.result.text(), "No active sessions");
}

#[tokio::test]
async fn test_unknown_tool_is_error() {
    let (runner, _manager) = runner_with(unix_config(), MediaConfig::default());
    let err = runner.execute("exec", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Session Lifecycle Integration Tests
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_session_lifecycle_through_tools() {
    let (runner, manager) = runner_with(unix_config(), MediaConfig::default());

    let exec = runner
        .execute("start_session", json!({"command": "echo ready; sleep 10"}))
        .await
        .unwrap();
    assert!(exec.result.success);
    let id = exec.result.output["id"].as_u64().unwrap();
    let text = exec.result.text();
    assert!(text.starts_with(&format!("Process started with PID {}", id)));
    assert!(text.contains("ready"));
    assert!(text.contains("Command is still running"));

    // The initial snapshot is not consumed.
    let exec = runner.execute("read_output", json!({"id": id})).await.unwrap();
    assert!(exec.result.text().contains("ready"));
    let exec = runner.execute("read_output", json!({"id": id})).await.unwrap();
    assert_eq!(exec.result.text(), "No new output");

    let exec = runner.execute("list_sessions", json!({})).await.unwrap();
    let listing = exec.result.text();
    assert!(listing.contains(&format!("PID: {}, Running: yes", id)));

    let exec = runner
        .execute("terminate_session", json!({"id": id}))
        .await
        .unwrap();
    assert_eq!(exec.result.text(), format!("Successfully terminated session {}", id));
    assert!(manager.list_sessions().await.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_finished_session_is_reaped_after_read() {
    let (runner, manager) = runner_with(unix_config(), MediaConfig::default());

    let exec = runner
        .execute("start_session", json!({"command": "echo done"}))
        .await
        .unwrap();
    let id = exec.result.output["id"].as_u64().unwrap() as u32;

    for _ in 0..100 {
        let Some(session) = manager.store().get(id) else {
            break;
        };
        if !session.is_running().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let ReadOutcome::Output(text) = manager.read_output(id).await else {
        panic!("expected final output");
    };
    assert!(text.contains("done"));
    assert!(text.contains("[process exited with code 0]"));
    assert_eq!(manager.read_output(id).await, ReadOutcome::NotFound);
}

#[cfg(unix)]
#[tokio::test]
async fn test_chained_command_is_not_inspected() {
    // Only the leading token is checked; chaining is a known gap.
    let (runner, manager) = runner_with(unix_config(), MediaConfig::default());

    let exec = runner
        .execute("start_session", json!({"command": "echo a; printf chained"}))
        .await
        .unwrap();
    assert!(exec.result.success);
    assert!(exec.result.text().contains("chained"));
    manager.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_convert_media_runs_as_session() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    std::fs::write(&input, b"RIFF").unwrap();
    let output = dir.path().join("out.mp3");

    let (runner, manager) = runner_with(
        unix_config(),
        MediaConfig {
            ffmpeg_path: "echo".to_string(),
            ..Default::default()
        },
    );

    let exec = runner
        .execute(
            "convert_media",
            json!({
                "input": input.to_str().unwrap(),
                "output": output.to_str().unwrap(),
                "overwrite": true,
                "timeoutMs": 5000
            }),
        )
        .await
        .unwrap();
    assert!(exec.result.success, "{}", exec.result.text());
    assert!(exec.result.output["command"]
        .as_str()
        .unwrap()
        .starts_with("echo -hide_banner -y -i "));
    assert!(exec.result.text().contains("out.mp3"));
    manager.shutdown().await;
}
