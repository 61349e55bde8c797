//! convert_media - build an ffmpeg command line and run it as a session
//!
//! The generated command still goes through the session allow-list, so the
//! configured ffmpeg program must be permitted there.

use super::parse_input;
use super::start_session::describe_start;
use crate::error::{Error, Result};
use crate::process::ProcessManager;
use crate::registry::{RiskLevel, Tool, ToolCategory, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_MAX_INPUT_BYTES: u64 = 4 * 1024 * 1024 * 1024; // 4 GiB

/// Settings for the conversion tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Program placed at the start of generated commands
    pub ffmpeg_path: String,
    /// Largest accepted input file
    pub max_input_bytes: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConvertMediaInput {
    input: String,
    output: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    overwrite: bool,
    #[serde(default, alias = "timeoutMs")]
    timeout_ms: Option<u64>,
}

fn reject_traversal(path: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(path);
    if path_buf.components().any(|c| matches!(c, Component::ParentDir)) {
        warn!(path = %path, "Path traversal attempt detected");
        return Err(Error::PermissionDenied(
            "Path traversal (..) is not allowed".to_string(),
        ));
    }
    Ok(path_buf)
}

/// Input must be an existing regular file no larger than `max_bytes`.
async fn validate_input_file(path: &str, max_bytes: u64) -> Result<PathBuf> {
    let path_buf = reject_traversal(path)?;
    let metadata = tokio::fs::metadata(&path_buf)
        .await
        .map_err(|e| Error::InvalidInput(format!("Cannot read input '{}': {}", path, e)))?;
    if !metadata.is_file() {
        return Err(Error::InvalidInput(format!(
            "Input '{}' is not a regular file",
            path
        )));
    }
    if metadata.len() > max_bytes {
        return Err(Error::InvalidInput(format!(
            "Input '{}' is {} bytes, larger than the {} byte limit",
            path,
            metadata.len(),
            max_bytes
        )));
    }
    Ok(path_buf)
}

/// Output's directory must already exist.
async fn validate_output_file(path: &str, input: &Path) -> Result<PathBuf> {
    let path_buf = reject_traversal(path)?;
    if path_buf.as_os_str().is_empty() {
        return Err(Error::InvalidInput("Output path must not be empty".to_string()));
    }
    if path_buf == input {
        return Err(Error::InvalidInput(
            "Output must differ from input".to_string(),
        ));
    }
    if let Some(parent) = path_buf.parent() {
        let parent_is_dir = parent.as_os_str().is_empty()
            || tokio::fs::metadata(parent)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
        if !parent_is_dir {
            return Err(Error::InvalidInput(format!(
                "Output directory '{}' does not exist",
                parent.display()
            )));
        }
    }
    Ok(path_buf)
}

#[cfg(not(windows))]
fn join_command(tokens: &[String]) -> Result<String> {
    shlex::try_join(tokens.iter().map(String::as_str))
        .map_err(|e| Error::InvalidInput(format!("Cannot quote command: {}", e)))
}

#[cfg(windows)]
fn join_command(tokens: &[String]) -> Result<String> {
    const SPECIAL: &[char] = &[' ', '\t', '"', '&', '|', '<', '>', '^', '%'];
    Ok(tokens
        .iter()
        .map(|t| {
            if t.is_empty() || t.contains(SPECIAL) {
                format!("\"{}\"", t.replace('"', "\"\""))
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" "))
}

/// `ffmpeg -hide_banner -y|-n -i <input> <args...> <output>`, shell-quoted.
fn build_command(
    ffmpeg: &str,
    input: &Path,
    output: &Path,
    args: &[String],
    overwrite: bool,
) -> Result<String> {
    let mut tokens = vec![
        ffmpeg.to_string(),
        "-hide_banner".to_string(),
        if overwrite { "-y" } else { "-n" }.to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
    ];
    tokens.extend(args.iter().cloned());
    tokens.push(output.to_string_lossy().into_owned());
    join_command(&tokens)
}

/// Tool that converts a media file with ffmpeg in a background session
pub struct ConvertMediaTool {
    definition: ToolDefinition,
    manager: Arc<ProcessManager>,
    config: MediaConfig,
}

impl ConvertMediaTool {
    /// Create the tool over a shared manager
    #[must_use]
    pub fn new(manager: Arc<ProcessManager>, config: MediaConfig) -> Self {
        let definition = ToolDefinition::new(
            "convert_media",
            "Convert a media file with ffmpeg in the background. Returns a session PID; \
             poll progress with read_output. Extra ffmpeg options go in 'args', e.g. \
             [\"-c:v\", \"libx264\", \"-crf\", \"23\"].",
        )
        .with_category(ToolCategory::Media)
        .with_risk_level(RiskLevel::High)
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "Path of the source file"
                },
                "output": {
                    "type": "string",
                    "description": "Path of the file to create; the extension picks the container"
                },
                "args": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Extra ffmpeg arguments placed between input and output"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace the output if it exists",
                    "default": false
                },
                "timeout_ms": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Kill the conversion after this many milliseconds (0 disables)"
                }
            },
            "required": ["input", "output"]
        }));

        Self {
            definition,
            manager,
            config,
        }
    }
}

#[async_trait]
impl Tool for ConvertMediaTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let params: ConvertMediaInput = parse_input(input)?;
        let start = std::time::Instant::now();

        let input_path = validate_input_file(&params.input, self.config.max_input_bytes).await?;
        let output_path = validate_output_file(&params.output, &input_path).await?;
        let command = build_command(
            &self.config.ffmpeg_path,
            &input_path,
            &output_path,
            &params.args,
            params.overwrite,
        )?;
        debug!(command = %command, "Built conversion command");

        let started = self
            .manager
            .start_session(&command, params.timeout_ms, None)
            .await?;

        Ok(ToolResult::success(
            json!({
                "id": started.id,
                "running": started.running,
                "command": command,
                "text": describe_start(&started),
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}
