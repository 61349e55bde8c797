//! Line-based JSON-RPC loop dispatching MCP methods to the tool runner
//!
//! Supported methods:
//! - `initialize` → server capabilities
//! - `tools/list` → tool definitions
//! - `tools/call` → execute a tool
//! - `ping` → empty result
//! - `prompts/list`, `resources/list` → empty

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, McpToolDef, ServerCapabilities, ToolCapability,
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use ffpilot_tools::{ProcessManager, ToolRunner};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

/// MCP bridge between a JSON-RPC stream and the tool runner.
pub struct McpBridge {
    runner: ToolRunner,
    manager: Arc<ProcessManager>,
}

impl McpBridge {
    pub fn new(runner: ToolRunner, manager: Arc<ProcessManager>) -> Self {
        Self { runner, manager }
    }

    /// Run over the process's stdin/stdout.
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let reader = tokio::io::BufReader::new(tokio::io::stdin());
        self.run(reader, tokio::io::stdout()).await
    }

    /// Serve requests until `reader` reaches EOF, then kill remaining sessions.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server started (JSON-RPC 2.0 over stdio)");

        let mut line = String::new();
        let served = loop {
            line.clear();
            let n = match reader.read_line(&mut line).await {
                Ok(n) => n,
                Err(e) => break Err(anyhow::Error::from(e)),
            };
            if n == 0 {
                break Ok(()); // EOF
            }

            let Some(response) = self.handle_line(&line).await else {
                continue;
            };
            if let Err(e) = write_response(&mut writer, &response).await {
                break Err(e);
            }
        };

        let terminated = self.manager.shutdown().await;
        info!(terminated, "MCP server shutting down");
        served
    }

    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) if request.is_notification() => {
                debug!(method = %request.method, "MCP notification");
                None
            }
            Ok(request) => {
                debug!(method = %request.method, "MCP request");
                Some(self.handle_request(request).await)
            }
            Err(e) => Some(JsonRpcResponse::err(
                None,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            )),
        }
    }

    async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id),
            "ping" => JsonRpcResponse::ok(req.id, json!({})),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            "prompts/list" => JsonRpcResponse::ok(req.id, json!({ "prompts": [] })),
            "resources/list" => JsonRpcResponse::ok(req.id, json!({ "resources": [] })),
            _ => JsonRpcResponse::err(
                req.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", req.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": ServerCapabilities {
                    tools: ToolCapability { list_changed: false },
                },
                "serverInfo": {
                    "name": "ffpilot",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<McpToolDef> = self
            .runner
            .registry()
            .list_enabled()
            .into_iter()
            .map(|def| McpToolDef {
                name: def.name.clone(),
                description: Some(def.description.clone()),
                input_schema: def.parameters.clone(),
            })
            .collect();

        JsonRpcResponse::ok(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::err(id, INVALID_PARAMS, "Missing 'name' parameter");
        };

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        match self.runner.execute(name, arguments).await {
            Ok(exec) => {
                let result = exec.result;
                let mut body = json!({
                    "content": [{ "type": "text", "text": result.text() }],
                    "isError": !result.success,
                });
                if result.success && result.output.is_object() {
                    body["structuredContent"] = result.output;
                }
                JsonRpcResponse::ok(id, body)
            }
            Err(e) => {
                error!(tool = %name, error = %e, "MCP tool call failed");
                JsonRpcResponse::ok(
                    id,
                    json!({
                        "content": [{
                            "type": "text",
                            "text": format!("Tool execution error: {}", e)
                        }],
                        "isError": true,
                    }),
                )
            }
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffpilot_tools::{register_builtins, ProcessConfig, ToolRegistry};

    fn bridge_with(config: ProcessConfig) -> (McpBridge, Arc<ProcessManager>) {
        let manager = Arc::new(ProcessManager::new(config));
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, Arc::clone(&manager));
        let runner = ToolRunner::with_defaults(Arc::new(registry));
        (McpBridge::new(runner, Arc::clone(&manager)), manager)
    }

    fn bridge() -> McpBridge {
        bridge_with(ProcessConfig::default()).0
    }

    async fn exchange(bridge: &McpBridge, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        bridge.run(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let responses = exchange(
            &bridge(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        )
        .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "ffpilot");
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n"
        );
        let responses = exchange(&bridge(), input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 2);
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let input = concat!(
            "not json\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"nonexistent"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{}}"#,
            "\n"
        );
        let responses = exchange(&bridge(), input).await;
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[1]["error"]["code"], -32601);
        assert_eq!(responses[2]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let responses = exchange(
            &bridge(),
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#,
        )
        .await;
        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            [
                "convert_media",
                "list_sessions",
                "read_output",
                "start_session",
                "terminate_session"
            ]
        );
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_tool_errors_are_results() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"start_session","arguments":{"command":"rm -rf /"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"no_such_tool"}}"#,
            "\n"
        );
        let responses = exchange(&bridge(), input).await;
        assert_eq!(responses[0]["result"]["isError"], true);
        let text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("not allowed"));
        assert_eq!(responses[1]["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_list_sessions_text() {
        let responses = exchange(
            &bridge(),
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"list_sessions","arguments":{}}}"#,
        )
        .await;
        let result = &responses[0]["result"];
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], "No active sessions");
        assert_eq!(result["structuredContent"]["count"], 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_eof_terminates_live_sessions() {
        let (bridge, manager) = bridge_with(ProcessConfig {
            allowed_commands: vec!["sleep".to_string()],
            default_shell: Some("/bin/sh".to_string()),
            settle_window_ms: 100,
            ..Default::default()
        });
        let responses = exchange(
            &bridge,
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"start_session","arguments":{"command":"sleep 30"}}}"#,
        )
        .await;
        assert_eq!(responses[0]["result"]["isError"], false);
        assert!(responses[0]["result"]["structuredContent"]["id"].as_u64().is_some());
        assert!(manager.store().is_empty());
    }
}
