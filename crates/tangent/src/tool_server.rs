//! Bundled stdio tool server.
//!
//! Serves the built-in tool registry over the tool protocol: JSON-RPC 2.0
//! with Content-Length framing on stdin/stdout. Spawned as a child process
//! when no external server is configured, which gives built-in and external
//! tools one uniform dispatch path. Logs go to stderr; stdout is the wire.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Stdin, Write};
use std::sync::Arc;

use anyhow::Result;
use serde_json::{Value, json};
use tangent_agent::{Tool, ToolContext, allow_private_from_env};
use tangent_agent::tools::builtin_tools;
use tangent_mcp::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcResponse, PROTOCOL_VERSION, ToolContent,
    ToolInfo,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let ctx = ToolContext::default().with_private_network(allow_private_from_env());
    let tools: HashMap<String, Arc<dyn Tool>> = builtin_tools()
        .into_iter()
        .map(|t| (t.name().to_string(), t))
        .collect();

    let mut reader = BufReader::new(std::io::stdin());
    let stdout = std::io::stdout();

    tracing::debug!(tool_count = tools.len(), "tool server ready");

    while let Some(message) = read_frame(&mut reader)? {
        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            // Notifications (initialized and friends) need no reply.
            continue;
        };
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let params = message.get("params").cloned();

        let response = match method {
            "initialize" => ok_response(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "tangent-tool-server",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => ok_response(id, json!({})),
            "tools/list" => ok_response(id, json!({"tools": list_tools(&tools)})),
            "tools/call" => handle_call(&runtime, &tools, &ctx, id, params),
            other => error_response(
                id,
                JsonRpcError::METHOD_NOT_FOUND,
                format!("method '{}' not supported", other),
            ),
        };

        write_frame(&stdout, &response)?;
    }

    Ok(())
}

fn list_tools(tools: &HashMap<String, Arc<dyn Tool>>) -> Vec<ToolInfo> {
    let mut infos: Vec<ToolInfo> = tools
        .values()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: Some(t.description().to_string()),
            input_schema: Some(t.parameters()),
        })
        .collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    infos
}

fn handle_call(
    runtime: &tokio::runtime::Runtime,
    tools: &HashMap<String, Arc<dyn Tool>>,
    ctx: &ToolContext,
    id: u64,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: CallToolParams = match params.map(serde_json::from_value).transpose() {
        Ok(Some(p)) => p,
        Ok(None) => {
            return error_response(id, JsonRpcError::INVALID_PARAMS, "missing params");
        }
        Err(e) => {
            return error_response(id, JsonRpcError::INVALID_PARAMS, format!("bad params: {e}"));
        }
    };

    let Some(tool) = tools.get(&params.name) else {
        return error_response(
            id,
            JsonRpcError::INVALID_PARAMS,
            format!("unknown tool '{}'", params.name),
        );
    };

    let arguments = params.arguments.unwrap_or_else(|| json!({}));
    tracing::debug!(tool = %params.name, "tool call");

    let result = match runtime.block_on(tool.execute(arguments, ctx)) {
        Ok(result) => result,
        Err(e) => {
            return call_result(id, e.to_string(), true);
        }
    };
    let is_error = result.is_error();
    call_result(id, result.to_model_content(), is_error)
}

fn call_result(id: u64, text: String, is_error: bool) -> JsonRpcResponse {
    let result = CallToolResult {
        content: vec![ToolContent::Text { text }],
        is_error: Some(is_error),
    };
    ok_response(id, serde_json::to_value(result).unwrap_or(Value::Null))
}

fn ok_response(id: u64, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

fn error_response(id: u64, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
            data: None,
        }),
    }
}

/// Read one Content-Length framed message. `Ok(None)` on clean EOF.
fn read_frame(reader: &mut BufReader<Stdin>) -> Result<Option<Value>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(len) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(len.trim().parse()?);
        }
    }

    let content_length =
        content_length.ok_or_else(|| anyhow::anyhow!("missing Content-Length header"))?;
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(Some(serde_json::from_slice(&body)?))
}

fn write_frame(stdout: &std::io::Stdout, response: &JsonRpcResponse) -> Result<()> {
    let body = serde_json::to_string(response)?;
    let mut out = stdout.lock();
    write!(out, "Content-Length: {}\r\n\r\n{}", body.len(), body)?;
    out.flush()?;
    Ok(())
}
