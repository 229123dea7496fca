//! Mock tool server for integration testing.
//!
//! Speaks the framed JSON-RPC protocol on stdio and answers initialize,
//! tools/list, and tools/call.
//!
//! Usage:
//!   mock-tool-server [--crash-on TOOL] [--mute] [--bad-id]
//!
//! Options:
//!   --crash-on TOOL   Exit with code 1 when TOOL is called
//!   --mute            Never answer tools/call (for timeout tests)
//!   --bad-id          Answer tools/call with a wrong response id

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};

use serde_json::{Value, json};

struct ServerOptions {
    crash_on: Option<String>,
    mute_calls: bool,
    bad_id: bool,
}

impl ServerOptions {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self {
            crash_on: None,
            mute_calls: false,
            bad_id: false,
        };
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--crash-on" if i + 1 < args.len() => {
                    options.crash_on = Some(args[i + 1].clone());
                    i += 2;
                }
                "--mute" => {
                    options.mute_calls = true;
                    i += 1;
                }
                "--bad-id" => {
                    options.bad_id = true;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        options
    }
}

fn send(msg: &Value) {
    let raw = serde_json::to_string(msg).unwrap();
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "Content-Length: {}\r\n\r\n{}", raw.len(), raw).unwrap();
    stdout.flush().unwrap();
}

fn read_message(reader: &mut impl BufRead) -> Option<Value> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(len) = trimmed.strip_prefix("Content-Length:") {
            content_length = len.trim().parse().ok();
        }
    }
    let mut body = vec![0u8; content_length?];
    reader.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}

fn tool_catalog() -> Value {
    json!([
        {
            "name": "echo",
            "description": "Echo back the input",
            "inputSchema": {
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }
        },
        {
            "name": "add",
            "description": "Add two numbers",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "a": { "type": "number" },
                    "b": { "type": "number" }
                },
                "required": ["a", "b"]
            }
        },
        {
            "name": "crash",
            "description": "Exits the server (for testing)",
            "inputSchema": { "type": "object", "properties": {} }
        }
    ])
}

fn handle_call(options: &ServerOptions, params: &Value) -> Value {
    let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    if let Some(crash_tool) = &options.crash_on
        && crash_tool == tool_name
    {
        std::process::exit(1);
    }

    match tool_name {
        "echo" => {
            let message = args.get("message").and_then(|v| v.as_str()).unwrap_or("");
            json!({ "content": [{ "type": "text", "text": message }] })
        }
        "add" => {
            let a = args.get("a").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let b = args.get("b").and_then(|v| v.as_f64()).unwrap_or(0.0);
            json!({ "content": [{ "type": "text", "text": format!("{}", a + b) }] })
        }
        "crash" => std::process::exit(1),
        other => json!({
            "content": [{ "type": "text", "text": format!("Unknown tool: {other}") }],
            "isError": true
        }),
    }
}

fn main() {
    let options = ServerOptions::from_args();
    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    while let Some(msg) = read_message(&mut reader) {
        let method = msg.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let id = msg.get("id").cloned();

        // Notifications carry no id and get no reply.
        let Some(id) = id else { continue };

        match method {
            "initialize" => send(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "mock-tool-server", "version": "1.0.0" }
                }
            })),
            "tools/list" => send(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "tools": tool_catalog() }
            })),
            "tools/call" => {
                if options.mute_calls {
                    continue;
                }
                let params = msg.get("params").cloned().unwrap_or(json!({}));
                let result = handle_call(&options, &params);
                let reply_id = if options.bad_id { json!(9999) } else { id };
                send(&json!({
                    "jsonrpc": "2.0",
                    "id": reply_id,
                    "result": result
                }));
            }
            other => send(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {other}") }
            })),
        }
    }
}
