//! Integration tests for the tool-protocol client.
//!
//! These tests drive the full protocol flow against the mock tool server.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tangent_mcp::{McpError, McpSession, ServerLaunch};

/// Path to the mock tool server binary.
fn mock_server_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop(); // crates
    path.pop(); // workspace root
    path.push("target");
    path.push(if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    });
    path.push("mock-tool-server");
    path
}

fn mock_server_exists() -> bool {
    mock_server_path().exists()
}

fn session_with_args(args: &[&str]) -> McpSession {
    let launch = ServerLaunch::new("test", mock_server_path().to_string_lossy().to_string())
        .with_args(args.iter().map(|s| s.to_string()).collect())
        .with_timeout(Duration::from_secs(2));
    McpSession::new(launch)
}

fn session() -> McpSession {
    session_with_args(&[])
}

#[test]
fn test_start_and_handshake() {
    if !mock_server_exists() {
        eprintln!(
            "Skipping test: mock-tool-server not built. Run `cargo build --package tangent-mcp` first."
        );
        return;
    }

    let session = session();
    let info = session.start().expect("handshake failed");
    assert_eq!(info.name, "mock-tool-server");
    assert_eq!(info.version, "1.0.0");
    assert_eq!(session.state_name(), "ready");
    assert!(session.is_connected());
}

#[test]
fn test_list_tools() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session();
    let tools = session.list_tools().expect("tools/list failed");
    assert_eq!(tools.len(), 3); // echo, add, crash

    let echo = tools.iter().find(|t| t.name == "echo").expect("echo tool");
    assert_eq!(echo.description.as_deref(), Some("Echo back the input"));
    assert!(echo.input_schema.is_some());
}

#[test]
fn test_call_is_lazy() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    // No explicit start(); the first call performs the handshake.
    let session = session();
    assert_eq!(session.state_name(), "unstarted");

    let result = session
        .call_tool("echo", Some(json!({"message": "Hello, tools!"})))
        .expect("tools/call failed");
    assert!(!result.is_error());
    assert_eq!(result.text(), Some("Hello, tools!".to_string()));
}

#[test]
fn test_call_add_tool() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session();
    let result = session
        .call_tool("add", Some(json!({"a": 5, "b": 7})))
        .expect("tools/call failed");
    assert!(!result.is_error());
    assert_eq!(result.text(), Some("12".to_string()));
}

#[test]
fn test_call_unknown_tool() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session();
    let result = session
        .call_tool("nonexistent", Some(json!({})))
        .expect("tools/call failed");
    assert!(result.is_error());
    assert!(result.text().unwrap_or_default().contains("Unknown tool"));
}

#[test]
fn test_shutdown_is_terminal() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session();
    session.start().expect("handshake failed");
    session.shutdown();
    assert_eq!(session.state_name(), "closed");
    assert!(!session.is_connected());
    assert!(session.list_tools().is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure and recovery
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_crash_fails_call_and_session_recovers() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session_with_args(&["--crash-on", "crash"]);
    session.start().expect("handshake failed");

    // The server exits mid-call; the call fails but the client survives.
    let result = session.call_tool("crash", Some(json!({})));
    assert!(result.is_err(), "expected error after server crash");
    assert_eq!(session.state_name(), "failed");

    // Lazy restart: the next call respawns the server and succeeds.
    let result = session
        .call_tool("echo", Some(json!({"message": "back"})))
        .expect("restarted call failed");
    assert_eq!(result.text(), Some("back".to_string()));
    assert_eq!(session.state_name(), "ready");
}

#[test]
fn test_call_timeout_marks_session_failed() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session_with_args(&["--mute"]);
    session.start().expect("handshake failed");

    let result = session.call_tool("echo", Some(json!({"message": "hi"})));
    assert!(matches!(result, Err(McpError::Timeout(_))));
    assert_eq!(session.state_name(), "failed");
}

#[test]
fn test_mismatched_response_id_is_protocol_error() {
    if !mock_server_exists() {
        eprintln!("Skipping test: mock-tool-server not built");
        return;
    }

    let session = session_with_args(&["--bad-id"]);
    session.start().expect("handshake failed");

    let result = session.call_tool("echo", Some(json!({"message": "hi"})));
    assert!(matches!(result, Err(McpError::Protocol(_))));
    assert_eq!(session.state_name(), "failed");
}
