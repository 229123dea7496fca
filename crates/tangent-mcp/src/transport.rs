//! Framed stdio transport to a spawned tool-server process.
//!
//! Messages are JSON payloads framed with `Content-Length: N\r\n\r\n`.
//! A dedicated reader thread decodes frames off the child's stdout and hands
//! them over an mpsc channel, which lets the caller wait with a deadline;
//! a blocking read on stdout could not honor the per-call timeout.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Frames decoded by the reader thread.
type Frame = std::result::Result<Value, String>;

/// Stdio transport to one tool-server child process.
pub struct StdioTransport {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    incoming: Receiver<Frame>,
    reader: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Spawn the server process and start the frame reader.
    pub fn spawn(command: &str, args: &[String], env: &[(String, String)]) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::spawn_failed(format!("failed to spawn '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdout"))?;

        let (tx, rx) = sync_channel(16);
        let reader = std::thread::Builder::new()
            .name("mcp-reader".to_string())
            .spawn(move || read_loop(BufReader::new(stdout), tx))
            .map_err(|e| McpError::spawn_failed(format!("failed to start reader: {e}")))?;

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            incoming: rx,
            reader: Some(reader),
        })
    }

    /// Send a request and wait for its response within `timeout`.
    ///
    /// Server-initiated notifications received while waiting are ignored.
    /// A response carrying a different id is a protocol error: with a single
    /// in-flight request there is nothing it could belong to.
    pub fn send_request(
        &mut self,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        self.write_frame(&serde_json::to_value(request)?)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(McpError::Timeout(timeout));
            }

            let frame = match self.incoming.recv_timeout(remaining) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => return Err(McpError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(McpError::ProcessExited),
            };

            let value = frame.map_err(McpError::Transport)?;

            if value.get("id").is_none() {
                tracing::trace!("ignoring server notification");
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(value)?;
            if response.id != request.id {
                return Err(McpError::protocol(format!(
                    "response id {} does not match request id {}",
                    response.id, request.id
                )));
            }
            return Ok(response);
        }
    }

    /// Send a notification (no response expected).
    pub fn send_notification(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        self.write_frame(&serde_json::to_value(notification)?)
    }

    fn write_frame(&mut self, message: &Value) -> Result<()> {
        let json = serde_json::to_string(message)?;
        write!(self.stdin, "Content-Length: {}\r\n\r\n{}", json.len(), json)?;
        self.stdin.flush()?;
        tracing::trace!(content_length = json.len(), "sent framed message");
        Ok(())
    }

    /// Check if the child process is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the child process and reap it.
    pub fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decode frames until EOF or a read error, forwarding each to the channel.
fn read_loop(mut stdout: BufReader<ChildStdout>, tx: SyncSender<Frame>) {
    loop {
        match read_frame(&mut stdout) {
            Ok(Some(value)) => {
                if tx.send(Ok(value)).is_err() {
                    return;
                }
            }
            Ok(None) => return, // EOF
            Err(msg) => {
                let _ = tx.send(Err(msg));
                return;
            }
        }
    }
}

/// Read one Content-Length framed JSON message. `Ok(None)` on clean EOF.
fn read_frame(stdout: &mut BufReader<ChildStdout>) -> std::result::Result<Option<Value>, String> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = stdout
            .read_line(&mut line)
            .map_err(|e| format!("read error: {e}"))?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                len_str
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid Content-Length: {e}"))?,
            );
        }
        // Unknown headers are skipped.
    }

    let content_length = content_length.ok_or("missing Content-Length header")?;

    let mut body = vec![0u8; content_length];
    stdout
        .read_exact(&mut body)
        .map_err(|e| format!("read error: {e}"))?;

    let json_str =
        String::from_utf8(body).map_err(|e| format!("invalid UTF-8 in message: {e}"))?;
    tracing::trace!(content_length, "received framed message");

    serde_json::from_str(&json_str)
        .map(Some)
        .map_err(|e| format!("invalid JSON from server: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_nonexistent_command() {
        let result = StdioTransport::spawn("nonexistent-tool-server-12345", &[], &[]);
        match result {
            Ok(_) => panic!("expected spawn to fail"),
            Err(err) => assert!(matches!(err, McpError::SpawnFailed(_))),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_and_shutdown() {
        // 'cat' never writes a frame; this only exercises spawn and teardown.
        let mut transport = StdioTransport::spawn("cat", &[], &[]).unwrap();
        assert!(transport.is_alive());
        transport.shutdown();
        assert!(!transport.is_alive());
    }

    #[test]
    #[cfg(unix)]
    fn test_request_times_out_on_silent_server() {
        // 'sleep' never writes to stdout, so the deadline must fire.
        let mut transport = StdioTransport::spawn("sleep", &["30".to_string()], &[]).unwrap();
        let request = JsonRpcRequest::new(1, "initialize", None);
        let result = transport.send_request(&request, Duration::from_millis(100));
        assert!(matches!(result, Err(McpError::Timeout(_))));
    }
}
