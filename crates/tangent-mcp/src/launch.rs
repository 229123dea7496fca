//! Tool-server launch configuration.
//!
//! Resolves which server command a session should spawn. When no external
//! command is configured, the bundled `tangent-tool-server` binary next to
//! the current executable is used, so local and external tools share one
//! code path.

use std::path::PathBuf;
use std::time::Duration;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Environment variable naming the external server command line.
pub const SERVER_COMMAND_ENV: &str = "MCP_SERVER_COMMAND";

/// Environment variable overriding the per-call timeout, in seconds.
pub const TIMEOUT_ENV: &str = "MCP_TIMEOUT_SECS";

/// File name of the bundled tool server.
pub const BUNDLED_SERVER_BIN: &str = "tangent-tool-server";

/// How to start a tool server and how long to wait on its replies.
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    /// Name used in logs, tool ids, and name prefixes.
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl ServerLaunch {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a launch from the environment.
    ///
    /// `MCP_SERVER_COMMAND` takes priority; otherwise the bundled server is
    /// used if it exists next to the current executable. Returns `None` when
    /// neither resolves, meaning the run proceeds with built-in tools only.
    pub fn from_env() -> Option<Self> {
        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        if let Ok(raw) = std::env::var(SERVER_COMMAND_ENV) {
            let parts = split_command(&raw);
            if let Some((command, args)) = parts.split_first() {
                return Some(
                    Self::new("mcp", command)
                        .with_args(args.to_vec())
                        .with_timeout(timeout),
                );
            }
        }

        let bundled = bundled_server_path()?;
        Some(
            Self::new("local-tools", bundled.to_string_lossy().to_string()).with_timeout(timeout),
        )
    }
}

/// Locate the bundled tool server next to the current executable.
fn bundled_server_path() -> Option<PathBuf> {
    let mut path = std::env::current_exe().ok()?;
    path.set_file_name(BUNDLED_SERVER_BIN);
    path.exists().then_some(path)
}

/// Split a command line into words, honoring single and double quotes.
pub fn split_command(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in raw.trim().chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
