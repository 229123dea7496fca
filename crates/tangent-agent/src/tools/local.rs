//! Local built-in tools: process info, confined filesystem access, and a
//! constrained local HTTP client.
//!
//! Filesystem tools refuse any path that escapes the context's base directory
//! and cap both entry counts and byte totals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use walkdir::WalkDir;

use crate::error::Result;
use crate::netsafety::ensure_public_destination;
use crate::tool::{ParamExt, Tool, ToolCategory, ToolContext, ToolResult};

/// Maximum directory entries reported by the filesystem tools.
pub const MAX_FS_ENTRIES: usize = 200;

/// Maximum bytes of file content accounted by `local_file_sizes`.
pub const MAX_FS_BYTES: u64 = 500_000;

/// Resolve `relative` against the base directory, refusing escapes.
fn confine(base: &Path, relative: &str) -> std::result::Result<PathBuf, String> {
    let base = base
        .canonicalize()
        .map_err(|e| format!("Base directory is not accessible: {}", e))?;
    let joined = if relative.is_empty() || relative == "." {
        base.clone()
    } else {
        base.join(relative)
    };
    let resolved = joined
        .canonicalize()
        .map_err(|e| format!("Path '{}' is not accessible: {}", relative, e))?;
    if !resolved.starts_with(&base) {
        return Err(format!("Path '{}' escapes the working directory", relative));
    }
    Ok(resolved)
}

// ─────────────────────────────────────────────────────────────────────────────
// Whoami
// ─────────────────────────────────────────────────────────────────────────────

pub struct WhoamiTool;

#[async_trait]
impl Tool for WhoamiTool {
    fn name(&self) -> &str {
        "local_whoami"
    }

    fn description(&self) -> &str {
        "Report the effective user and host information of the engine process."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let hostname = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| {
                std::fs::read_to_string("/proc/sys/kernel/hostname")
                    .ok()
                    .map(|s| s.trim().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ToolResult::json(json!({
            "user": user,
            "hostname": hostname,
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pwd
// ─────────────────────────────────────────────────────────────────────────────

pub struct PwdTool;

#[async_trait]
impl Tool for PwdTool {
    fn name(&self) -> &str {
        "local_pwd"
    }

    fn description(&self) -> &str {
        "Report the engine's working directory."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        Ok(ToolResult::json(json!({
            "path": ctx.base_dir.display().to_string()
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ls
// ─────────────────────────────────────────────────────────────────────────────

pub struct LsTool;

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "local_ls"
    }

    fn description(&self) -> &str {
        "List the entries of a directory under the working directory."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the working directory. Defaults to '.'"
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let relative = params.optional_str("path").unwrap_or(".");
        let dir = match confine(&ctx.base_dir, relative) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read directory: {}", e))),
        };

        let mut entries = Vec::new();
        let mut truncated = false;
        for entry in read_dir {
            let Ok(entry) = entry else { continue };
            if entries.len() >= MAX_FS_ENTRIES {
                truncated = true;
                break;
            }
            let file_type = entry.file_type().ok();
            let kind = match file_type {
                Some(t) if t.is_dir() => "dir",
                Some(t) if t.is_symlink() => "symlink",
                _ => "file",
            };
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "kind": kind
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        Ok(ToolResult::json(json!({
            "path": relative,
            "count": entries.len(),
            "truncated": truncated,
            "entries": entries
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Sizes
// ─────────────────────────────────────────────────────────────────────────────

pub struct FileSizesTool;

#[async_trait]
impl Tool for FileSizesTool {
    fn name(&self) -> &str {
        "local_file_sizes"
    }

    fn description(&self) -> &str {
        "Recursively report file sizes under a path inside the working directory."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to measure, relative to the working directory. Defaults to '.'"
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let relative = params.optional_str("path").unwrap_or(".");
        let root = match confine(&ctx.base_dir, relative) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let mut files = Vec::new();
        let mut total_bytes: u64 = 0;
        let mut truncated = false;
        for entry in WalkDir::new(&root).follow_links(false) {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            if files.len() >= MAX_FS_ENTRIES || total_bytes >= MAX_FS_BYTES {
                truncated = true;
                break;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            total_bytes += size;
            let display = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .display()
                .to_string();
            files.push(json!({"path": display, "bytes": size}));
        }

        Ok(ToolResult::json(json!({
            "path": relative,
            "count": files.len(),
            "total_bytes": total_bytes,
            "truncated": truncated,
            "files": files
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local Curl
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum body bytes returned by `local_curl`.
const CURL_MAX_BODY: usize = 100 * 1024;

/// Constrained HTTP client: GET/HEAD only, 10s timeout, body capped.
pub struct LocalCurlTool;

#[async_trait]
impl Tool for LocalCurlTool {
    fn name(&self) -> &str {
        "local_curl"
    }

    fn description(&self) -> &str {
        "Make a constrained HTTP GET or HEAD request to a public URL. Body is size-capped."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to request"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "HEAD"],
                    "default": "GET"
                }
            },
            "required": ["url"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let raw_url = params.required_str("url", "provide the URL to request")?;
        let method = params.optional_str("method").unwrap_or("GET").to_uppercase();
        if method != "GET" && method != "HEAD" {
            return Ok(ToolResult::error(format!(
                "Unsupported method '{}': only GET and HEAD are permitted",
                method
            )));
        }

        let url = match ensure_public_destination(raw_url, ctx.allow_private_network).await {
            Ok(u) => u,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("Tangent/", env!("CARGO_PKG_VERSION")))
            .build()
        {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(format!("Failed to build HTTP client: {}", e))),
        };

        let request = if method == "HEAD" {
            client.head(url.as_str())
        } else {
            client.get(url.as_str())
        };

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Request failed: {}", e))),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if method == "HEAD" {
            return Ok(ToolResult::json(json!({
                "url": raw_url,
                "method": method,
                "status": status,
                "content_type": content_type
            })));
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read response: {}", e))),
        };
        let body = String::from_utf8_lossy(&bytes);
        let mut cut = body.len().min(CURL_MAX_BODY);
        while cut > 0 && !body.is_char_boundary(cut) {
            cut -= 1;
        }

        Ok(ToolResult::json(json!({
            "url": raw_url,
            "method": method,
            "status": status,
            "content_type": content_type,
            "truncated": cut < body.len(),
            "body": &body[..cut]
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confine_rejects_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let err = confine(tmp.path(), "../..").unwrap_err();
        assert!(err.contains("escapes"));
    }

    #[test]
    fn test_confine_allows_subdir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let resolved = confine(tmp.path(), "sub").unwrap();
        assert!(resolved.ends_with("sub"));
    }

    #[tokio::test]
    async fn test_ls_lists_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let tool = LsTool;
        let ctx = ToolContext::new(tmp.path());
        let result = tool.execute(json!({}), &ctx).await.unwrap();
        match result {
            ToolResult::Json { content } => {
                assert_eq!(content["count"], 3);
                assert_eq!(content["entries"][0]["name"], "a.txt");
                assert_eq!(content["entries"][2]["kind"], "dir");
                assert_eq!(content["truncated"], false);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ls_rejects_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = LsTool;
        let ctx = ToolContext::new(tmp.path());
        let result = tool.execute(json!({"path": "../"}), &ctx).await.unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_file_sizes_totals() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("one.txt"), "12345").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/two.txt"), "123").unwrap();

        let tool = FileSizesTool;
        let ctx = ToolContext::new(tmp.path());
        let result = tool.execute(json!({}), &ctx).await.unwrap();
        match result {
            ToolResult::Json { content } => {
                assert_eq!(content["count"], 2);
                assert_eq!(content["total_bytes"], 8);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pwd_reports_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = PwdTool;
        let ctx = ToolContext::new(tmp.path());
        let result = tool.execute(json!({}), &ctx).await.unwrap();
        match result {
            ToolResult::Json { content } => {
                assert_eq!(content["path"], tmp.path().display().to_string());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_curl_rejects_post() {
        let tool = LocalCurlTool;
        let ctx = ToolContext::default();
        let result = tool
            .execute(json!({"url": "https://example.com", "method": "POST"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_model_content().contains("only GET and HEAD"));
    }

    #[tokio::test]
    async fn test_local_curl_rejects_private_destination() {
        let tool = LocalCurlTool;
        let ctx = ToolContext::default();
        let result = tool
            .execute(json!({"url": "http://192.168.0.1/"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_model_content().contains("private"));
    }

    #[tokio::test]
    async fn test_whoami_reports_os() {
        let tool = WhoamiTool;
        let ctx = ToolContext::default();
        let result = tool.execute(json!({}), &ctx).await.unwrap();
        match result {
            ToolResult::Json { content } => {
                assert_eq!(content["os"], std::env::consts::OS);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
