//! Ollama local backend.
//!
//! Talks to a local Ollama daemon over `/api/chat`. Ollama models here are
//! treated as prompt-based for tool use: the caller renders the tool catalog
//! into the system prompt and parses the JSON decision out of the reply.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::time::Duration;

use crate::backend::{ProviderBackend, with_retry};
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, Role, StopReason, Usage};

/// Default Ollama daemon address.
const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434";

/// Local inference can be slow; allow generous timeouts.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama daemon.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl OllamaConfig {
    /// Create config, honoring `OLLAMA_BASE_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.base_url = url;
        }
        config
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Ollama local API backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a backend from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }

    async fn handle_response(model: &str, response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                LlmError::Network(format!("Server error: HTTP {}: {}", status, body))
            } else {
                LlmError::Backend(format!("HTTP {}: {}", status, body))
            });
        }

        let body = response.text().await?;
        let parsed: OllamaChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::protocol(format!("unmappable response payload: {}", e)))?;

        Ok(CompletionResponse {
            id: format!("ollama-{}", epoch_nanos()),
            content: vec![ContentBlock::text(parsed.message.content)],
            model: model.to_string(),
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage::new(
                parsed.prompt_eval_count.unwrap_or(0),
                parsed.eval_count.unwrap_or(0),
            ),
        })
    }
}

/// Ollama responses carry no id; synthesize one from the clock.
fn epoch_nanos() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[async_trait]
impl ProviderBackend for OllamaBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let chat_request = to_ollama_request(&request);

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "ollama",
            || async {
                let response = self
                    .client
                    .post(self.chat_url())
                    .header(header::CONTENT_TYPE, "application/json")
                    .json(&chat_request)
                    .send()
                    .await?;

                Self::handle_response(&request.model, response).await
            },
        )
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

fn to_ollama_request(request: &CompletionRequest) -> OllamaChatRequest {
    let mut messages = Vec::new();

    if let Some(ref system) = request.system {
        messages.push(OllamaMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }

    for m in &request.messages {
        messages.push(OllamaMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: flatten_content(m),
        });
    }

    OllamaChatRequest {
        model: request.model.clone(),
        messages,
        stream: false,
        options: OllamaOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        },
    }
}

/// Ollama has no structured tool blocks; fold tool results into plain text.
fn flatten_content(message: &crate::types::Message) -> String {
    message
        .content
        .blocks()
        .iter()
        .map(|b| match b {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::ToolUse { name, input, .. } => {
                format!("[tool call: {} {}]", name, input)
            }
            ContentBlock::ToolResult {
                content, is_error, ..
            } => {
                let text = content.clone().unwrap_or_default();
                if *is_error {
                    format!("[tool error] {}", text)
                } else {
                    format!("[tool result] {}", text)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, serde::Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, serde::Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    num_predict: u32,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_prompt_based_tools() {
        let backend = OllamaBackend::new(OllamaConfig::default()).unwrap();
        assert_eq!(backend.name(), "ollama");
        assert!(!backend.supports_native_tools());
    }

    #[test]
    fn test_to_ollama_request_flattens_blocks() {
        let request = CompletionRequest::new(
            "llama3.1",
            vec![
                Message::user("What is 2+2?"),
                Message::assistant_blocks(vec![ContentBlock::tool_use(
                    "t1",
                    "calculator",
                    serde_json::json!({"expression": "2+2"}),
                )]),
                Message::tool_result("t1", "4", false),
            ],
            256,
        )
        .with_system("Use tools when needed.");

        let chat = to_ollama_request(&request);
        assert_eq!(chat.messages.len(), 4);
        assert_eq!(chat.messages[0].role, "system");
        assert!(chat.messages[2].content.contains("tool call: calculator"));
        assert!(chat.messages[3].content.contains("[tool result] 4"));
        assert!(!chat.stream);
        assert_eq!(chat.options.num_predict, 256);
    }

    #[test]
    fn test_chat_url_from_env_default() {
        let config = OllamaConfig::default();
        let backend = OllamaBackend::new(config).unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
    }
}
