//! Provider backend trait and test doubles.
//!
//! A `ProviderBackend` turns a canonical [`CompletionRequest`] into a
//! provider-specific HTTP request and maps the provider payload back to the
//! canonical [`CompletionResponse`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, StopReason, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                // Honor the provider's retry timing when it gave one.
                let wait = e.retry_after().unwrap_or(backoff);
                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        backend = backend_name,
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        backoff_ms = wait.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap())
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for provider backends.
///
/// ## Tool Calling Support
///
/// Backends signal tool support via `supports_native_tools()`:
/// - **Native**: tools are passed via `request.tools` and responses carry
///   structured `tool_use` blocks.
/// - **Prompt-based**: the caller renders the tool catalog into the system
///   prompt and parses the model's JSON decision out of the response text.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Returns true if the backend handles tools natively via its API.
    fn supports_native_tools(&self) -> bool {
        false
    }
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn ProviderBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for testing.
///
/// Returns pre-configured responses in order and records every request,
/// which makes agent-loop tests deterministic.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    native_tools: bool,
    responses: std::sync::Mutex<Vec<CompletionResponse>>,
    request_log: std::sync::Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with the given responses.
    ///
    /// Responses are returned in order. If more requests are made than
    /// responses available, an error is returned.
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            native_tools: true,
            responses: std::sync::Mutex::new(responses),
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![CompletionResponse::new(
            "mock_msg_1",
            "mock-model",
            vec![ContentBlock::text(text)],
            StopReason::EndTurn,
            Usage::new(10, 20),
        )])
    }

    /// Pretend to be a backend without native tool support.
    pub fn without_native_tools(mut self) -> Self {
        self.native_tools = false;
        self
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().unwrap().push(request);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            ));
        }
        Ok(responses.remove(0))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[tokio::test]
    async fn test_mock_backend_single_response() {
        let backend = MockBackend::with_text("Hello!");

        let request = CompletionRequest::new("test-model", vec![Message::user("Hi")], 100);
        let response = backend.complete(request).await.unwrap();

        assert_eq!(response.text(), "Hello!");
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_responses_in_order() {
        let backend = MockBackend::new(vec![
            CompletionResponse::new(
                "msg_1",
                "model",
                vec![ContentBlock::text("First")],
                StopReason::EndTurn,
                Usage::new(10, 10),
            ),
            CompletionResponse::new(
                "msg_2",
                "model",
                vec![ContentBlock::text("Second")],
                StopReason::EndTurn,
                Usage::new(10, 10),
            ),
        ]);

        let r1 = backend
            .complete(CompletionRequest::new("m", vec![Message::user("1")], 100))
            .await
            .unwrap();
        let r2 = backend
            .complete(CompletionRequest::new("m", vec![Message::user("2")], 100))
            .await
            .unwrap();

        assert_eq!(r1.text(), "First");
        assert_eq!(r2.text(), "Second");
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);
        let result = backend
            .complete(CompletionRequest::new("m", vec![Message::user("Hi")], 100))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_config_errors() {
        let mut calls = 0u32;
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "test", || {
            calls += 1;
            async { Err(LlmError::config("bad")) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Config(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_network_errors() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<u32> = with_retry(2, Duration::from_millis(1), "test", || {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Network("flaky".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }
}
