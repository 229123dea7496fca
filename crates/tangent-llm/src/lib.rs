//! Provider adapter for Tangent.
//!
//! Presents one canonical request/response shape to the orchestrator and
//! maps it onto heterogeneous provider APIs:
//!
//! ```text
//!                    ┌──────────────────┐
//!  CompletionRequest │  ProviderBackend │  canonical blocks
//!  ───────────────►  │  (trait)         │  ◄───────────────
//!                    └────────┬─────────┘
//!          ┌──────────────────┼──────────────────┐
//!          ▼                  ▼                  ▼
//!   AnthropicBackend    OpenAiBackend      OllamaBackend
//!   (/v1/messages)      (/chat/completions) (/api/chat,
//!    native tools        native tool_calls   prompt-based)
//! ```
//!
//! Tool inclusion policy, provider-facing name sanitisation, and the
//! reverse name mapping live in [`tooling`]; the forgiving JSON decision
//! parser for prompt-based backends lives in [`decision`].

pub mod anthropic;
pub mod backend;
pub mod client;
pub mod decision;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod tooling;
pub mod types;

// Backend trait and doubles
pub use backend::{MockBackend, ProviderBackend, SharedBackend, with_retry};

// Concrete backends
pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};

// Provider selection
pub use client::{DEFAULT_PROXY_HEADER, ProviderId, ProxyRouting, available_providers, create_backend};

// Canonical types
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, Role, StopReason,
    ToolDefinition, ToolUseBlock, Usage,
};

// Tool inclusion and naming
pub use tooling::{InclusionMode, ProviderToolMap, ToolInclusion, sanitize_tool_name};

// Decision parsing for prompt-based backends
pub use decision::{Decision, parse_decision};

// Errors
pub use error::{LlmError, RateLimitInfo, Result};
