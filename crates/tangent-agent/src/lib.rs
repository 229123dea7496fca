//! Agent orchestration for Tangent.
//!
//! Ties the other crates together into a bounded agent loop:
//!
//! ```text
//!   user text ─► guard IN ─► ┌────────────────────────┐ ─► guard OUT ─► text
//!                            │  model call            │
//!                            │    │ tool use?         │
//!                            │    ▼                   │
//!                            │  ToolCatalog.dispatch  │  (up to max_steps)
//!                            └────────────────────────┘
//! ```
//!
//! The catalog in the middle merges the built-in tools ([`tools`]) with
//! tools discovered over the tool protocol, applies the permission profile,
//! and answers identical back-to-back calls from cache. Admission control
//! ([`limiter`]) rejects exchanges beyond the concurrency limit with
//! [`AgentError::Busy`] instead of queueing them.

pub mod agent;
pub mod catalog;
pub mod error;
pub mod limiter;
pub mod netsafety;
pub mod tool;
pub mod tools;

// The loop
pub use agent::{
    Agent, AgentConfig, AgentOutcome, DEFAULT_MAX_STEPS, MAX_STEPS_ENV, STEP_BUDGET_MESSAGE,
    max_steps_from_env,
};

// Catalog and dispatch
pub use catalog::{ALIASES, DispatchOutcome, ToolCatalog, resolve_alias, server_id};

// Tool trait and results
pub use tool::{MockTool, OutputConfig, ParamExt, Tool, ToolCategory, ToolContext, ToolResult};

// Admission control
pub use limiter::{DEFAULT_EXCHANGE_LIMIT, ExchangeLimiter, ExchangePermit};

// Network destination policy
pub use netsafety::{ALLOW_PRIVATE_ENV, allow_private_from_env, ensure_public_destination};

// Errors
pub use error::{AgentError, Result};
