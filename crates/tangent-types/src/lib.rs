//! Shared types for the Tangent orchestration engine.
//!
//! This crate holds the data model that crosses crate boundaries: canonical
//! tool definitions, permission profiles, and the per-run trace log that the
//! orchestrator populates and external consumers read.

pub mod profile;
pub mod tool_def;
pub mod trace;

pub use profile::PermissionProfile;
pub use tool_def::{ToolDef, ToolSource};
pub use trace::{GuardStage, TraceEvent, TraceEventBody, TraceRecorder, TraceSink, redact_headers};
