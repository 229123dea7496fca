//! Per-run trace log.
//!
//! Every externally visible decision the orchestrator makes (toolset
//! discovery, provider calls, tool dispatches, guardrail checks) is appended
//! to a [`TraceRecorder`] as a [`TraceEvent`]. The recorder is handed to
//! components as an explicit [`TraceSink`] dependency; there is no global
//! event log. Events carry a monotonic sequence number assigned at append
//! time, so consumers can replay a run in order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Guardrail stage a check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardStage {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl std::fmt::Display for GuardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardStage::In => f.write_str("IN"),
            GuardStage::Out => f.write_str("OUT"),
        }
    }
}

/// The payload of a single trace event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TraceEventBody {
    /// Point-in-time record of the tool catalog available to the run.
    #[serde(rename = "toolset.snapshot")]
    ToolsetSnapshot {
        servers: Vec<Value>,
        tools: Vec<Value>,
        server_count: usize,
        tool_count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// One outbound model invocation.
    #[serde(rename = "provider.call")]
    ProviderCall {
        provider: String,
        model: String,
        latency_ms: u64,
        step: u32,
        /// Request metadata with credentials redacted.
        #[serde(skip_serializing_if = "Option::is_none")]
        request: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// One tool dispatch through the registry.
    #[serde(rename = "tool.call")]
    ToolCall {
        invocation_id: String,
        tool_id: String,
        tool_name: String,
        duration_ms: u64,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// One guardrail verdict, allowed or blocked.
    #[serde(rename = "guardrail.check")]
    GuardrailCheck {
        stage: GuardStage,
        mode: String,
        allowed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl TraceEventBody {
    /// The `type` tag this body serializes under.
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEventBody::ToolsetSnapshot { .. } => "toolset.snapshot",
            TraceEventBody::ProviderCall { .. } => "provider.call",
            TraceEventBody::ToolCall { .. } => "tool.call",
            TraceEventBody::GuardrailCheck { .. } => "guardrail.check",
        }
    }
}

/// A recorded event: monotonic sequence number, timestamp, payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: TraceEventBody,
}

/// Append-only sink for trace events.
///
/// Components take `&dyn TraceSink` so tests can substitute their own
/// collector.
pub trait TraceSink: Send + Sync {
    fn record(&self, body: TraceEventBody);
}

/// Default [`TraceSink`]: an in-memory ordered log, one per run.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all events recorded so far, in order.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.inner.lock().events.clone()
    }

    /// Consume the recorder, yielding the final ordered log.
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.inner.into_inner().events
    }
}

impl TraceSink for TraceRecorder {
    fn record(&self, body: TraceEventBody) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.events.push(TraceEvent {
            seq,
            timestamp: Utc::now(),
            body,
        });
    }
}

/// Redact credential-bearing headers before they enter a trace.
///
/// `Authorization` values become `Bearer ***redacted***` and
/// `X-Subscription-Token` becomes `***redacted***`; other headers pass
/// through unchanged.
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = match k.to_ascii_lowercase().as_str() {
                "authorization" => "Bearer ***redacted***".to_string(),
                "x-subscription-token" | "x-api-key" | "x-apikey" => "***redacted***".to_string(),
                _ => v.clone(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_check(allowed: bool) -> TraceEventBody {
        TraceEventBody::GuardrailCheck {
            stage: GuardStage::In,
            mode: "direct".to_string(),
            allowed,
            reason: None,
        }
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let recorder = TraceRecorder::new();
        recorder.record(sample_check(true));
        recorder.record(sample_check(false));
        recorder.record(sample_check(true));

        let events = recorder.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().map(|e| e.seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let recorder = TraceRecorder::new();
        recorder.record(sample_check(true));
        let json = serde_json::to_value(&recorder.events()[0]).unwrap();
        assert_eq!(json["type"], "guardrail.check");
        assert_eq!(json["stage"], "IN");
        assert_eq!(json["seq"], 0);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_body_kind() {
        assert_eq!(sample_check(true).kind(), "guardrail.check");
    }

    #[test]
    fn test_redact_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer sk-secret".to_string());
        headers.insert("X-Subscription-Token".to_string(), "brave-key".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let redacted = redact_headers(&headers);
        assert_eq!(redacted["Authorization"], "Bearer ***redacted***");
        assert_eq!(redacted["X-Subscription-Token"], "***redacted***");
        assert_eq!(redacted["Content-Type"], "application/json");
    }

    #[test]
    fn test_into_events_preserves_order() {
        let recorder = TraceRecorder::new();
        recorder.record(sample_check(true));
        recorder.record(sample_check(false));
        let events = recorder.into_events();
        assert_eq!(events[1].seq, 1);
        match &events[1].body {
            TraceEventBody::GuardrailCheck { allowed, .. } => assert!(!allowed),
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
