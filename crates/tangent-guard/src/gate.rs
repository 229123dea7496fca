//! The guardrail gate.
//!
//! Direct mode posts each unit of text (the prompt going IN, the final answer
//! going OUT) to a resolve-and-execute-policy endpoint and turns the response
//! into a [`GuardVerdict`]. Proxy mode performs no checks here; the gate only
//! contributes the proxy upstream that provider traffic must be routed
//! through. Either way, a gate that cannot reach a decision is an error, not
//! an allow.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tangent_types::{GuardStage, TraceEventBody, TraceSink, redact_headers};

use crate::error::{GuardError, Result};

/// Default policy endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://api.zseclipse.net/v1/detection/resolve-and-execute-policy";

/// Default timeout for policy checks.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default credential header name in proxy mode.
const DEFAULT_PROXY_HEADER: &str = "X-ApiKey";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How guardrail enforcement is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    /// The gate calls the policy endpoint itself, once per stage.
    Direct,
    /// Provider traffic is routed through a policy-enforcing reverse proxy;
    /// the gate performs no checks of its own.
    Proxy,
}

impl GuardMode {
    /// Parse a mode from its configuration string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "proxy" => Ok(Self::Proxy),
            other => Err(GuardError::config(format!(
                "unknown guardrail mode '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Proxy => "proxy",
        }
    }
}

/// Configuration for the guardrail gate.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Deployment mode.
    pub mode: GuardMode,

    /// Policy endpoint (direct mode).
    pub endpoint: String,

    /// Bearer credential for the policy service; also the proxy credential.
    pub api_key: Option<String>,

    /// Optional per-conversation correlation header name.
    pub conversation_header: Option<String>,

    /// Timeout per policy check.
    pub timeout: Duration,

    /// Proxy base URL (proxy mode).
    pub proxy_base_url: Option<String>,

    /// Credential header name used by the proxy.
    pub proxy_header_name: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: GuardMode::Direct,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            conversation_header: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy_base_url: None,
            proxy_header_name: DEFAULT_PROXY_HEADER.to_string(),
        }
    }
}

impl GuardConfig {
    /// Read the gate configuration from the environment.
    ///
    /// `GUARD_ENDPOINT`, `GUARD_API_KEY`, `GUARD_TIMEOUT_SECS`,
    /// `GUARD_CONVERSATION_ID_HEADER`, `GUARD_MODE`, `GUARD_PROXY_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var("GUARD_MODE") {
            config.mode = GuardMode::parse(&mode)?;
        }
        if let Ok(endpoint) = std::env::var("GUARD_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("GUARD_API_KEY")
            && !key.trim().is_empty()
        {
            config.api_key = Some(key);
        }
        if let Ok(header) = std::env::var("GUARD_CONVERSATION_ID_HEADER") {
            let header = header.trim().to_string();
            if !header.is_empty() {
                config.conversation_header = Some(header);
            }
        }
        if let Ok(secs) = std::env::var("GUARD_TIMEOUT_SECS")
            && let Ok(secs) = secs.trim().parse::<u64>()
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(url) = std::env::var("GUARD_PROXY_BASE_URL") {
            config.proxy_base_url = Some(url);
        }

        Ok(config)
    }

    /// Set the deployment mode.
    pub fn with_mode(mut self, mode: GuardMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the policy endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// The proxy upstream `(base_url, header_name, credential)` provider
    /// traffic must be routed through, when in proxy mode.
    pub fn proxy_upstream(&self) -> Option<(String, String, String)> {
        if self.mode != GuardMode::Proxy {
            return None;
        }
        let base = self.proxy_base_url.clone()?;
        let credential = self.api_key.clone()?;
        Some((base, self.proxy_header_name.clone(), credential))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Verdicts
// ─────────────────────────────────────────────────────────────────────────────

/// The outcome of one guardrail check.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    /// Which boundary the check applied to.
    pub stage: GuardStage,
    /// Whether the text may pass.
    pub allowed: bool,
    /// Operator-facing block message when not allowed.
    pub reason: Option<String>,
    /// Policy-rewritten payload, when the service supplied one.
    pub redacted_payload: Option<String>,
}

impl GuardVerdict {
    fn allowed(stage: GuardStage) -> Self {
        Self {
            stage,
            allowed: true,
            reason: None,
            redacted_payload: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// The Gate
// ─────────────────────────────────────────────────────────────────────────────

/// Guardrail gate: the policy checkpoint wrapped around every model call.
pub struct GuardGate {
    client: reqwest::Client,
    config: GuardConfig,
}

impl GuardGate {
    /// Create a gate with the given configuration.
    pub fn new(config: GuardConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GuardError::config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Create a gate from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(GuardConfig::from_env()?)
    }

    /// The gate's configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// True when this gate performs per-stage checks itself.
    pub fn is_direct(&self) -> bool {
        self.config.mode == GuardMode::Direct
    }

    /// Run one policy check on `text` at `stage`.
    ///
    /// Records a `guardrail.check` trace event for every decision, including
    /// failures. A missing credential or unreachable service is
    /// [`GuardError::Unavailable`]; the caller must treat that as blocked.
    pub async fn check(
        &self,
        stage: GuardStage,
        text: &str,
        conversation_id: Option<&str>,
        trace: &dyn TraceSink,
    ) -> Result<GuardVerdict> {
        // In proxy mode enforcement happens in-band at the proxy, so there is
        // no decision to make (or trace) here.
        if self.config.mode == GuardMode::Proxy {
            return Ok(GuardVerdict::allowed(stage));
        }

        let Some(api_key) = self.config.api_key.as_deref() else {
            let detail = "guardrail API key is not set".to_string();
            self.record(trace, stage, false, Some(detail.clone()));
            return Err(GuardError::Unavailable(detail));
        };

        let payload = serde_json::json!({
            "direction": stage.to_string(),
            "content": text,
        });

        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", api_key));
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(header) = &self.config.conversation_header
            && let Some(id) = conversation_id
        {
            headers.insert(header.clone(), id.to_string());
        }

        tracing::debug!(
            stage = %stage,
            endpoint = %self.config.endpoint,
            headers = ?redact_headers(&headers),
            "Guardrail check"
        );

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        for (name, value) in &headers {
            request = request.header(name, value);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let err: GuardError = e.into();
                self.record(trace, stage, false, Some(err.to_string()));
                return Err(err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("policy endpoint returned HTTP {}: {}", status, body);
            self.record(trace, stage, false, Some(detail.clone()));
            return Err(GuardError::Unavailable(detail));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let verdict = parse_verdict(stage, &body);
        self.record(trace, stage, verdict.allowed, verdict.reason.clone());
        Ok(verdict)
    }

    fn record(&self, trace: &dyn TraceSink, stage: GuardStage, allowed: bool, reason: Option<String>) {
        trace.record(TraceEventBody::GuardrailCheck {
            stage,
            mode: self.config.mode.as_str().to_string(),
            allowed,
            reason,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Verdict Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Interpret a policy response body.
///
/// The text is blocked when the body carries `blocked == true` or
/// `action == "BLOCK"` (case-insensitive); everything else is an allow.
pub fn parse_verdict(stage: GuardStage, body: &Value) -> GuardVerdict {
    let blocked = body.get("blocked").and_then(Value::as_bool) == Some(true)
        || body
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|a| a.eq_ignore_ascii_case("BLOCK"));

    if !blocked {
        return GuardVerdict::allowed(stage);
    }

    GuardVerdict {
        stage,
        allowed: false,
        reason: Some(block_message(stage, body)),
        redacted_payload: body
            .get("maskedContent")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Assemble the operator-facing block message from the policy response.
fn block_message(stage: GuardStage, body: &Value) -> String {
    let field = |key: &str| -> String {
        match body.get(key) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "n/a".to_string(),
        }
    };

    let label = match stage {
        GuardStage::In => "prompt",
        GuardStage::Out => "response",
    };

    let detectors = triggered_detectors(body);
    let detectors_text = if detectors.is_empty() {
        "n/a".to_string()
    } else {
        detectors.join(", ")
    };

    format!(
        "This {} was blocked by policy.\n\nBlock details:\n- transactionId: {}\n- policyName: {}\n- policyId: {}\n- severity: {}\n- triggeredDetectors: {}",
        label,
        field("transactionId"),
        field("policyName"),
        field("policyId"),
        field("severity"),
        detectors_text,
    )
}

/// Names of the detectors that fired, with detected secret types appended
/// when the service reported them.
fn triggered_detectors(body: &Value) -> Vec<String> {
    let Some(responses) = body.get("detectorResponses").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (name, details) in responses {
        let Some(details) = details.as_object() else {
            continue;
        };
        let triggered = details.get("triggered").and_then(Value::as_bool) == Some(true);
        let blocking = details
            .get("action")
            .and_then(Value::as_str)
            .is_some_and(|a| a.eq_ignore_ascii_case("BLOCK"));
        if !triggered && !blocking {
            continue;
        }

        let secret_types: Vec<&str> = details
            .get("details")
            .and_then(Value::as_object)
            .and_then(|d| d.get("detectedSecretTypes"))
            .and_then(Value::as_object)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();

        if secret_types.is_empty() {
            out.push(name.clone());
        } else {
            out.push(format!("{} ({})", name, secret_types.join(", ")));
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tangent_types::TraceRecorder;

    #[test]
    fn test_mode_parse() {
        assert_eq!(GuardMode::parse("direct").unwrap(), GuardMode::Direct);
        assert_eq!(GuardMode::parse(" Proxy ").unwrap(), GuardMode::Proxy);
        assert!(GuardMode::parse("open").is_err());
    }

    #[test]
    fn test_parse_verdict_allows_by_default() {
        let verdict = parse_verdict(GuardStage::In, &json!({"action": "ALLOW"}));
        assert!(verdict.allowed);
        assert!(verdict.reason.is_none());

        let verdict = parse_verdict(GuardStage::In, &json!({}));
        assert!(verdict.allowed);
    }

    #[test]
    fn test_parse_verdict_blocked_flag() {
        let verdict = parse_verdict(GuardStage::In, &json!({"blocked": true}));
        assert!(!verdict.allowed);
        assert!(verdict.reason.is_some());
    }

    #[test]
    fn test_parse_verdict_block_action_case_insensitive() {
        let verdict = parse_verdict(GuardStage::Out, &json!({"action": "block"}));
        assert!(!verdict.allowed);
    }

    #[test]
    fn test_block_message_fields() {
        let body = json!({
            "blocked": true,
            "transactionId": "tx-123",
            "policyName": "no-secrets",
            "policyId": 7,
            "severity": "HIGH",
            "maskedContent": "my key is ****",
            "detectorResponses": {
                "secrets": {
                    "triggered": true,
                    "details": {"detectedSecretTypes": {"aws_access_key": 1}}
                },
                "pii": {"triggered": false, "action": "ALLOW"}
            }
        });

        let verdict = parse_verdict(GuardStage::In, &body);
        assert!(!verdict.allowed);
        assert_eq!(verdict.redacted_payload.as_deref(), Some("my key is ****"));

        let reason = verdict.reason.unwrap();
        assert!(reason.contains("tx-123"));
        assert!(reason.contains("no-secrets"));
        assert!(reason.contains("policyId: 7"));
        assert!(reason.contains("HIGH"));
        assert!(reason.contains("secrets (aws_access_key)"));
        assert!(!reason.contains("pii"));
    }

    #[test]
    fn test_proxy_upstream_selection() {
        let config = GuardConfig::default()
            .with_mode(GuardMode::Proxy)
            .with_api_key("proxy-cred");
        assert!(config.proxy_upstream().is_none()); // no base URL yet

        let config = GuardConfig {
            proxy_base_url: Some("https://proxy.example.com".to_string()),
            ..config
        };
        let (base, header, cred) = config.proxy_upstream().unwrap();
        assert_eq!(base, "https://proxy.example.com");
        assert_eq!(header, "X-ApiKey");
        assert_eq!(cred, "proxy-cred");
    }

    #[test]
    fn test_direct_mode_has_no_proxy_upstream() {
        let config = GuardConfig::default().with_api_key("key");
        assert!(config.proxy_upstream().is_none());
    }

    #[tokio::test]
    async fn test_proxy_mode_check_is_a_noop() {
        let gate = GuardGate::new(GuardConfig::default().with_mode(GuardMode::Proxy)).unwrap();
        let trace = TraceRecorder::new();

        // No key, no endpoint call, no trace event: the proxy enforces.
        let verdict = gate.check(GuardStage::In, "hello", None, &trace).await.unwrap();
        assert!(verdict.allowed);
        assert!(trace.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable_and_traced() {
        let gate = GuardGate::new(GuardConfig::default()).unwrap();
        let trace = TraceRecorder::new();

        let result = gate.check(GuardStage::In, "hello", None, &trace).await;
        assert!(matches!(result, Err(GuardError::Unavailable(_))));

        // The failed check still leaves an audit trail.
        let events = trace.events();
        assert_eq!(events.len(), 1);
        match &events[0].body {
            TraceEventBody::GuardrailCheck { stage, allowed, .. } => {
                assert_eq!(*stage, GuardStage::In);
                assert!(!allowed);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
