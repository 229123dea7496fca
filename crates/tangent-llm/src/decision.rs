//! Decision normaliser for prompt-based backends.
//!
//! Backends without native tool support are asked to answer with a single
//! JSON object: `{"type": "tool", "name": ..., "arguments": {...}}` to call a
//! tool, or `{"type": "final", "content": ...}` to finish. Weak models get
//! this wrong in predictable ways (renamed keys, fenced code blocks, missing
//! `type`), so parsing is deliberately forgiving; anything that cannot be
//! normalised into a tool call is treated as final text.

use serde_json::Value;

/// A normalised model decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The model wants to call a tool.
    Tool {
        /// Provider-facing tool name as the model wrote it.
        name: String,
        /// Arguments object (always an object, possibly empty).
        arguments: Value,
    },
    /// The model produced its final answer.
    Final {
        /// The answer text.
        content: String,
    },
}

/// Key variants models use for the decision type.
const TOOL_TYPE_VALUES: &[&str] = &["tool", "tool_call", "call", "use_tool"];

/// Key variants models use for the tool name.
const NAME_KEYS: &[&str] = &["name", "tool", "tool_name", "toolName"];

/// Key variants models use for the arguments object.
const ARGUMENT_KEYS: &[&str] = &["arguments", "args", "input", "params"];

/// Parse a model reply into a [`Decision`].
pub fn parse_decision(text: &str) -> Decision {
    let candidate = strip_code_fence(text.trim());

    let Ok(value) = serde_json::from_str::<Value>(candidate) else {
        return Decision::Final {
            content: text.trim().to_string(),
        };
    };

    let Value::Object(obj) = &value else {
        return Decision::Final {
            content: text.trim().to_string(),
        };
    };

    // Explicit final answer.
    if obj.get("type").and_then(Value::as_str) == Some("final") {
        let content = obj
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| text.trim().to_string());
        return Decision::Final { content };
    }

    // Tool call, either explicitly typed or a bare {"name": ..., "arguments": ...}.
    let typed_as_tool = obj
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| TOOL_TYPE_VALUES.contains(&t));
    let has_type = obj.contains_key("type");

    if typed_as_tool || !has_type {
        if let Some(name) = extract_name(obj) {
            let arguments = extract_arguments(obj);
            return Decision::Tool { name, arguments };
        }
    }

    Decision::Final {
        content: text.trim().to_string(),
    }
}

fn extract_name(obj: &serde_json::Map<String, Value>) -> Option<String> {
    NAME_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .filter(|name| !name.is_empty())
}

fn extract_arguments(obj: &serde_json::Map<String, Value>) -> Value {
    for key in ARGUMENT_KEYS {
        if let Some(args) = obj.get(*key) {
            if args.is_object() {
                return args.clone();
            }
            // A stringified arguments object is common enough to unwrap.
            if let Some(s) = args.as_str()
                && let Ok(parsed) = serde_json::from_str::<Value>(s)
                && parsed.is_object()
            {
                return parsed;
            }
        }
    }
    Value::Object(serde_json::Map::new())
}

/// Strip a surrounding Markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line ("json") when present.
    match body.find('\n') {
        Some(idx) if !body[..idx].trim().is_empty() && !body[..idx].trim().starts_with('{') => {
            body[idx + 1..].trim()
        }
        _ => body.trim(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_tool_decision() {
        let decision =
            parse_decision(r#"{"type": "tool", "name": "calculator", "arguments": {"expression": "2+2"}}"#);
        assert_eq!(
            decision,
            Decision::Tool {
                name: "calculator".to_string(),
                arguments: json!({"expression": "2+2"}),
            }
        );
    }

    #[test]
    fn test_canonical_final_decision() {
        let decision = parse_decision(r#"{"type": "final", "content": "The answer is 4."}"#);
        assert_eq!(
            decision,
            Decision::Final {
                content: "The answer is 4.".to_string()
            }
        );
    }

    #[test]
    fn test_variant_type_and_keys() {
        let decision = parse_decision(
            r#"{"type": "tool_call", "tool_name": "current_time", "args": {}}"#,
        );
        assert_eq!(
            decision,
            Decision::Tool {
                name: "current_time".to_string(),
                arguments: json!({}),
            }
        );

        let decision = parse_decision(r#"{"type": "use_tool", "toolName": "web_fetch", "input": {"url": "https://example.com"}}"#);
        assert!(matches!(decision, Decision::Tool { name, .. } if name == "web_fetch"));
    }

    #[test]
    fn test_bare_name_arguments_object() {
        let decision = parse_decision(r#"{"name": "hash_text", "arguments": {"text": "hi"}}"#);
        assert_eq!(
            decision,
            Decision::Tool {
                name: "hash_text".to_string(),
                arguments: json!({"text": "hi"}),
            }
        );
    }

    #[test]
    fn test_fenced_code_block() {
        let decision = parse_decision(
            "```json\n{\"type\": \"tool\", \"name\": \"calculator\", \"arguments\": {\"expression\": \"1+1\"}}\n```",
        );
        assert!(matches!(decision, Decision::Tool { name, .. } if name == "calculator"));

        let decision = parse_decision("```\n{\"type\": \"final\", \"content\": \"done\"}\n```");
        assert_eq!(
            decision,
            Decision::Final {
                content: "done".to_string()
            }
        );
    }

    #[test]
    fn test_stringified_arguments() {
        let decision = parse_decision(
            r#"{"type": "tool", "name": "calculator", "arguments": "{\"expression\": \"3*3\"}"}"#,
        );
        assert_eq!(
            decision,
            Decision::Tool {
                name: "calculator".to_string(),
                arguments: json!({"expression": "3*3"}),
            }
        );
    }

    #[test]
    fn test_plain_text_is_final() {
        let decision = parse_decision("The answer is 42.");
        assert_eq!(
            decision,
            Decision::Final {
                content: "The answer is 42.".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_type_is_final() {
        let text = r#"{"type": "thinking", "content": "hmm"}"#;
        let decision = parse_decision(text);
        assert_eq!(
            decision,
            Decision::Final {
                content: text.to_string()
            }
        );
    }

    #[test]
    fn test_json_array_is_final() {
        let decision = parse_decision(r#"[1, 2, 3]"#);
        assert!(matches!(decision, Decision::Final { .. }));
    }

    #[test]
    fn test_missing_name_is_final() {
        let decision = parse_decision(r#"{"type": "tool", "arguments": {}}"#);
        assert!(matches!(decision, Decision::Final { .. }));
    }
}
