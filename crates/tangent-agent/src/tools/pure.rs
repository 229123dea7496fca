//! Pure built-in tools: no I/O, deterministic given their input.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::tool::{ParamExt, Tool, ToolCategory, ToolContext, ToolResult};

// ─────────────────────────────────────────────────────────────────────────────
// Calculator
// ─────────────────────────────────────────────────────────────────────────────

/// Arithmetic expression evaluator.
///
/// Supports `+ - * / % ^`, parentheses, and unary minus. Division by zero and
/// malformed input are tool errors, not panics.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, and unary minus."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate, e.g. '2 * (3 + 4)'"
                }
            },
            "required": ["expression"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let expression = params.required_str("expression", "provide the expression to evaluate")?;
        match evaluate(expression) {
            Ok(value) => Ok(ToolResult::json(json!({
                "expression": expression,
                "result": value
            }))),
            Err(e) => Ok(ToolResult::error(e)),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(input: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "Unexpected token at position {}",
            parser.pos
        ));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number (division by zero?)".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number '{}'", literal))?;
                tokens.push(Token::Number(number));
            }
            other => return Err(format!("Unexpected character '{}'", other)),
        }
    }
    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := power (('*' | '/' | '%') power)*
    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.power()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.power()?;
                }
                Token::Slash => {
                    self.advance();
                    let rhs = self.power()?;
                    if rhs == 0.0 {
                        return Err("Division by zero".to_string());
                    }
                    value /= rhs;
                }
                Token::Percent => {
                    self.advance();
                    let rhs = self.power()?;
                    if rhs == 0.0 {
                        return Err("Modulo by zero".to_string());
                    }
                    value %= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // power := unary ('^' power)?   (right-associative)
    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some(Token::Caret) {
            self.advance();
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // unary := '-' unary | atom
    fn unary(&mut self) -> std::result::Result<f64, String> {
        if self.peek() == Some(Token::Minus) {
            self.advance();
            return Ok(-self.unary()?);
        }
        self.atom()
    }

    // atom := number | '(' expr ')'
    fn atom(&mut self) -> std::result::Result<f64, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                if self.advance() != Some(Token::RParen) {
                    return Err("Missing closing parenthesis".to_string());
                }
                Ok(value)
            }
            Some(other) => Err(format!("Unexpected token {:?}", other)),
            None => Err("Unexpected end of expression".to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Current Time
// ─────────────────────────────────────────────────────────────────────────────

/// UTC clock, ISO-8601.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current UTC date and time in ISO-8601 format."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let now = chrono::Utc::now();
        Ok(ToolResult::json(json!({
            "utc": now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "unix": now.timestamp()
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UUID Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum uuids per call.
const MAX_UUID_COUNT: u64 = 20;

pub struct UuidTool;

#[async_trait]
impl Tool for UuidTool {
    fn name(&self) -> &str {
        "uuid_generate"
    }

    fn description(&self) -> &str {
        "Generate one or more random (v4) UUIDs."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {
                    "type": "integer",
                    "description": "How many UUIDs to generate (1-20). Defaults to 1.",
                    "minimum": 1,
                    "maximum": MAX_UUID_COUNT
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let count = params.optional_u64("count", 1);
        if count == 0 || count > MAX_UUID_COUNT {
            return Ok(ToolResult::error(format!(
                "count must be between 1 and {}",
                MAX_UUID_COUNT
            )));
        }
        let uuids: Vec<String> = (0..count).map(|_| uuid::Uuid::new_v4().to_string()).collect();
        Ok(ToolResult::json(json!({"uuids": uuids})))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hashing
// ─────────────────────────────────────────────────────────────────────────────

pub struct HashTool;

#[async_trait]
impl Tool for HashTool {
    fn name(&self) -> &str {
        "hash_text"
    }

    fn description(&self) -> &str {
        "Hash a text string with SHA-256 (default) or SHA-1 and return the hex digest."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to hash"
                },
                "algorithm": {
                    "type": "string",
                    "enum": ["sha256", "sha1"],
                    "default": "sha256"
                }
            },
            "required": ["text"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let text = params.required_str("text", "provide the text to hash")?;
        let algorithm = params.optional_str("algorithm").unwrap_or("sha256");
        let digest = match algorithm {
            "sha256" => hex::encode(Sha256::digest(text.as_bytes())),
            "sha1" => hex::encode(Sha1::digest(text.as_bytes())),
            other => {
                return Ok(ToolResult::error(format!(
                    "Unsupported algorithm '{}': use sha256 or sha1",
                    other
                )));
            }
        };
        Ok(ToolResult::json(json!({
            "algorithm": algorithm,
            "digest": digest
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Base64 Codec
// ─────────────────────────────────────────────────────────────────────────────

pub struct Base64Tool;

#[async_trait]
impl Tool for Base64Tool {
    fn name(&self) -> &str {
        "base64_codec"
    }

    fn description(&self) -> &str {
        "Encode text to base64 or decode base64 back to text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The input to encode or decode"
                },
                "operation": {
                    "type": "string",
                    "enum": ["encode", "decode"],
                    "default": "encode"
                }
            },
            "required": ["text"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let text = params.required_str("text", "provide the input text")?;
        let operation = params.optional_str("operation").unwrap_or("encode");
        match operation {
            "encode" => Ok(ToolResult::json(json!({
                "operation": "encode",
                "output": BASE64.encode(text.as_bytes())
            }))),
            "decode" => match BASE64.decode(text.trim()) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(decoded) => Ok(ToolResult::json(json!({
                        "operation": "decode",
                        "output": decoded
                    }))),
                    Err(_) => Ok(ToolResult::error("Decoded bytes are not valid UTF-8")),
                },
                Err(e) => Ok(ToolResult::error(format!("Invalid base64: {}", e))),
            },
            other => Ok(ToolResult::error(format!(
                "Unsupported operation '{}': use encode or decode",
                other
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Codec
// ─────────────────────────────────────────────────────────────────────────────

pub struct UrlCodecTool;

#[async_trait]
impl Tool for UrlCodecTool {
    fn name(&self) -> &str {
        "url_codec"
    }

    fn description(&self) -> &str {
        "Percent-encode text for use in URLs, or decode percent-encoded text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The input to encode or decode"
                },
                "operation": {
                    "type": "string",
                    "enum": ["encode", "decode"],
                    "default": "encode"
                }
            },
            "required": ["text"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let text = params.required_str("text", "provide the input text")?;
        let operation = params.optional_str("operation").unwrap_or("encode");
        match operation {
            "encode" => Ok(ToolResult::json(json!({
                "operation": "encode",
                "output": urlencoding::encode(text).into_owned()
            }))),
            "decode" => match urlencoding::decode(text) {
                Ok(decoded) => Ok(ToolResult::json(json!({
                    "operation": "decode",
                    "output": decoded.into_owned()
                }))),
                Err(e) => Ok(ToolResult::error(format!("Invalid percent-encoding: {}", e))),
            },
            other => Ok(ToolResult::error(format!(
                "Unsupported operation '{}': use encode or decode",
                other
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Text Stats
// ─────────────────────────────────────────────────────────────────────────────

pub struct TextStatsTool;

#[async_trait]
impl Tool for TextStatsTool {
    fn name(&self) -> &str {
        "text_stats"
    }

    fn description(&self) -> &str {
        "Count characters, words, and lines in a text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to analyse"
                }
            },
            "required": ["text"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Pure
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let text = params.required_str("text", "provide the text to analyse")?;
        Ok(ToolResult::json(json!({
            "chars": text.chars().count(),
            "words": text.split_whitespace().count(),
            "lines": text.lines().count()
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
