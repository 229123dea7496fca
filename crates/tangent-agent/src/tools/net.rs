//! Network built-in tools.
//!
//! Requested URLs go through [`crate::netsafety`] before the initial
//! connection: loopback and private destinations are refused unless the
//! override is set. Redirect targets are not re-validated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{Value, json};

use crate::error::Result;
use crate::netsafety::ensure_public_destination;
use crate::tool::{ParamExt, Tool, ToolCategory, ToolContext, ToolResult};

fn build_client(timeout: Duration) -> std::result::Result<Client, String> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("Tangent/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// DNS Lookup
// ─────────────────────────────────────────────────────────────────────────────

pub struct DnsLookupTool;

#[async_trait]
impl Tool for DnsLookupTool {
    fn name(&self) -> &str {
        "dns_lookup"
    }

    fn description(&self) -> &str {
        "Resolve a hostname to its IP addresses using the system resolver."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": {
                    "type": "string",
                    "description": "The hostname to resolve, e.g. 'example.com'"
                }
            },
            "required": ["host"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let host = params.required_str("host", "provide the hostname to resolve")?;
        match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => {
                let addresses: Vec<String> = addrs.map(|sa| sa.ip().to_string()).collect();
                if addresses.is_empty() {
                    Ok(ToolResult::error(format!("'{}' resolved to no addresses", host)))
                } else {
                    Ok(ToolResult::json(json!({
                        "host": host,
                        "addresses": addresses
                    })))
                }
            }
            Err(e) => Ok(ToolResult::error(format!("Failed to resolve '{}': {}", host, e))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP HEAD
// ─────────────────────────────────────────────────────────────────────────────

/// Headers worth reporting from a HEAD probe.
const REPORTED_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "server",
    "last-modified",
    "etag",
    "location",
    "cache-control",
];

pub struct HttpHeadTool;

#[async_trait]
impl Tool for HttpHeadTool {
    fn name(&self) -> &str {
        "http_head"
    }

    fn description(&self) -> &str {
        "Send an HTTP HEAD request to a public URL and report the status and key headers."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to probe"
                }
            },
            "required": ["url"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let raw_url = params.required_str("url", "provide the URL to probe")?;
        let url = match ensure_public_destination(raw_url, ctx.allow_private_network).await {
            Ok(u) => u,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let client = match build_client(Duration::from_secs(10)) {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let response = match client.head(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("HEAD request failed: {}", e))),
        };

        let mut headers = serde_json::Map::new();
        for name in REPORTED_HEADERS {
            if let Some(value) = response.headers().get(*name)
                && let Ok(value) = value.to_str()
            {
                headers.insert(name.to_string(), json!(value));
            }
        }

        Ok(ToolResult::json(json!({
            "url": raw_url,
            "status": response.status().as_u16(),
            "headers": headers
        })))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Web Fetch
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for web fetching.
#[derive(Debug, Clone)]
pub struct WebFetchConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum body bytes read into memory.
    pub max_body_bytes: usize,
    /// Maximum extracted-text length returned to the model.
    pub max_text_length: usize,
}

impl Default for WebFetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body_bytes: 2 * 1024 * 1024,
            max_text_length: 50_000,
        }
    }
}

/// Fetch a public URL and reduce HTML to readable text.
pub struct WebFetchTool {
    config: WebFetchConfig,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self {
            config: WebFetchConfig::default(),
        }
    }

    pub fn with_config(config: WebFetchConfig) -> Self {
        Self { config }
    }

    /// Extract readable text from HTML, preferring main-content containers.
    fn extract_text_from_html(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let content_selectors = ["article", "main", "[role='main']", "#content", ".content"];
        let mut text_parts = Vec::new();
        let mut found_content = false;
        for selector_str in content_selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                for element in document.select(&selector) {
                    let text = element.text().collect::<Vec<_>>().join(" ");
                    if !text.trim().is_empty() {
                        text_parts.push(text);
                        found_content = true;
                    }
                }
            }
            if found_content {
                break;
            }
        }

        if !found_content
            && let Ok(body_selector) = Selector::parse("body")
        {
            for element in document.select(&body_selector) {
                text_parts.push(element.text().collect::<Vec<_>>().join(" "));
            }
        }

        let text = text_parts.join("\n");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.len() > self.config.max_text_length {
            let mut cut = self.config.max_text_length;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...[truncated]", &text[..cut])
        } else {
            text
        }
    }

    fn extract_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a public web page and return its content. HTML is reduced to readable text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                },
                "raw": {
                    "type": "boolean",
                    "description": "If true, return raw HTML instead of extracted text. Defaults to false.",
                    "default": false
                }
            },
            "required": ["url"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let raw_url = params.required_str("url", "provide the URL to fetch")?;
        let raw = params.optional_bool("raw", false);

        let url = match ensure_public_destination(raw_url, ctx.allow_private_network).await {
            Ok(u) => u,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let client = match build_client(self.config.timeout) {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let response = match client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Failed to fetch URL: {}", e))),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read response: {}", e))),
        };
        if bytes.len() > self.config.max_body_bytes {
            return Ok(ToolResult::error(format!(
                "Response body too large ({} bytes, limit {})",
                bytes.len(),
                self.config.max_body_bytes
            )));
        }

        let body = String::from_utf8_lossy(&bytes).to_string();

        if raw || !content_type.contains("text/html") {
            let mut cut = body.len().min(self.config.max_text_length);
            while cut > 0 && !body.is_char_boundary(cut) {
                cut -= 1;
            }
            return Ok(ToolResult::json(json!({
                "url": raw_url,
                "status": status,
                "content_type": content_type,
                "content": &body[..cut]
            })));
        }

        let title = self.extract_title(&body);
        let text = self.extract_text_from_html(&body);
        let mut result = json!({
            "url": raw_url,
            "status": status,
            "content_type": content_type,
            "content": text
        });
        if let Some(title) = title {
            result["title"] = json!(title);
        }
        Ok(ToolResult::json(result))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Brave Search
// ─────────────────────────────────────────────────────────────────────────────

/// Environment variable carrying the Brave Search API key.
pub const BRAVE_API_KEY_ENV: &str = "BRAVE_API_KEY";

pub struct BraveSearchTool {
    api_key: Option<String>,
    max_results: usize,
}

impl BraveSearchTool {
    /// Create the tool with the key from the environment, if set.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(BRAVE_API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            max_results: 5,
        }
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            max_results: 5,
        }
    }
}

#[async_trait]
impl Tool for BraveSearchTool {
    fn name(&self) -> &str {
        "brave_search"
    }

    fn description(&self) -> &str {
        "Search the web via the Brave Search API. Returns titles, URLs, and snippets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let query = params.required_str("query", "provide the search query")?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(ToolResult::error(format!(
                "Brave search is not configured: set {}",
                BRAVE_API_KEY_ENV
            )));
        };

        let client = match build_client(Duration::from_secs(15)) {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
            urlencoding::encode(query),
            self.max_results
        );

        let response = match client
            .get(&url)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Brave search failed: {}", e))),
        };

        if !response.status().is_success() {
            return Ok(ToolResult::error(format!(
                "Brave search error: HTTP {}",
                response.status()
            )));
        }

        let data: Value = match response.json().await {
            Ok(d) => d,
            Err(e) => return Ok(ToolResult::error(format!("Failed to parse response: {}", e))),
        };

        let results: Vec<Value> = data["web"]["results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .take(self.max_results)
                    .filter_map(|r| {
                        Some(json!({
                            "title": r["title"].as_str()?,
                            "url": r["url"].as_str()?,
                            "snippet": r["description"].as_str().unwrap_or("")
                        }))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if results.is_empty() {
            Ok(ToolResult::text("No results found"))
        } else {
            Ok(ToolResult::json(json!({
                "query": query,
                "count": results.len(),
                "results": results
            })))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Weather
// ─────────────────────────────────────────────────────────────────────────────

/// Current weather by coordinates, via the Open-Meteo public API.
pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get current weather conditions for a latitude/longitude via Open-Meteo."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "latitude": {
                    "type": "number",
                    "description": "Latitude in decimal degrees"
                },
                "longitude": {
                    "type": "number",
                    "description": "Longitude in decimal degrees"
                }
            },
            "required": ["latitude", "longitude"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let Some(latitude) = params.optional_f64("latitude") else {
            return Ok(ToolResult::error("missing required parameter 'latitude'"));
        };
        let Some(longitude) = params.optional_f64("longitude") else {
            return Ok(ToolResult::error("missing required parameter 'longitude'"));
        };
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Ok(ToolResult::error("latitude/longitude out of range"));
        }

        let client = match build_client(Duration::from_secs(10)) {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let url = format!(
            "https://api.open-meteo.com/v1/forecast?latitude={latitude}&longitude={longitude}&current_weather=true"
        );

        let response = match client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(format!("Weather request failed: {}", e))),
        };
        if !response.status().is_success() {
            return Ok(ToolResult::error(format!(
                "Weather service error: HTTP {}",
                response.status()
            )));
        }

        let data: Value = match response.json().await {
            Ok(d) => d,
            Err(e) => return Ok(ToolResult::error(format!("Failed to parse response: {}", e))),
        };

        Ok(ToolResult::json(json!({
            "latitude": latitude,
            "longitude": longitude,
            "current_weather": data.get("current_weather").cloned().unwrap_or(Value::Null)
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
    fn test_tool_metadata() {
        assert_eq!(DnsLookupTool.name(), "dns_lookup");
        assert_eq!(HttpHeadTool.name(), "http_head");
        assert_eq!(WebFetchTool::new().name(), "web_fetch");
        assert_eq!(WeatherTool.name(), "weather");

        for tool in [
            &DnsLookupTool as &dyn Tool,
            &HttpHeadTool,
            &WeatherTool,
        ] {
            assert_eq!(tool.category(), ToolCategory::Network);
            assert!(!tool.description().is_empty());
        }
    }

    #[test]
    fn test_extract_text_from_html() {
        let tool = WebFetchTool::new();
        let html = r#"
            <html>
            <head><title>Test Page</title></head>
            <body>
                <nav>Navigation</nav>
                <main>
                    <h1>Hello World</h1>
                    <p>This is the main content.</p>
                </main>
            </body>
            </html>
        "#;

        let text = tool.extract_text_from_html(html);
        assert!(text.contains("Hello World"));
        assert!(text.contains("main content"));
        assert!(!text.contains("Navigation"));
    }

    #[test]
    fn test_extract_title() {
        let tool = WebFetchTool::new();
        let html = "<html><head><title>My Title</title></head><body></body></html>";
        assert_eq!(tool.extract_title(html), Some("My Title".to_string()));
    }

    #[tokio::test]
    async fn test_web_fetch_rejects_invalid_url() {
        let tool = WebFetchTool::new();
        let ctx = ToolContext::default();
        let result = tool
            .execute(json!({"url": "not-a-valid-url"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_model_content().contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_http_head_rejects_loopback() {
        let tool = HttpHeadTool;
        let ctx = ToolContext::default();
        let result = tool
            .execute(json!({"url": "http://127.0.0.1:9/"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_model_content().contains("loopback"));
    }

    #[tokio::test]
    async fn test_brave_search_without_key() {
        let tool = BraveSearchTool {
            api_key: None,
            max_results: 5,
        };
        let ctx = ToolContext::default();
        let result = tool
            .execute(json!({"query": "rust"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(result.to_model_content().contains("BRAVE_API_KEY"));
    }

    #[tokio::test]
    async fn test_weather_rejects_out_of_range() {
        let tool = WeatherTool;
        let ctx = ToolContext::default();
        let result = tool
            .execute(json!({"latitude": 120.0, "longitude": 0.0}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error());
    }
}
