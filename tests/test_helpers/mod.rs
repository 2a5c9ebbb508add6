//! Shared utilities for the HTTP end-to-end tests
//!
//! Starts a real listener through `ServerLifecycle` on an ephemeral port and
//! provides a small client for both transports.

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Value, json};

use debugger_mcp_protocol::{CallToolResult, DomainErrorKind, McpError, ToolDefinition};
use debugger_mcp_server::{
    McpResult, McpServerBuilder, McpTool, ProjectContext, ServerConfig, ServerLifecycle,
};

/// Echoes `text`
pub struct EchoTool;

#[async_trait]
impl McpTool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("echo", "Echo text back").with_input_schema(json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }))
    }

    async fn execute(&self, _context: ProjectContext, arguments: Value) -> McpResult<CallToolResult> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::missing_param("text"))?;
        Ok(CallToolResult::text(text))
    }
}

/// Fails with "boom"
pub struct ExplodingTool;

#[async_trait]
impl McpTool for ExplodingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("explode", "Always fails")
    }

    async fn execute(&self, _context: ProjectContext, _arguments: Value) -> McpResult<CallToolResult> {
        Err(McpError::Internal("boom".to_string()))
    }
}

/// Reports that no debug session is running
pub struct ResumeTool;

#[async_trait]
impl McpTool for ResumeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("resume", "Resume the paused session")
    }

    async fn execute(&self, _context: ProjectContext, _arguments: Value) -> McpResult<CallToolResult> {
        Ok(CallToolResult::domain_error(
            DomainErrorKind::NoActiveSession,
            "No active debug session",
        ))
    }
}

/// A listener bound to 127.0.0.1 on a free port
pub struct TestServer {
    lifecycle: ServerLifecycle,
    port: u16,
}

impl TestServer {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
            .name("debugger-e2e")
            .version("1.0.0")
            .tool(EchoTool)
            .tool(ExplodingTool)
            .tool(ResumeTool)
            .project("app", "/work/app")
    }

    pub async fn start() -> Self {
        Self::start_with(Self::builder()).await
    }

    pub async fn start_with_transport(transport: ServerConfig) -> Self {
        Self::start_with(Self::builder().transport(transport)).await
    }

    pub async fn start_with(builder: McpServerBuilder) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let lifecycle = builder
            .host([127, 0, 0, 1].into())
            .build_lifecycle()
            .expect("valid server configuration");
        let port = lifecycle.start(0).await.expect("listener starts");
        Self { lifecycle, port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn lifecycle(&self) -> &ServerLifecycle {
        &self.lifecycle
    }

    pub fn client(&self) -> McpTestClient {
        McpTestClient::new(self.url("/mcp"))
    }

    pub async fn stop(&self) {
        self.lifecycle.stop().await;
    }
}

/// Minimal HTTP client for the MCP endpoint
#[derive(Clone)]
pub struct McpTestClient {
    client: Client,
    base_url: String,
}

impl McpTestClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// POST a raw body to the endpoint
    pub async fn post_raw(&self, body: impl Into<reqwest::Body>) -> Response {
        self.client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("POST succeeds")
    }

    /// Streamable HTTP request; returns the parsed response body
    pub async fn request(&self, id: i64, method: &str, params: Value) -> Value {
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let response = self.post_raw(body.to_string()).await;
        assert_eq!(response.status(), 200);
        response.json().await.expect("JSON response body")
    }

    pub async fn call_tool(&self, id: i64, name: &str, arguments: Value) -> Value {
        self.request(id, "tools/call", json!({"name": name, "arguments": arguments}))
            .await
    }

    /// Open a legacy SSE stream
    pub async fn connect_sse(&self) -> SseStream {
        let response = self
            .client
            .get(&self.base_url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .expect("SSE connect succeeds");
        assert_eq!(response.status(), 200);
        SseStream::new(response)
    }
}

/// One SSE event
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental reader over an SSE response body
pub struct SseStream {
    response: Response,
    buffer: String,
    /// Every frame seen so far, verbatim
    pub raw: String,
}

impl SseStream {
    fn new(response: Response) -> Self {
        Self {
            response,
            buffer: String::new(),
            raw: String::new(),
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Next event, skipping comment frames. `None` once the stream ends.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            while let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                self.raw.push_str(&frame);
                if let Some(event) = parse_frame(&frame) {
                    return Some(event);
                }
            }
            match self.response.chunk().await {
                Ok(Some(chunk)) => self.buffer.push_str(&String::from_utf8_lossy(&chunk)),
                Ok(None) | Err(_) => return None,
            }
        }
    }

    pub async fn next_event_within(&mut self, timeout: Duration) -> Option<SseEvent> {
        tokio::time::timeout(timeout, self.next_event())
            .await
            .expect("SSE event arrives in time")
    }

    /// Read the `endpoint` event and return its session id
    pub async fn session_id(&mut self) -> (String, String) {
        let event = self
            .next_event_within(Duration::from_secs(5))
            .await
            .expect("endpoint event");
        assert_eq!(event.event, "endpoint");
        let session_id = event
            .data
            .split_once("sessionId=")
            .map(|(_, id)| id.to_string())
            .expect("endpoint carries a session id");
        (event.data, session_id)
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in frame.lines() {
        if let Some(name) = line.strip_prefix("event: ") {
            event = Some(name.to_string());
        } else if let Some(value) = line.strip_prefix("data: ") {
            data.push(value);
        }
    }
    event.map(|event| SseEvent {
        event,
        data: data.join("\n"),
    })
}
