//! # Debugger MCP Demo Server
//!
//! Runs the debugger MCP server with a small simulated debugger behind it.
//!
//! ## Usage
//! ```bash
//! # Serve the current directory as the only open project on port 8000
//! cargo run --package debugger-mcp-demo
//!
//! # Custom port and settings file
//! cargo run --package debugger-mcp-demo -- --port 8765 --config debugger-mcp.toml
//! ```
//!
//! Settings file:
//! ```toml
//! name = "my-debugger"
//! instructions = "Start a debug session before evaluating expressions"
//!
//! [transport]
//! bind_address = "127.0.0.1:8765"
//! keepalive_interval_secs = 15
//!
//! [[projects]]
//! name = "app"
//! path = "/work/app"
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use debugger_mcp_protocol::{CallToolResult, DomainErrorKind, McpError, ToolDefinition};
use debugger_mcp_server::{
    LifecycleError, McpResult, McpServerBuilder, McpTool, ProjectContext, ServerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "debugger-mcp-demo")]
#[command(about = "Debugger MCP server with a simulated debugger")]
struct Args {
    /// Host to bind to (overrides the settings file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind to, 0 for any free port (overrides the settings file)
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    name: Option<String>,
    instructions: Option<String>,
    transport: ServerConfig,
    projects: Vec<ProjectSettings>,
}

#[derive(Debug, Deserialize)]
struct ProjectSettings {
    name: String,
    path: PathBuf,
}

impl Settings {
    fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize)]
struct Breakpoint {
    file: String,
    line: u32,
}

/// Simulated debugger shared by the tools
#[derive(Debug, Default)]
struct SimulatedDebugger {
    session: Option<String>,
    breakpoints: Vec<Breakpoint>,
}

type SharedDebugger = Arc<Mutex<SimulatedDebugger>>;

fn no_active_session() -> CallToolResult {
    CallToolResult::domain_error(
        DomainErrorKind::NoActiveSession,
        "No active debug session. Call start_debug_session first.",
    )
}

struct EchoTool;

#[async_trait]
impl McpTool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("echo", "Echo text back, prefixed with the project name")
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to echo"},
                    "projectPath": {"type": "string"}
                },
                "required": ["text"]
            }))
    }

    async fn execute(&self, context: ProjectContext, arguments: Value) -> McpResult<CallToolResult> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::missing_param("text"))?;
        Ok(CallToolResult::text(format!("[{}] {}", context.name, text)))
    }
}

struct StartDebugSessionTool {
    debugger: SharedDebugger,
}

#[async_trait]
impl McpTool for StartDebugSessionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("start_debug_session", "Start a debug session for the project")
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "breakpoints": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "file": {"type": "string"},
                                "line": {"type": "integer", "minimum": 1}
                            },
                            "required": ["file", "line"]
                        }
                    },
                    "projectPath": {"type": "string"}
                }
            }))
    }

    async fn execute(&self, context: ProjectContext, arguments: Value) -> McpResult<CallToolResult> {
        let mut breakpoints = Vec::new();
        if let Some(entries) = arguments.get("breakpoints").and_then(Value::as_array) {
            for entry in entries {
                let file = entry.get("file").and_then(Value::as_str);
                let line = entry
                    .get("line")
                    .and_then(Value::as_u64)
                    .and_then(|l| u32::try_from(l).ok())
                    .filter(|l| *l > 0);
                match (file, line) {
                    (Some(file), Some(line)) => breakpoints.push(Breakpoint {
                        file: file.to_string(),
                        line,
                    }),
                    _ => {
                        return Ok(CallToolResult::domain_error(
                            DomainErrorKind::BreakpointError,
                            format!("Invalid breakpoint: {}", entry),
                        ));
                    }
                }
            }
        }

        let mut debugger = self.debugger.lock();
        debugger.session = Some(context.name.clone());
        debugger.breakpoints = breakpoints;
        info!(project = %context.name, breakpoints = debugger.breakpoints.len(), "Debug session started");
        Ok(CallToolResult::text(format!(
            "Debug session started for '{}' with {} breakpoint(s)",
            context.name,
            debugger.breakpoints.len()
        )))
    }
}

struct ListBreakpointsTool {
    debugger: SharedDebugger,
}

#[async_trait]
impl McpTool for ListBreakpointsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_breakpoints", "List breakpoints of the active debug session")
    }

    async fn execute(&self, _context: ProjectContext, _arguments: Value) -> McpResult<CallToolResult> {
        let debugger = self.debugger.lock();
        if debugger.session.is_none() {
            return Ok(no_active_session());
        }
        let listing = serde_json::to_string_pretty(&debugger.breakpoints)?;
        Ok(CallToolResult::text(listing))
    }
}

struct EvaluateExpressionTool {
    debugger: SharedDebugger,
}

impl EvaluateExpressionTool {
    /// Integer arithmetic of the form `a <op> b`
    fn evaluate(expression: &str) -> Result<i64, String> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let [lhs, op, rhs] = parts.as_slice() else {
            return Err(format!("Cannot evaluate '{}'", expression));
        };
        let lhs: i64 = lhs.parse().map_err(|_| format!("'{}' is not an integer", lhs))?;
        let rhs: i64 = rhs.parse().map_err(|_| format!("'{}' is not an integer", rhs))?;
        let value = match *op {
            "+" => lhs.checked_add(rhs),
            "-" => lhs.checked_sub(rhs),
            "*" => lhs.checked_mul(rhs),
            "/" => lhs.checked_div(rhs),
            other => return Err(format!("Unsupported operator '{}'", other)),
        };
        value.ok_or_else(|| format!("Arithmetic error in '{}'", expression))
    }
}

#[async_trait]
impl McpTool for EvaluateExpressionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "evaluate_expression",
            "Evaluate an integer expression such as '2 + 3' in the paused frame",
        )
        .with_input_schema(json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string"},
                "projectPath": {"type": "string"}
            },
            "required": ["expression"]
        }))
    }

    async fn execute(&self, _context: ProjectContext, arguments: Value) -> McpResult<CallToolResult> {
        let expression = arguments
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::missing_param("expression"))?;

        if self.debugger.lock().session.is_none() {
            return Ok(no_active_session());
        }

        // Evaluation failures surface as tool failures
        let value = Self::evaluate(expression)
            .map_err(|message| McpError::domain(DomainErrorKind::EvaluationError, message))?;
        Ok(CallToolResult::text(value.to_string()))
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let debugger = SharedDebugger::default();
    let mut builder = McpServerBuilder::new()
        .title("Debugger MCP Demo")
        .transport(settings.transport)
        .tool(EchoTool)
        .tool(StartDebugSessionTool {
            debugger: Arc::clone(&debugger),
        })
        .tool(ListBreakpointsTool {
            debugger: Arc::clone(&debugger),
        })
        .tool(EvaluateExpressionTool {
            debugger: Arc::clone(&debugger),
        });

    if let Some(name) = settings.name {
        builder = builder.name(name);
    }
    if let Some(instructions) = settings.instructions {
        builder = builder.instructions(instructions);
    }
    if let Some(host) = args.host {
        builder = builder.host(host);
    }
    if settings.projects.is_empty() {
        let cwd = std::env::current_dir().context("Cannot determine the current directory")?;
        let name = cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string());
        builder = builder.project(name, cwd);
    } else {
        for project in settings.projects {
            builder = builder.project(project.name, project.path);
        }
    }

    let lifecycle = builder.build_lifecycle()?;
    let port = args.port.unwrap_or_else(|| lifecycle.configured_port());

    match lifecycle.start(port).await {
        Ok(bound) => info!(port = bound, "Debugger MCP server listening, press Ctrl+C to stop"),
        Err(LifecycleError::PortInUse { port }) => {
            warn!(port, "Port is in use; choose another with --port");
            return Err(LifecycleError::PortInUse { port }.into());
        }
        Err(err) => return Err(err.into()),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutting down");
    lifecycle.stop().await;
    Ok(())
}
