//! # Debugger MCP Server
//!
//! Exposes host debugger operations as MCP tools over HTTP. The host
//! provides the tools ([`McpTool`]) and a way to pick the project a call
//! runs against ([`ProjectResolver`]); this crate does the rest: method
//! routing, failure containment and listener lifecycle.
//!
//! ```rust,no_run
//! use debugger_mcp_server::{McpServerBuilder, McpTool, McpResult, ProjectContext};
//! use debugger_mcp_protocol::{CallToolResult, ToolDefinition};
//! use async_trait::async_trait;
//! use serde_json::Value;
//!
//! struct Resume;
//!
//! #[async_trait]
//! impl McpTool for Resume {
//!     fn definition(&self) -> ToolDefinition {
//!         ToolDefinition::new("resume", "Resume the paused debug session")
//!     }
//!
//!     async fn execute(&self, _context: ProjectContext, _arguments: Value) -> McpResult<CallToolResult> {
//!         Ok(CallToolResult::text("Resumed"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lifecycle = McpServerBuilder::new()
//!         .tool(Resume)
//!         .project("app", "/work/app")
//!         .build_lifecycle()?;
//!     lifecycle.start(lifecycle.configured_port()).await?;
//!     tokio::signal::ctrl_c().await?;
//!     lifecycle.stop().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod lifecycle;
pub mod project;
pub mod registry;
pub mod tool;

#[cfg(test)]
mod tests;

// Re-export main types
pub use builder::McpServerBuilder;
pub use engine::{ClientInfo, ClientState, McpEngine};
pub use lifecycle::{LastError, LifecycleError, ServerLifecycle, ServerRuntimeState};
pub use project::{ProjectContext, ProjectResolution, ProjectResolver, WorkspaceProjects};
pub use registry::{RegisteredTool, ToolRegistry};
pub use tool::McpTool;

// Re-export foundational types
pub use debugger_http_mcp_server::{HttpMcpError, ServerConfig};
pub use debugger_mcp_json_rpc_server::{JsonRpcDispatcher, JsonRpcHandler};
pub use debugger_mcp_protocol::{McpError, McpResult};

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, McpFrameworkError>;

/// Framework-level errors
#[derive(Debug, thiserror::Error)]
pub enum McpFrameworkError {
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] HttpMcpError),

    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
