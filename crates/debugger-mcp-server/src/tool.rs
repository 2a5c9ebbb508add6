//! MCP Tool Trait
//!
//! The boundary between the protocol core and host-provided operations.

use async_trait::async_trait;
use serde_json::Value;

use debugger_mcp_protocol::{CallToolResult, ToolDefinition};

use crate::McpResult;
use crate::project::ProjectContext;

/// A host-provided operation invocable through `tools/call`
///
/// `execute` may take arbitrarily long and may fail; the server never
/// imposes a timeout. Return `Err` (or panic) for failures the caller
/// cannot act on; they become Internal Error responses. Return
/// [`CallToolResult::domain_error`] for expected failures the client should
/// see as a tool result.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Name, description and input schema. Read once at registration.
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, context: ProjectContext, arguments: Value)
    -> McpResult<CallToolResult>;
}
