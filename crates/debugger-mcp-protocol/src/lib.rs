//! # Debugger MCP protocol
//!
//! The subset of the Model Context Protocol spoken by the debugger bridge:
//! the `initialize` handshake, tool discovery and invocation, and the
//! domain error taxonomy shared by protocol errors and tool results.

pub mod domain;
pub mod initialize;
pub mod tools;
pub mod version;

pub use domain::DomainErrorKind;
pub use initialize::{
    Implementation, InitializeParams, InitializeResult, ServerCapabilities, ToolsCapabilities,
};
pub use tools::{CallToolParams, CallToolResult, ListToolsResult, ToolContent, ToolDefinition};
pub use version::McpVersion;

use debugger_mcp_json_rpc_server::{JsonRpcErrorCode, JsonRpcErrorObject, ToJsonRpcError};
use serde_json::json;

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP-specific errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    #[error("Multiple projects are open; pass projectPath to choose one of: {}", .projects.join(", "))]
    MultipleProjects { projects: Vec<String> },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("No projects are open")]
    NoProjectsOpen,

    #[error("{message}")]
    Domain {
        kind: DomainErrorKind,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Create a missing parameter error
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecutionError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn domain(kind: DomainErrorKind, message: impl Into<String>) -> Self {
        Self::Domain {
            kind,
            message: message.into(),
        }
    }

    /// Convert to a JsonRpcErrorObject for JSON-RPC 2.0 responses
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        let message = self.to_string();
        match self {
            McpError::ToolNotFound(_) => {
                JsonRpcErrorObject::new(JsonRpcErrorCode::MethodNotFound, Some(message), None)
            }

            McpError::InvalidParameters(_) | McpError::MissingParameter(_) => {
                JsonRpcErrorObject::invalid_params(&message)
            }

            McpError::MultipleProjects { projects } => JsonRpcErrorObject::server_error(
                domain::MULTIPLE_PROJECTS,
                &message,
                Some(json!({ "projects": projects })),
            ),
            McpError::ProjectNotFound(path) => JsonRpcErrorObject::server_error(
                domain::PROJECT_NOT_FOUND,
                &message,
                Some(json!({ "projectPath": path })),
            ),
            McpError::NoProjectsOpen => {
                JsonRpcErrorObject::server_error(domain::PROJECT_NOT_FOUND, &message, None)
            }
            McpError::Domain { kind, .. } => JsonRpcErrorObject::server_error(
                kind.code(),
                &message,
                Some(json!({ "errorKind": kind.as_str() })),
            ),

            McpError::VersionMismatch { .. }
            | McpError::ToolExecutionError { .. }
            | McpError::SerializationError(_)
            | McpError::Internal(_) => JsonRpcErrorObject::internal_error(Some(message)),
        }
    }
}

impl ToJsonRpcError for McpError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        McpError::to_error_object(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debugger_mcp_json_rpc_server::error_codes;

    #[test]
    fn test_tool_not_found_is_method_not_found_family() {
        let obj = McpError::ToolNotFound("frobnicate".to_string()).to_error_object();
        assert_eq!(obj.code, error_codes::METHOD_NOT_FOUND);
        assert!(obj.message.contains("frobnicate"));
        assert_ne!(obj.message, JsonRpcErrorObject::method_not_found("frobnicate").message);
    }

    #[test]
    fn test_parameter_errors_map_to_invalid_params() {
        assert_eq!(
            McpError::missing_param("name").to_error_object().code,
            error_codes::INVALID_PARAMS
        );
        assert_eq!(
            McpError::invalid_params("bad").to_error_object().code,
            error_codes::INVALID_PARAMS
        );
    }

    #[test]
    fn test_tool_execution_carries_tool_and_message() {
        let obj = McpError::tool_execution("explode", "boom").to_error_object();
        assert_eq!(obj.code, error_codes::INTERNAL_ERROR);
        assert!(obj.message.contains("explode"));
        assert!(obj.message.contains("boom"));
    }

    #[test]
    fn test_project_outcomes_have_distinct_messages() {
        let multiple = McpError::MultipleProjects {
            projects: vec!["/a".to_string(), "/b".to_string()],
        }
        .to_error_object();
        assert_eq!(multiple.code, domain::MULTIPLE_PROJECTS);
        assert_eq!(multiple.data.unwrap()["projects"][1], "/b");

        let not_found = McpError::ProjectNotFound("/c".to_string()).to_error_object();
        let none_open = McpError::NoProjectsOpen.to_error_object();
        assert_eq!(not_found.code, domain::PROJECT_NOT_FOUND);
        assert_eq!(none_open.code, domain::PROJECT_NOT_FOUND);
        assert_ne!(not_found.message, none_open.message);
    }

    #[test]
    fn test_domain_error_uses_kind_code() {
        let obj =
            McpError::domain(DomainErrorKind::RunConfigNotFound, "no such config").to_error_object();
        assert_eq!(obj.code, domain::RUN_CONFIG_NOT_FOUND);
        assert_eq!(obj.message, "no such config");
    }
}
