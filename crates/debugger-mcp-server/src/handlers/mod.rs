//! MCP method handlers
//!
//! One `JsonRpcHandler` per method family. All of them report failures as
//! `McpError`; the dispatcher turns those into JSON-RPC error envelopes.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use debugger_mcp_json_rpc_server::r#async::panic_message;
use debugger_mcp_json_rpc_server::{JsonRpcHandler, RequestParams, SessionContext};
use debugger_mcp_protocol::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, ListToolsResult, McpError, McpVersion,
    ServerCapabilities,
};

use crate::engine::ClientState;
use crate::project::{ProjectResolution, ProjectResolver};
use crate::registry::ToolRegistry;

/// Handles `initialize`
pub struct InitializeHandler {
    implementation: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    client: Arc<ClientState>,
}

impl InitializeHandler {
    pub fn new(
        implementation: Implementation,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
        client: Arc<ClientState>,
    ) -> Self {
        Self {
            implementation,
            capabilities,
            instructions,
            client,
        }
    }
}

#[async_trait]
impl JsonRpcHandler for InitializeHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        params: Option<RequestParams>,
        _session_context: Option<SessionContext>,
    ) -> Result<Value, McpError> {
        // Unknown or malformed fields fall back to defaults
        let params: InitializeParams = params
            .map(|p| serde_json::from_value(p.to_value()).unwrap_or_default())
            .unwrap_or_default();

        let version = McpVersion::negotiate(params.protocol_version.as_deref());
        if let Some(client_info) = &params.client_info {
            info!(
                client = %client_info.name,
                client_version = %client_info.version,
                protocol_version = %version,
                "Client initializing"
            );
        }
        self.client.record_initialize(params.client_info, version);

        let mut result = InitializeResult::new(
            version,
            self.capabilities.clone(),
            self.implementation.clone(),
        );
        if let Some(instructions) = &self.instructions {
            result = result.with_instructions(instructions.clone());
        }
        Ok(serde_json::to_value(result)?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec!["initialize".to_string()]
    }
}

/// Handles `ping`
pub struct PingHandler;

#[async_trait]
impl JsonRpcHandler for PingHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        _params: Option<RequestParams>,
        _session_context: Option<SessionContext>,
    ) -> Result<Value, McpError> {
        Ok(json!({}))
    }

    fn supported_methods(&self) -> Vec<String> {
        vec!["ping".to_string()]
    }
}

/// Handles client notifications
pub struct NotificationsHandler {
    client: Arc<ClientState>,
}

impl NotificationsHandler {
    pub fn new(client: Arc<ClientState>) -> Self {
        Self { client }
    }

    fn apply(&self, method: &str, params: Option<&RequestParams>) {
        match method {
            "notifications/initialized" => {
                self.client.mark_initialized();
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                let request_id = params.and_then(|p| p.get("requestId")).cloned();
                let reason = params
                    .and_then(|p| p.get("reason"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                // In-flight calls run to completion; their result is still delivered
                debug!(?request_id, reason, "Client cancelled request");
            }
            other => debug!(method = %other, "Ignoring notification"),
        }
    }
}

#[async_trait]
impl JsonRpcHandler for NotificationsHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        _session_context: Option<SessionContext>,
    ) -> Result<Value, McpError> {
        self.apply(method, params.as_ref());
        Ok(json!({}))
    }

    async fn handle_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        _session_context: Option<SessionContext>,
    ) -> Result<(), McpError> {
        self.apply(method, params.as_ref());
        Ok(())
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![
            "notifications/initialized".to_string(),
            "notifications/cancelled".to_string(),
        ]
    }
}

/// Handles `tools/list`
pub struct ListToolsHandler {
    tools: ToolRegistry,
}

impl ListToolsHandler {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl JsonRpcHandler for ListToolsHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        _params: Option<RequestParams>,
        _session_context: Option<SessionContext>,
    ) -> Result<Value, McpError> {
        let result = ListToolsResult {
            tools: self.tools.all_definitions(),
        };
        debug!(count = result.tools.len(), "Listing tools");
        Ok(serde_json::to_value(result)?)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec!["tools/list".to_string()]
    }
}

/// Handles `tools/call`
///
/// Resolves the project, runs the tool and contains every failure the tool
/// produces, including panics, as an Internal Error naming the tool.
pub struct CallToolHandler {
    tools: ToolRegistry,
    resolver: Arc<dyn ProjectResolver>,
}

impl CallToolHandler {
    pub fn new(tools: ToolRegistry, resolver: Arc<dyn ProjectResolver>) -> Self {
        Self { tools, resolver }
    }
}

#[async_trait]
impl JsonRpcHandler for CallToolHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        params: Option<RequestParams>,
        session_context: Option<SessionContext>,
    ) -> Result<Value, McpError> {
        let params: CallToolParams = match params {
            Some(params) => serde_json::from_value(params.to_value()).map_err(|err| {
                McpError::invalid_params(format!("Invalid tools/call params: {}", err))
            })?,
            None => return Err(McpError::missing_param("name")),
        };
        let name = params.name.clone();
        let arguments = params.into_arguments();

        let registered = self
            .tools
            .get_tool(&name)
            .ok_or_else(|| McpError::ToolNotFound(name.clone()))?;

        let project_path = arguments.get("projectPath").and_then(Value::as_str);
        let context = match self.resolver.resolve(project_path).await {
            ProjectResolution::Success(context) => context,
            ProjectResolution::MultipleProjects(projects) => {
                return Err(McpError::MultipleProjects {
                    projects: projects
                        .into_iter()
                        .map(|p| p.base_path.display().to_string())
                        .collect(),
                });
            }
            ProjectResolution::NotFound(path) => return Err(McpError::ProjectNotFound(path)),
            ProjectResolution::NoProjectsOpen => return Err(McpError::NoProjectsOpen),
        };

        debug!(
            tool = %name,
            project = %context.name,
            session_id = ?session_context.as_ref().and_then(|c| c.session_id.as_deref()),
            "Calling tool"
        );

        let outcome = AssertUnwindSafe(registered.tool().execute(context, arguments))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                if result.is_error {
                    debug!(tool = %name, "Tool reported a domain failure");
                }
                Ok(serde_json::to_value(result)?)
            }
            Ok(Err(err)) => {
                error!(tool = %name, error = %err, "Tool execution failed");
                Err(McpError::tool_execution(&name, err.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(tool = %name, panic_message = %message, "Tool panicked");
                Err(McpError::tool_execution(&name, message))
            }
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec!["tools/call".to_string()]
    }
}
