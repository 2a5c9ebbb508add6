//! The MCP engine: protocol state plus the method table

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use debugger_mcp_json_rpc_server::{JsonRpcDispatcher, SessionContext};
use debugger_mcp_protocol::{Implementation, McpError, McpVersion, ServerCapabilities};

use crate::builder::McpServerBuilder;
use crate::handlers::{
    CallToolHandler, InitializeHandler, ListToolsHandler, NotificationsHandler, PingHandler,
};
use crate::project::ProjectResolver;
use crate::registry::ToolRegistry;

/// What the connected client told us during the handshake
#[derive(Debug, Default)]
pub struct ClientState {
    initialized: AtomicBool,
    info: RwLock<Option<ClientInfo>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Implementation>,
    pub protocol_version: McpVersion,
}

impl ClientState {
    pub(crate) fn record_initialize(&self, implementation: Option<Implementation>, version: McpVersion) {
        // A fresh handshake starts a new client lifecycle
        self.initialized.store(false, Ordering::SeqCst);
        *self.info.write() = Some(ClientInfo {
            implementation,
            protocol_version: version,
        });
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn info(&self) -> Option<ClientInfo> {
        self.info.read().clone()
    }
}

/// Transport-agnostic MCP server core
///
/// Holds the tool registry, project resolver and client state, and builds
/// the JSON-RPC dispatcher the transports feed.
#[derive(Clone)]
pub struct McpEngine {
    implementation: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    tools: ToolRegistry,
    resolver: Arc<dyn ProjectResolver>,
    client: Arc<ClientState>,
    dispatcher: Arc<JsonRpcDispatcher<McpError>>,
}

impl McpEngine {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub(crate) fn new(
        implementation: Implementation,
        instructions: Option<String>,
        tools: ToolRegistry,
        resolver: Arc<dyn ProjectResolver>,
    ) -> Self {
        let capabilities = ServerCapabilities::tools_only();
        let client = Arc::new(ClientState::default());
        let dispatcher = Arc::new(Self::assemble_dispatcher(
            &implementation,
            &capabilities,
            &instructions,
            &tools,
            &resolver,
            &client,
        ));
        Self {
            implementation,
            capabilities,
            instructions,
            tools,
            resolver,
            client,
            dispatcher,
        }
    }

    fn assemble_dispatcher(
        implementation: &Implementation,
        capabilities: &ServerCapabilities,
        instructions: &Option<String>,
        tools: &ToolRegistry,
        resolver: &Arc<dyn ProjectResolver>,
        client: &Arc<ClientState>,
    ) -> JsonRpcDispatcher<McpError> {
        let mut dispatcher = JsonRpcDispatcher::new();
        dispatcher.register_method(
            "initialize",
            InitializeHandler::new(
                implementation.clone(),
                capabilities.clone(),
                instructions.clone(),
                Arc::clone(client),
            ),
        );
        dispatcher.register_method("ping", PingHandler);
        dispatcher.register_method("tools/list", ListToolsHandler::new(tools.clone()));
        dispatcher.register_method(
            "tools/call",
            CallToolHandler::new(tools.clone(), Arc::clone(resolver)),
        );
        dispatcher.register_methods(
            vec![
                "notifications/initialized".to_string(),
                "notifications/cancelled".to_string(),
            ],
            NotificationsHandler::new(Arc::clone(client)),
        );
        dispatcher
    }

    /// A fresh dispatcher sharing this engine's registry, resolver and
    /// client state. Each listener instance gets its own.
    pub fn build_dispatcher(&self) -> JsonRpcDispatcher<McpError> {
        Self::assemble_dispatcher(
            &self.implementation,
            &self.capabilities,
            &self.instructions,
            &self.tools,
            &self.resolver,
            &self.client,
        )
    }

    /// Process one raw JSON-RPC body.
    ///
    /// Returns the serialized response, or `None` for notifications.
    pub async fn handle_request(&self, body: &[u8]) -> Option<String> {
        self.dispatcher.handle_bytes(body, None).await
    }

    /// Same as [`handle_request`](Self::handle_request) with transport context.
    pub async fn handle_request_with_context(
        &self,
        body: &[u8],
        context: SessionContext,
    ) -> Option<String> {
        self.dispatcher.handle_bytes(body, Some(context)).await
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn client(&self) -> &ClientState {
        &self.client
    }

    pub fn supported_methods(&self) -> Vec<String> {
        self.dispatcher.registered_methods()
    }
}

impl std::fmt::Debug for McpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpEngine")
            .field("implementation", &self.implementation)
            .field("tools", &self.tools.len())
            .field("initialized", &self.client.is_initialized())
            .finish()
    }
}
