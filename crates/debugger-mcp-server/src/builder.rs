//! MCP Server Builder

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use debugger_http_mcp_server::ServerConfig;
use debugger_mcp_protocol::Implementation;

use crate::lifecycle::ServerLifecycle;
use crate::project::{ProjectContext, ProjectResolver, WorkspaceProjects};
use crate::{McpEngine, McpFrameworkError, McpTool, Result, ToolRegistry};

/// Builder for the MCP engine and its listener lifecycle
pub struct McpServerBuilder {
    name: String,
    version: String,
    title: Option<String>,
    instructions: Option<String>,
    tools: Vec<Arc<dyn McpTool>>,
    resolver: Option<Arc<dyn ProjectResolver>>,
    projects: Vec<ProjectContext>,
    transport: ServerConfig,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "debugger-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            instructions: None,
            tools: Vec::new(),
            resolver: None,
            projects: Vec::new(),
            transport: ServerConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Instructions returned to clients from `initialize`
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn McpTool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Use a host-provided project resolver
    pub fn project_resolver<R: ProjectResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn project_resolver_arc(mut self, resolver: Arc<dyn ProjectResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Add an open project to the built-in [`WorkspaceProjects`] resolver.
    /// Ignored when a custom resolver is set.
    pub fn project(mut self, name: impl Into<String>, base_path: impl Into<std::path::PathBuf>) -> Self {
        self.projects.push(ProjectContext::new(name, base_path));
        self
    }

    /// Transport settings (paths, limits, timeouts)
    pub fn transport(mut self, config: ServerConfig) -> Self {
        self.transport = config;
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.transport.bind_address = addr;
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.transport.bind_address.set_ip(host);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.transport.bind_address.set_port(port);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(McpFrameworkError::Config("Server name cannot be empty".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(McpFrameworkError::Config(
                "Server version cannot be empty".to_string(),
            ));
        }
        if !self.transport.mcp_path.starts_with('/') || !self.transport.sse_path.starts_with('/') {
            return Err(McpFrameworkError::Config(
                "Endpoint paths must start with '/'".to_string(),
            ));
        }
        if self.transport.session_query_param.is_empty() {
            return Err(McpFrameworkError::Config(
                "Session query parameter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the engine. Fails on invalid settings or duplicate tool names.
    pub fn build(self) -> Result<McpEngine> {
        self.build_parts().map(|(engine, _)| engine)
    }

    /// Build the engine wrapped in a listener lifecycle manager.
    pub fn build_lifecycle(self) -> Result<ServerLifecycle> {
        let (engine, transport) = self.build_parts()?;
        Ok(ServerLifecycle::new(engine, transport))
    }

    fn build_parts(self) -> Result<(McpEngine, ServerConfig)> {
        self.validate()?;

        let tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register_arc(tool)?;
        }

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(WorkspaceProjects::with_projects(self.projects)) as Arc<dyn ProjectResolver>,
        };

        let mut implementation = Implementation::new(self.name, self.version);
        if let Some(title) = self.title {
            implementation = implementation.with_title(title);
        }

        let engine = McpEngine::new(implementation, self.instructions, tools, resolver);
        Ok((engine, self.transport))
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
