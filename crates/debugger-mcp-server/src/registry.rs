//! Concurrent tool registry

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use debugger_mcp_protocol::ToolDefinition;

use crate::{McpFrameworkError, McpTool, Result};

/// A tool together with the definition captured when it was registered
#[derive(Clone)]
pub struct RegisteredTool {
    definition: ToolDefinition,
    tool: Arc<dyn McpTool>,
}

impl RegisteredTool {
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub fn tool(&self) -> &Arc<dyn McpTool> {
        &self.tool
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.definition.name)
            .finish()
    }
}

/// Name to tool map, safe for concurrent register, lookup and removal
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique; a second registration under the
    /// same name is rejected.
    pub fn register<T>(&self, tool: T) -> Result<()>
    where
        T: McpTool + 'static,
    {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&self, tool: Arc<dyn McpTool>) -> Result<()> {
        let definition = tool.definition();
        match self.tools.entry(definition.name.clone()) {
            Entry::Occupied(_) => Err(McpFrameworkError::DuplicateTool(definition.name)),
            Entry::Vacant(slot) => {
                debug!(tool = %definition.name, "Registered tool");
                slot.insert(RegisteredTool { definition, tool });
                Ok(())
            }
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get_tool(&self, name: &str) -> Option<RegisteredTool> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All definitions, sorted by name
    pub fn all_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|entry| entry.value().definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
