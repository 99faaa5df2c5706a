//! Tool registry for managing available tools

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::{SchemaViolation, Tool, ToolSpec};
use crate::message::ToolInvocation;

struct RegisteredTool {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

/// Registry of available tools, kept in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    ///
    /// Re-registering a name replaces the tool but keeps its advertised position.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let spec = tool.spec();
        let entry = RegisteredTool { spec, tool };
        match self.index.get(&entry.spec.name) {
            Some(&slot) => {
                warn!(tool = %entry.spec.name, "Replacing already registered tool");
                self.tools[slot] = entry;
            }
            None => {
                self.index.insert(entry.spec.name.clone(), self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i].tool))
    }

    /// Spec recorded for a tool at registration
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.tools[i].spec)
    }

    /// List all registered tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.spec.name.as_str()).collect()
    }

    /// Tool specs in registration order, as advertised to the provider
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec.clone()).collect()
    }

    /// Resolve an invocation to its tool, checking parameters against the spec
    pub fn validate(&self, invocation: &ToolInvocation) -> Result<Arc<dyn Tool>, SchemaViolation> {
        let &slot = self
            .index
            .get(&invocation.tool_name)
            .ok_or_else(|| SchemaViolation::UnknownTool(invocation.tool_name.clone()))?;
        let entry = &self.tools[slot];
        entry.spec.parameters.validate(&invocation.parameters)?;
        Ok(Arc::clone(&entry.tool))
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
