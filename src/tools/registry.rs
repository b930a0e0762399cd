//! Name-keyed tool registry.
//!
//! Each registered [`Tool`] may publish several tool names; the registry maps
//! every name back to its owning tool and dispatches calls accordingly.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{Tool, ToolDefinition, ToolError, ToolResult};

/// Registry of callable tools, keyed by tool name.
#[derive(Default)]
pub struct ToolRegistry {
    /// Map from tool name to the integration that handles it.
    tools: BTreeMap<String, Arc<dyn Tool>>,
    /// Definitions in registration order.
    definitions: Vec<ToolDefinition>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every tool name published by `tool`.
    ///
    /// Registration is all-or-nothing: if any name is taken, nothing is
    /// added.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Duplicate`] if a name is already registered or
    /// repeated within `tool`'s own definitions.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let definitions = tool.definitions();

        for (idx, def) in definitions.iter().enumerate() {
            let repeated = definitions
                .iter()
                .take(idx)
                .any(|earlier| earlier.name == def.name);
            if repeated || self.tools.contains_key(&def.name) {
                return Err(ToolError::Duplicate(def.name.clone()));
            }
        }

        for def in definitions {
            info!(tool = %def.name, "registered tool");
            self.tools.insert(def.name.clone(), Arc::clone(&tool));
            self.definitions.push(def);
        }
        Ok(())
    }

    /// Definitions of all registered tools, in registration order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tool names.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a call to the tool registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] if no tool has this name, or any
    /// error the tool itself raises.
    pub async fn execute(
        &self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_owned()))?;
        debug!(tool = name, "dispatching tool call");
        tool.execute(name, input).await
    }
}
