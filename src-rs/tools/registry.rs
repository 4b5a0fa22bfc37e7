use std::collections::HashMap;

use super::types::{ToolDefinition, ToolSchema};
use crate::error::RegistryError;

/// Tools in registration order. Built once at startup, read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), RegistryError> {
        if tool.name.trim().is_empty() {
            return Err(RegistryError::InvalidTool("empty tool name".to_string()));
        }
        if self.index.contains_key(&tool.name) {
            return Err(RegistryError::DuplicateTool(tool.name));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn register_all(
        &mut self,
        tools: impl IntoIterator<Item = ToolDefinition>,
    ) -> Result<(), RegistryError> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&idx| &self.tools[idx])
    }

    /// The catalog sent to the model, in registration order.
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolDefinition::tool_schema).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }
}
