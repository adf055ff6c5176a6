use std::collections::BTreeMap;

use async_trait::async_trait;
use concierge_core::domain::tool::{ToolArguments, ToolSpec};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    /// Runs the tool with schema-validated arguments. Returns a human-readable result.
    async fn execute(&self, arguments: &ToolArguments) -> Result<String, ToolError>;

    /// Message shown to the user before a side-effecting call is executed.
    fn confirmation_prompt(&self, arguments: &ToolArguments) -> String {
        format!(
            "Please confirm: run `{}` with {}? Reply \"yes\" to proceed or \"no\" to cancel.",
            self.spec().name,
            arguments
        )
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.spec().name.clone(), Box::new(tool));
    }

    pub fn with<T>(mut self, tool: T) -> Self
    where
        T: Tool + 'static,
    {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    /// Tool catalog handed to the completion service, ordered by name.
    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
