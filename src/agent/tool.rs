//! Tool capability trait and the startup-resolved tool registry.
//!
//! A tool is a named capability with a description the relevance analyzer
//! reads and an `invoke` entry point the executor calls. Tools are built
//! once at startup by [`ToolRegistry::builtin`] and shared across turns.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::config::AgentConfig;
use super::tools;
use crate::error::AgentError;

/// Name and capability description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    /// Plugin id, also used as the tool name in prompts and events.
    pub name: String,
    /// What the tool can answer, shown to the relevance analyzer.
    pub description: String,
}

/// Input handed to a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolQuery {
    /// The user's question, verbatim.
    pub question: String,
    /// Search query proposed by the relevance analyzer.
    pub search_query: Option<String>,
}

impl ToolQuery {
    /// The text a tool should search for.
    #[must_use]
    pub fn search_text(&self) -> &str {
        self.search_query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(&self.question)
    }
}

/// An external lookup capability.
///
/// `invoke` returns the tool's raw output. A JSON object with `result` and
/// `artifact` fields is split by the executor. Anything else is used as the
/// result text verbatim.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name and description.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Any error; the executor converts it into an inert result string.
    async fn invoke(&self, query: &ToolQuery) -> anyhow::Result<String>;

    /// Shortcut for the descriptor's name.
    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// Constructor for a built-in tool.
pub type ToolFactory = fn(&AgentConfig) -> anyhow::Result<Arc<dyn Tool>>;

/// Built-in tools, in registration order.
const BUILTIN_TOOLS: &[(&str, ToolFactory)] = &[
    (tools::sejm_stats::NAME, tools::sejm_stats::create),
    (tools::wikipedia::NAME, tools::wikipedia::create),
];

/// Plugin id → tool mapping, in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs every built-in tool.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolExecution`] if a tool cannot be constructed.
    pub fn builtin(config: &AgentConfig) -> Result<Self, AgentError> {
        let mut registry = Self::new();
        for (name, factory) in BUILTIN_TOOLS {
            let tool = factory(config).map_err(|e| AgentError::ToolExecution {
                name: (*name).to_string(),
                message: format!("failed to construct tool: {e}"),
            })?;
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Adds a tool at the end of the registration order.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        if self.get(tool.name()).is_some() {
            return Err(AgentError::Orchestration {
                message: format!("tool '{}' registered twice", tool.name()),
            });
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Looks up a tool by plugin id.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Resolves the enabled plugin ids into tools.
    ///
    /// The result follows registration order, not the order of `ids`.
    /// Duplicate ids are collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] for the first unregistered id.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<dyn Tool>>, AgentError> {
        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(AgentError::UnknownTool {
                name: unknown.clone(),
            });
        }
        Ok(self
            .tools
            .iter()
            .filter(|t| ids.iter().any(|id| id == t.name()))
            .cloned()
            .collect())
    }

    /// Descriptors of all registered tools.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor().clone()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}
