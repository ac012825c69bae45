//! Streaming HTTP endpoint.
//!
//! ```text
//! POST /api/chat (SubmitRequest JSON)
//!   ↓ origin check, body parse, plugin resolution
//! spawn_turn() → ProgressEvent channel
//!   ↓ encoder: one `data: {...}\n\n` chunk per event
//! chunked text/event-stream response
//! ```

pub mod encoder;
pub mod handler;
pub mod params;
pub mod transport;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentConfig, LlmProvider, Orchestrator, PromptSet, ToolRegistry};
use crate::error::AgentError;

pub use params::{ChatOptions, SubmitRequest};
pub use transport::{serve, serve_on};

/// Shared, read-only state of the endpoint.
#[derive(Clone)]
pub struct AppState {
    /// Provider shared by every turn.
    pub provider: Arc<dyn LlmProvider>,
    /// Agent configuration.
    pub config: Arc<AgentConfig>,
    /// Tools available to submissions.
    pub registry: Arc<ToolRegistry>,
    /// System prompts and the canned reply.
    pub prompts: Arc<PromptSet>,
    /// Expected `Origin`. `None` compares against the `Host` header.
    pub serving_origin: Option<String>,
    /// Parent token of every turn; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates state with a fresh shutdown token and no fixed origin.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
        registry: ToolRegistry,
        prompts: PromptSet,
    ) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            registry: Arc::new(registry),
            prompts: Arc::new(prompts),
            serving_origin: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds an orchestrator for one turn with the given plugins enabled.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] for an unregistered plugin id.
    pub fn orchestrator(&self, plugin_ids: &[String]) -> Result<Arc<Orchestrator>, AgentError> {
        let tools = self.registry.resolve(plugin_ids)?;
        Ok(Arc::new(Orchestrator::new(
            Arc::clone(&self.provider),
            (*self.config).clone(),
            Arc::clone(&self.prompts),
            tools,
        )))
    }

    /// Pins the accepted `Origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.serving_origin = origin;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("provider", &self.provider.name())
            .field("registry", &self.registry)
            .field("serving_origin", &self.serving_origin)
            .finish_non_exhaustive()
    }
}

/// Builds the endpoint router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler::submit).get(handler::health))
        .with_state(state)
}
