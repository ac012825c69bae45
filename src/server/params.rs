//! Request body of the submission endpoint.

use serde::{Deserialize, Serialize};

use crate::agent::orchestrator::TurnRequest;
use crate::core::Message;

/// Body of `POST /api/chat`.
///
/// Only `messages` is required. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Conversation history ending with the user's question.
    pub messages: Vec<Message>,

    /// Synthesis system prompt. Empty selects the server default.
    #[serde(default)]
    pub system_prompt: String,

    /// Plugin ids the user enabled for this turn.
    #[serde(default)]
    pub enabled_plugin_ids: Vec<String>,

    /// Model to use. Absent selects the server's configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    /// Sampling options.
    #[serde(default)]
    pub options: ChatOptions,

    /// Id of the assistant message being produced. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Sampling options recognised in `options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    /// Synthesis temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Synthesis token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl SubmitRequest {
    /// Creates a request for `messages` with no plugins or overrides.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Enables the given plugins.
    #[must_use]
    pub fn with_plugins(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enabled_plugin_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// The caller's message id, or a fresh one.
    #[must_use]
    pub fn resolve_message_id(&self) -> String {
        self.message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(Message::new_id, str::to_string)
    }

    /// Converts into the orchestrator's request.
    #[must_use]
    pub fn into_turn(self) -> TurnRequest {
        TurnRequest {
            history: self.messages,
            system_prompt: Some(self.system_prompt).filter(|p| !p.trim().is_empty()),
            model: self.model_name.filter(|m| !m.trim().is_empty()),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }
}
