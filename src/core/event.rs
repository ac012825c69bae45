//! Progress events emitted by the orchestrator during a turn.

use serde::Serialize;
use serde_json::Value;

use super::message::Artifact;

/// One step of progress in a turn.
///
/// Every event becomes exactly one wire frame. `Response` carries only the
/// newly generated text, never the cumulative answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Human-readable description of what the agent is doing.
    Status {
        /// Status line.
        text: String,
    },
    /// A tool finished.
    ToolExecution {
        /// Status line.
        text: String,
        /// Artifacts produced by this tool only.
        artifacts: Vec<Artifact>,
        /// Raw data produced by this tool only.
        data: Vec<Value>,
    },
    /// A fragment of the synthesized answer.
    Response {
        /// Newly generated text.
        text_delta: String,
        /// Every artifact accumulated so far in the turn.
        artifacts: Vec<Artifact>,
    },
    /// The turn failed.
    Error {
        /// Error description.
        text: String,
    },
}

impl ProgressEvent {
    /// Creates a status event.
    #[must_use]
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status { text: text.into() }
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    /// Returns `true` for the terminal error event.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Normalized outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Tool that produced the result.
    pub tool_name: String,
    /// Text handed to the synthesis prompt.
    pub result: String,
    /// Structured payload, if the tool produced one.
    pub artifact: Option<Artifact>,
    /// Raw records the tool chose to expose to the client.
    pub data: Vec<Value>,
}

/// Verdict of one relevance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelevanceDecision {
    /// Tool that was checked.
    pub tool_name: String,
    /// Whether the tool applies to the query.
    pub is_relevant: bool,
    /// Search query proposed by the model, if any.
    pub derived_query: Option<String>,
}
