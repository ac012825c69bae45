//! Folding frames into one evolving assistant message.

use crate::core::{FrameKind, Message, WireFrame};

/// What a folded frame changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldEffect {
    /// The status indicator now reads this text.
    Status(String),
    /// A tool finished; its artifacts and data were appended.
    ToolFinished {
        /// Status text carried by the frame.
        status: String,
        /// Artifacts appended.
        artifacts: usize,
    },
    /// This text was appended to the content.
    Delta(String),
    /// The server reported a terminal error.
    Failed(String),
    /// The frame carried no payload.
    Ignored,
}

/// Accumulated state of one assistant message.
///
/// Threaded through [`FoldState::fold`] by value.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldState {
    /// The message as reconstructed so far.
    pub message: Message,
    /// Ephemeral "what is happening" text. Not part of the message.
    pub status: Option<String>,
}

impl FoldState {
    /// Starts an empty assistant message with the given id.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(message_id),
            status: None,
        }
    }

    /// Merges one frame.
    ///
    /// `response` appends its delta only; artifacts come from
    /// `tool_execution` frames. An `error` frame leaves the message untouched
    /// so partial content stays available.
    #[must_use]
    pub fn fold(mut self, frame: &WireFrame) -> (Self, FoldEffect) {
        let Some(payload) = frame.payload() else {
            tracing::warn!(kind = ?frame.kind, "frame without payload");
            return (self, FoldEffect::Ignored);
        };
        if payload.id != self.message.id {
            tracing::debug!(
                expected = %self.message.id,
                got = %payload.id,
                "frame addressed to another message id"
            );
        }

        let effect = match frame.kind {
            FrameKind::Status => {
                self.status = Some(payload.content.clone());
                FoldEffect::Status(payload.content.clone())
            }
            FrameKind::ToolExecution => {
                self.message.artifacts.extend(payload.artifacts.iter().cloned());
                self.message.data.extend(payload.data.iter().cloned());
                self.status = Some(payload.content.clone());
                FoldEffect::ToolFinished {
                    status: payload.content.clone(),
                    artifacts: payload.artifacts.len(),
                }
            }
            FrameKind::Response => {
                self.message.content.push_str(&payload.content);
                FoldEffect::Delta(payload.content.clone())
            }
            FrameKind::Error => FoldEffect::Failed(payload.content.clone()),
        };
        (self, effect)
    }
}

impl Default for FoldState {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Artifact, ProgressEvent};
    use serde_json::json;

    fn artifact(kind: &str) -> Artifact {
        Artifact {
            kind: kind.to_string(),
            question: "q".to_string(),
            search_query: None,
            data: json!({}),
        }
    }

    fn fold_all(events: &[ProgressEvent]) -> (FoldState, Vec<FoldEffect>) {
        let mut state = FoldState::new("m");
        let mut effects = Vec::new();
        for event in events {
            let (next, effect) = state.fold(&WireFrame::from_event("m", event));
            state = next;
            effects.push(effect);
        }
        (state, effects)
    }

    #[test]
    fn test_status_does_not_touch_message() {
        let (state, effects) = fold_all(&[ProgressEvent::status("Analyzing your question")]);
        assert_eq!(state.status.as_deref(), Some("Analyzing your question"));
        assert!(state.message.content.is_empty());
        assert_eq!(
            effects,
            vec![FoldEffect::Status("Analyzing your question".to_string())]
        );
    }

    #[test]
    fn test_tool_execution_appends_and_sets_status() {
        let (state, _) = fold_all(&[
            ProgressEvent::ToolExecution {
                text: "Tool a returned an artifact".to_string(),
                artifacts: vec![artifact("a")],
                data: vec![json!(1)],
            },
            ProgressEvent::ToolExecution {
                text: "Tool b returned an artifact".to_string(),
                artifacts: vec![artifact("b")],
                data: Vec::new(),
            },
        ]);
        let kinds: Vec<&str> = state
            .message
            .artifacts
            .iter()
            .map(|a| a.kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["a", "b"]);
        assert_eq!(state.message.data, vec![json!(1)]);
        assert_eq!(state.status.as_deref(), Some("Tool b returned an artifact"));
    }

    #[test]
    fn test_response_appends_delta_but_not_artifacts() {
        let (state, _) = fold_all(&[
            ProgressEvent::Response {
                text_delta: "Hel".to_string(),
                artifacts: vec![artifact("a")],
            },
            ProgressEvent::Response {
                text_delta: "lo".to_string(),
                artifacts: vec![artifact("a")],
            },
        ]);
        assert_eq!(state.message.content, "Hello");
        assert!(state.message.artifacts.is_empty());
    }

    #[test]
    fn test_error_keeps_partial_content() {
        let (state, effects) = fold_all(&[
            ProgressEvent::Response {
                text_delta: "partial".to_string(),
                artifacts: Vec::new(),
            },
            ProgressEvent::error("upstream failed"),
        ]);
        assert_eq!(state.message.content, "partial");
        assert_eq!(effects[1], FoldEffect::Failed("upstream failed".to_string()));
    }

    #[test]
    fn test_frame_without_payload_is_ignored() {
        let frame = WireFrame {
            kind: FrameKind::Response,
            messages: Vec::new(),
        };
        let (state, effect) = FoldState::new("m").fold(&frame);
        assert_eq!(effect, FoldEffect::Ignored);
        assert!(state.message.content.is_empty());
    }
}
